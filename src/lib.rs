pub mod aggregate;
pub mod alerts;
pub mod components;
pub mod config;
pub mod db;
pub mod error;
pub mod feedback;
pub mod jobs;
pub mod memory;
pub mod models;
pub mod report;
pub mod scoring;
pub mod store;
pub mod summary;
pub mod transcript;

pub use error::{Error, Result};
