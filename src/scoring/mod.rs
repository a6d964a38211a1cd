pub mod fsqs;
pub mod sqs;
pub mod tcrs;
pub mod ths;

pub(crate) fn from_ceiling(penalty: u32) -> f64 {
    (100.0 - f64::from(penalty)).clamp(0.0, 100.0)
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
