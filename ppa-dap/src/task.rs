//! DAP task descriptor and histogram measurement encoding.

use serde::{Deserialize, Serialize};

/// Time precision, in seconds, reported with every task.
pub const TIME_PRECISION_SECS: u64 = 60;

/// Measurement type for a vector of small unsigned counters.
pub const MEASUREMENT_TYPE_VECU8: &str = "vecu8";

/// Task descriptor sent alongside each measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DapTask {
    pub id: String,
    pub time_precision: u64,
    pub measurement_type: String,
}

impl DapTask {
    /// Describe a `vecu8` histogram task with the standard precision.
    pub fn histogram(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            time_precision: TIME_PRECISION_SECS,
            measurement_type: MEASUREMENT_TYPE_VECU8.to_string(),
        }
    }
}

/// Build a `size`-length histogram with `value` at `index`.
///
/// With `value == 0` the result is all zeros. An `index` outside the
/// histogram leaves it all zeros as well.
pub fn one_hot(index: u32, size: u32, value: u8) -> Vec<u8> {
    let mut measurement = vec![0u8; size as usize];
    if let Some(slot) = measurement.get_mut(index as usize) {
        *slot = value;
    }
    measurement
}
