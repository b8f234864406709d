//! Queue-length to wait-minutes formula.
//!
//! `ceil(queue / service_rate + overhead)` clamped to a per-corner cap. The
//! cap is a deliberate UX ceiling so implausibly long waits are never shown;
//! it is a clamp on the result, not part of the rate model.

use crate::catalog::CornerKey;
use crate::error::QueryError;
use std::collections::HashMap;

pub const DEFAULT_SERVICE_RATE: f64 = 2.5; // people per minute
pub const DEFAULT_OVERHEAD_MINUTES: f64 = 0.0;
pub const DEFAULT_CAP_MINUTES: u32 = 12;

#[derive(Debug, Clone, Copy)]
pub struct WaitParams {
    pub service_rate: f64,
    pub overhead_minutes: f64,
    pub cap_minutes: u32,
}

impl Default for WaitParams {
    fn default() -> Self {
        Self {
            service_rate: DEFAULT_SERVICE_RATE,
            overhead_minutes: DEFAULT_OVERHEAD_MINUTES,
            cap_minutes: DEFAULT_CAP_MINUTES,
        }
    }
}

/// Per-corner wait parameters with defaults for unconfigured corners.
#[derive(Debug, Clone, Default)]
pub struct WaitModel {
    params: HashMap<CornerKey, WaitParams>,
}

impl WaitModel {
    pub fn new(params: HashMap<CornerKey, WaitParams>) -> Self {
        Self { params }
    }

    pub fn params_for(&self, key: &CornerKey) -> WaitParams {
        self.params.get(key).copied().unwrap_or_default()
    }

    /// Estimated wait in whole minutes. Accepts fractional queue lengths so
    /// the prediction layer can pass averaged values directly.
    pub fn wait_minutes(&self, key: &CornerKey, queue_len: f64) -> Result<u32, QueryError> {
        if queue_len < 0.0 || !queue_len.is_finite() {
            return Err(QueryError::InvalidInput(format!(
                "queue length must be non-negative, got {queue_len}"
            )));
        }
        let p = self.params_for(key);
        let raw = (queue_len / p.service_rate + p.overhead_minutes).ceil() as u32;
        Ok(raw.min(p.cap_minutes))
    }
}
