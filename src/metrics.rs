use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

use crate::errors::ServiceError;

lazy_static! {
    pub static ref STOCK_ADJUSTMENTS: IntCounter = register_int_counter!(
        "stockroom_stock_adjustments_total",
        "Total number of manual stock adjustments"
    )
    .expect("metric can be created");
    pub static ref STOCK_ADJUSTMENT_FAILURES: IntCounterVec = register_int_counter_vec!(
        "stockroom_stock_adjustment_failures_total",
        "Total number of failed stock adjustments",
        &["error_type"]
    )
    .expect("metric can be created");
    pub static ref TRANSFERS_SHIPPED: IntCounter = register_int_counter!(
        "stockroom_transfers_shipped_total",
        "Total number of transfers dispatched"
    )
    .expect("metric can be created");
    pub static ref TRANSFER_FAILURES: IntCounterVec = register_int_counter_vec!(
        "stockroom_transfer_failures_total",
        "Total number of failed transfer operations",
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Renders all registered metrics in Prometheus text format.
pub fn metrics_handler() -> Result<String, ServiceError> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ServiceError::InternalError(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| ServiceError::InternalError(format!("Metrics are not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_render() {
        STOCK_ADJUSTMENTS.inc();
        STOCK_ADJUSTMENT_FAILURES
            .with_label_values(&["validation_error"])
            .inc();

        let body = metrics_handler().expect("metrics should render");
        assert!(body.contains("stockroom_stock_adjustments_total"));
        assert!(body.contains("stockroom_stock_adjustment_failures_total"));
    }
}
