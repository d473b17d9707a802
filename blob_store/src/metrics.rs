//! Metrics for blob store operations.

use std::time::Instant;

use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Latency and error instruments shared by every dispatched operation.
#[derive(Clone)]
pub struct BlobMetrics {
    pub operations: Histogram<f64>,
    pub errors: Counter<u64>,
}

impl BlobMetrics {
    pub fn new(meter: &Meter) -> Self {
        let operations = meter
            .f64_histogram("bundler_blob_operation_duration_seconds")
            .with_description("Duration of object store operations in seconds")
            .build();

        let errors = meter
            .u64_counter("bundler_blob_errors_total")
            .with_description("Total number of failed object store operations")
            .build();

        Self { operations, errors }
    }

    /// Count a failed operation, tagged with its name.
    pub fn record_error(&self, operation: &'static str) {
        self.errors
            .add(1, &[KeyValue::new("operation", operation)]);
    }
}

/// Records elapsed time into a histogram when dropped.
pub struct Timer {
    start: Instant,
    histogram: Histogram<f64>,
    labels: Vec<KeyValue>,
}

impl Timer {
    pub fn start_with_labels(histogram: &Histogram<f64>, labels: &[KeyValue]) -> Self {
        Self {
            start: Instant::now(),
            histogram: histogram.clone(),
            labels: labels.to_vec(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.record(duration, &self.labels);
    }
}
