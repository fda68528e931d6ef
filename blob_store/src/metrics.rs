//! Metrics for bucket operations.

use std::time::Instant;

use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Latency and error instruments for bucket operations, labelled by `op`.
#[derive(Clone)]
pub struct BlobMetrics {
    pub operations: Histogram<f64>,
    pub errors: Counter<u64>,
}

impl BlobMetrics {
    pub fn new(meter: &Meter) -> Self {
        let operations = meter
            .f64_histogram("bucket_operation_duration_seconds")
            .with_description("Duration of bucket operations in seconds")
            .build();

        let errors = meter
            .u64_counter("bucket_operation_errors_total")
            .with_description("Total number of failed bucket operations")
            .build();

        Self { operations, errors }
    }

    pub fn from_global() -> Self {
        Self::new(&opentelemetry::global::meter("blob_store"))
    }

    pub fn timer(&self, op: &'static str) -> Timer {
        Timer::start_with_labels(&self.operations, &[KeyValue::new("op", op)])
    }

    pub fn record_error(&self, op: &'static str) {
        self.errors.add(1, &[KeyValue::new("op", op)]);
    }
}

/// Records the elapsed time into the histogram when dropped.
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
