use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub(crate) struct InternalMetrics {
    pub(crate) otlp_batch_encoded: Counter,
    pub(crate) otlp_bytes_encoded: Counter,
    pub(crate) otlp_marshaler_pool_reused: Counter,
    pub(crate) otlp_marshaler_pool_created: Counter,
    pub(crate) otlp_transport_failed: Counter,
}

#[derive(Default)]
pub(crate) struct Counter(AtomicUsize);

impl Counter {
    pub fn increment(&self) {
        self.increment_by(1);
    }

    pub fn increment_by(&self, by: usize) {
        self.0.fetch_add(by, Ordering::Relaxed);
    }

    pub fn sample(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time reading of one internal counter.
#[derive(Clone, Copy, Debug)]
pub struct MetricSample {
    pub name: &'static str,
    pub value: usize,
}

impl InternalMetrics {
    pub fn sample(&self) -> impl Iterator<Item = MetricSample> + 'static {
        let InternalMetrics {
            otlp_batch_encoded,
            otlp_bytes_encoded,
            otlp_marshaler_pool_reused,
            otlp_marshaler_pool_created,
            otlp_transport_failed,
        } = self;

        [
            MetricSample {
                name: stringify!(otlp_batch_encoded),
                value: otlp_batch_encoded.sample(),
            },
            MetricSample {
                name: stringify!(otlp_bytes_encoded),
                value: otlp_bytes_encoded.sample(),
            },
            MetricSample {
                name: stringify!(otlp_marshaler_pool_reused),
                value: otlp_marshaler_pool_reused.sample(),
            },
            MetricSample {
                name: stringify!(otlp_marshaler_pool_created),
                value: otlp_marshaler_pool_created.sample(),
            },
            MetricSample {
                name: stringify!(otlp_transport_failed),
                value: otlp_transport_failed.sample(),
            },
        ]
        .into_iter()
    }
}
