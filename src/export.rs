/*!
Export orchestration.

An [`Exporter`] drives one encode-and-send per call. The encoding strategy
is fixed when the exporter is built: the immutable strategy constructs a
fresh [`BatchMarshaler`] per export, while the reusable strategy draws one
from a pool owned by the exporter and recycles it afterwards.

Pooled marshalers are held through a guard, so they are reset and returned
on every exit path, including a transport failure. A single pooled instance
is never shared between in-flight exports; exclusivity comes from the
draw/return protocol, not from locking inside the instance. An empty pool
is never an error, it just constructs a fresh instance.
*/

use std::sync::Mutex;

use crate::{
    group::ExportItem, internal_metrics::InternalMetrics, marshal::BatchMarshaler,
    marshal::Encodable, Error, MetricSample,
};

/**
The delivery side of an export.

Called once per export with the completed wire payload. The slice borrows
the encoder's buffer and is only valid for the duration of the call;
transports that deliver asynchronously must copy it. Retry, compression,
and connection management all live behind this trait.
*/
pub trait Transport {
    fn send(&self, payload: &[u8]) -> Result<(), Error>;
}

impl<T: Transport> Transport for &T {
    fn send(&self, payload: &[u8]) -> Result<(), Error> {
        (**self).send(payload)
    }
}

/// The encoding strategy an [`Exporter`] uses for its whole lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EncodeMode {
    /// Build a fresh marshaler per export call and discard it afterwards.
    Immutable,
    /// Recycle marshalers through a pool to avoid per-export allocation.
    Reusable,
}

struct MarshalerPool {
    free: Mutex<Vec<BatchMarshaler>>,
}

impl MarshalerPool {
    fn new() -> Self {
        MarshalerPool {
            free: Mutex::new(Vec::new()),
        }
    }

    fn acquire<'a>(&'a self, metrics: &InternalMetrics) -> PooledMarshaler<'a> {
        let reused = self.free.lock().unwrap().pop();

        let marshaler = match reused {
            Some(marshaler) => {
                metrics.otlp_marshaler_pool_reused.increment();
                marshaler
            }
            None => {
                metrics.otlp_marshaler_pool_created.increment();
                BatchMarshaler::new()
            }
        };

        PooledMarshaler {
            pool: self,
            marshaler: Some(marshaler),
        }
    }
}

/// Scoped ownership of a pooled marshaler; dropping it resets the instance
/// and hands it back, whatever path the export took.
struct PooledMarshaler<'a> {
    pool: &'a MarshalerPool,
    marshaler: Option<BatchMarshaler>,
}

impl<'a> Drop for PooledMarshaler<'a> {
    fn drop(&mut self) {
        if let Some(mut marshaler) = self.marshaler.take() {
            marshaler.reset();
            self.pool.free.lock().unwrap().push(marshaler);
        }
    }
}

impl<'a> std::ops::Deref for PooledMarshaler<'a> {
    type Target = BatchMarshaler;

    fn deref(&self) -> &BatchMarshaler {
        self.marshaler.as_ref().unwrap()
    }
}

impl<'a> std::ops::DerefMut for PooledMarshaler<'a> {
    fn deref_mut(&mut self) -> &mut BatchMarshaler {
        self.marshaler.as_mut().unwrap()
    }
}

/**
Encodes batches of telemetry and hands the bytes to a [`Transport`].

One exporter serves one signal's export calls, possibly from several
threads at once. Construction picks the [`EncodeMode`] for good; the pool
backing the reusable mode belongs to this instance and goes away with it.
*/
pub struct Exporter<T> {
    transport: T,
    mode: EncodeMode,
    pool: MarshalerPool,
    metrics: InternalMetrics,
}

impl<T: Transport> Exporter<T> {
    pub fn new(transport: T, mode: EncodeMode) -> Self {
        Exporter {
            transport,
            mode,
            pool: MarshalerPool::new(),
            metrics: InternalMetrics::default(),
        }
    }

    /// Encode one batch and send it. Returns the transport's completion.
    pub fn export<R: Encodable>(&self, items: &[ExportItem<R>]) -> Result<(), Error> {
        match self.mode {
            EncodeMode::Immutable => {
                let mut marshaler = BatchMarshaler::new();
                let payload = marshaler.marshal(items);

                self.send(payload)
            }
            EncodeMode::Reusable => {
                let mut marshaler = self.pool.acquire(&self.metrics);
                let payload = marshaler.marshal(items);

                self.send(payload)
            }
        }
    }

    fn send(&self, payload: &[u8]) -> Result<(), Error> {
        self.metrics.otlp_batch_encoded.increment();
        self.metrics.otlp_bytes_encoded.increment_by(payload.len());

        self.transport.send(payload).map_err(|e| {
            self.metrics.otlp_transport_failed.increment();
            e
        })
    }

    /// Sample this exporter's internal counters.
    pub fn sample_metrics(&self) -> impl Iterator<Item = MetricSample> + 'static {
        self.metrics.sample()
    }
}
