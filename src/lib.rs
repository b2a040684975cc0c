/*!
Encode telemetry into the OTLP binary wire format without a protobuf
runtime.

This library is the wire-encoding core of an OTLP exporter. It takes flat
batches of log records, spans, or metrics, groups them under their resource
and instrumentation scope, and produces the bytes of the corresponding
`Export*ServiceRequest` protobuf message, byte-compatible with any standard
OTLP receiver.

The protobuf subset involved (varints, length-delimited messages, packed
and repeated fields, fixed-width integers, enums) is implemented by hand.
Length-delimited messages need their size before their payload, so encoding
runs in two passes: a size pass that measures everything once, then a write
pass that replays those measurements while emitting bytes.

# Getting started

Build an [`Exporter`] over a [`Transport`] and feed it batches:

```
use otlp_wire::{
    data::{logs::LogRecord, InstrumentationScope, Resource},
    EncodeMode, Error, ExportItem, Exporter, Transport,
};

struct Stdout;

impl Transport for Stdout {
    fn send(&self, payload: &[u8]) -> Result<(), Error> {
        println!("export of {} bytes", payload.len());
        Ok(())
    }
}

let exporter = Exporter::new(Stdout, EncodeMode::Reusable);

let resource = Resource::default();
let scope = InstrumentationScope::new("my_app");
let record = LogRecord::default();

exporter
    .export(&[ExportItem::new(&resource, &scope, &record)])
    .unwrap();
```

[`EncodeMode::Reusable`] recycles encoder state through a pool owned by the
exporter, keeping high-frequency export loops free of per-call heap churn;
[`EncodeMode::Immutable`] allocates fresh state per call. Both produce
identical bytes.

The lower-level [`BatchMarshaler`] is available for callers that want the
encoded bytes without the orchestration.
*/

pub mod data;

mod context;
mod error;
mod export;
mod group;
mod id;
mod internal_metrics;
mod marshal;
mod proto;

pub use self::{
    context::{ContextKey, MarshalerContext},
    error::Error,
    export::{EncodeMode, Exporter, Transport},
    group::ExportItem,
    id::{ParseIdError, SpanId, TraceId},
    internal_metrics::MetricSample,
    marshal::{BatchMarshaler, Encodable},
};
