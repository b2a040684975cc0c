/*!
The two-pass marshaling protocol.

An export request is encoded in two passes over the same grouped batch: a
size pass that measures every message body and queues the lengths in the
[`MarshalerContext`], then a write pass that replays the queue while
emitting bytes. Length-delimited messages need their byte length before
their payload, which is what forces the separate passes.

Both passes must traverse the batch identically. Rather than trusting
callers to invoke them in order, [`BatchMarshaler::marshal`] is the single
entry point and drives both passes from one traversal, so a size/write
mismatch can only come from a bug inside this crate's encoders, where the
tests live.

The nesting above individual records is the same for every signal:
`Export*ServiceRequest` holds repeated resource items (field 1), a resource
item holds its resource (1), scope items (2), and schema URL (3), and a
scope item holds its scope (1), records (2), and schema URL (3). The
request-level encoders are therefore written once, generic over the record
kind.
*/

use bytes::BytesMut;

use crate::{
    context::{ContextKey, MarshalerContext},
    data::{size_resource, size_scope, write_resource, write_scope},
    group::{group_by_resource_and_scope, ExportItem, Grouped},
    proto::*,
};

const REQUEST_RESOURCE_ITEMS: Field = Field::len(1);

const RESOURCE_ITEM_RESOURCE: Field = Field::len(1);
const RESOURCE_ITEM_SCOPE_ITEMS: Field = Field::len(2);
const RESOURCE_ITEM_SCHEMA_URL: Field = Field::len(3);

const SCOPE_ITEM_SCOPE: Field = Field::len(1);
const SCOPE_ITEM_RECORDS: Field = Field::len(2);
const SCOPE_ITEM_SCHEMA_URL: Field = Field::len(3);

/**
A record kind that can be marshaled into an OTLP export request.

Implemented by [`LogRecord`](crate::data::logs::LogRecord),
[`Span`](crate::data::traces::Span), and
[`Metric`](crate::data::metrics::Metric). `size` and `write` must visit
fields in the same order; the shared request machinery takes care of
everything above the record.
*/
pub trait Encodable {
    /// Measure the encoded body of this record, queuing embedded message
    /// lengths in the context.
    fn size(&self, ctx: &mut MarshalerContext) -> usize;

    /// Write the encoded body of this record, replaying the lengths the
    /// size pass queued.
    fn write(&self, buf: &mut BytesMut, ctx: &mut MarshalerContext);
}

fn size_request<R: Encodable>(grouped: &Grouped<R>, ctx: &mut MarshalerContext) -> usize {
    let mut n = 0;

    for (resource, scopes) in &grouped.resources {
        n += size_message(REQUEST_RESOURCE_ITEMS, ctx, |ctx| {
            let mut n = 0;

            n += size_message(RESOURCE_ITEM_RESOURCE, ctx, |ctx| {
                size_resource(resource, ctx)
            });

            for (scope, records) in scopes {
                n += size_message(RESOURCE_ITEM_SCOPE_ITEMS, ctx, |ctx| {
                    let mut n = 0;

                    n += size_message(SCOPE_ITEM_SCOPE, ctx, |ctx| size_scope(scope, ctx));

                    for record in records {
                        n += size_message(SCOPE_ITEM_RECORDS, ctx, |ctx| record.size(ctx));
                    }

                    n += size_string(SCOPE_ITEM_SCHEMA_URL, &scope.schema_url);

                    n
                });
            }

            n += size_string(RESOURCE_ITEM_SCHEMA_URL, &resource.schema_url);

            n
        });
    }

    n
}

fn write_request<R: Encodable>(
    buf: &mut BytesMut,
    grouped: &Grouped<R>,
    ctx: &mut MarshalerContext,
) {
    for (resource, scopes) in &grouped.resources {
        put_message(buf, REQUEST_RESOURCE_ITEMS, ctx, |buf, ctx| {
            put_message(buf, RESOURCE_ITEM_RESOURCE, ctx, |buf, ctx| {
                write_resource(buf, resource, ctx)
            });

            for (scope, records) in scopes {
                put_message(buf, RESOURCE_ITEM_SCOPE_ITEMS, ctx, |buf, ctx| {
                    put_message(buf, SCOPE_ITEM_SCOPE, ctx, |buf, ctx| {
                        write_scope(buf, scope, ctx)
                    });

                    for record in records {
                        put_message(buf, SCOPE_ITEM_RECORDS, ctx, |buf, ctx| {
                            record.write(buf, ctx)
                        });
                    }

                    put_string(buf, SCOPE_ITEM_SCHEMA_URL, &scope.schema_url);
                });
            }

            put_string(buf, RESOURCE_ITEM_SCHEMA_URL, &resource.schema_url);
        });
    }
}

/**
A batch encoder that owns its scratch state.

One `marshal` call runs grouping, the size pass, and the write pass, and
leaves the encoded request in an internal buffer. The context and buffer
keep their allocations across calls, so a marshaler drawn from a pool
encodes without fresh heap churn once warm; a marshaler built per call is
the immutable strategy.
*/
pub struct BatchMarshaler {
    ctx: MarshalerContext,
    buf: BytesMut,
    size_key: ContextKey,
}

impl Default for BatchMarshaler {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchMarshaler {
    pub fn new() -> Self {
        let mut ctx = MarshalerContext::new();
        let size_key = ctx.key();

        BatchMarshaler {
            ctx,
            buf: BytesMut::new(),
            size_key,
        }
    }

    /// Encode a grouped batch, returning the wire bytes. The returned slice
    /// borrows the marshaler's buffer and is valid until the next call.
    pub fn marshal<R: Encodable>(&mut self, items: &[ExportItem<R>]) -> &[u8] {
        self.ctx.reset();
        self.buf.clear();

        let grouped =
            group_by_resource_and_scope(items, |i| i.resource, |i| i.scope, |i| i.record);

        let size = size_request(&grouped, &mut self.ctx);
        self.ctx.set(self.size_key, size);

        self.buf.reserve(size);
        self.ctx.reset_read_index();
        write_request(&mut self.buf, &grouped, &mut self.ctx);

        debug_assert_eq!(size, self.buf.len(), "size/write pass divergence");
        debug_assert!(self.ctx.is_drained(), "write pass left unread sizes");

        &self.buf
    }

    /// The exact encoded size of the last marshaled batch.
    pub fn serialized_size(&self) -> usize {
        self.ctx.get(self.size_key)
    }

    /// The wire bytes of the last marshaled batch.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Clear all per-batch state, keeping allocations for reuse. Required
    /// before a marshaler is returned to a pool.
    pub fn reset(&mut self) {
        self.ctx.reset();
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::{
        logs::{LogRecord, SeverityNumber},
        AnyValue, InstrumentationScope, KeyValue, Resource,
    };

    fn sample_resource() -> Resource {
        Resource {
            attributes: vec![KeyValue::new("service.name", "web")],
            schema_url: "https://opentelemetry.io/schemas/1.21.0".to_owned(),
            ..Default::default()
        }
    }

    fn sample_record(body: &str) -> LogRecord {
        LogRecord {
            time_unix_nano: 1000,
            observed_time_unix_nano: 1000,
            severity_number: SeverityNumber::Info,
            body: Some(AnyValue::from(body)),
            ..Default::default()
        }
    }

    #[test]
    fn empty_batch_is_an_empty_request() {
        let mut marshaler = BatchMarshaler::new();
        let payload = marshaler.marshal::<LogRecord>(&[]);

        assert!(payload.is_empty());
        assert_eq!(0, marshaler.serialized_size());
    }

    #[test]
    fn size_matches_written_bytes() {
        let resource = sample_resource();
        let scope = InstrumentationScope::new("app");
        let records = [sample_record("one"), sample_record("two")];

        let items: Vec<_> = records
            .iter()
            .map(|r| ExportItem::new(&resource, &scope, r))
            .collect();

        let mut marshaler = BatchMarshaler::new();
        let payload = marshaler.marshal(&items).to_vec();

        assert_eq!(marshaler.serialized_size(), payload.len());
        assert!(!payload.is_empty());
    }

    #[test]
    fn marshaling_twice_is_byte_identical() {
        let resource = sample_resource();
        let scope = InstrumentationScope::new("app");
        let record = sample_record("again");
        let items = [ExportItem::new(&resource, &scope, &record)];

        let mut marshaler = BatchMarshaler::new();
        let first = marshaler.marshal(&items).to_vec();
        let second = marshaler.marshal(&items).to_vec();

        assert_eq!(first, second);
    }

    #[test]
    fn write_pass_replays_after_rewind() {
        let resource = sample_resource();
        let scope = InstrumentationScope::new("app");
        let record = sample_record("replayed");
        let items = [ExportItem::new(&resource, &scope, &record)];

        let grouped =
            group_by_resource_and_scope(&items, |i| i.resource, |i| i.scope, |i| i.record);

        let mut ctx = MarshalerContext::new();
        let size = size_request(&grouped, &mut ctx);

        // One size pass feeds two write passes, as for a retried write.
        ctx.reset_read_index();
        let mut first = BytesMut::new();
        write_request(&mut first, &grouped, &mut ctx);

        ctx.reset_read_index();
        let mut second = BytesMut::new();
        write_request(&mut second, &grouped, &mut ctx);

        assert_eq!(size, first.len());
        assert_eq!(first, second);
    }

    #[test]
    fn reused_marshaler_leaks_nothing_across_batches() {
        let resource = sample_resource();
        let scope = InstrumentationScope::new("app");

        let big = sample_record("a long body that pads the first batch out");
        let small = sample_record("s");

        let mut reused = BatchMarshaler::new();
        reused.marshal(&[ExportItem::new(&resource, &scope, &big)]);

        let reused_bytes = reused
            .marshal(&[ExportItem::new(&resource, &scope, &small)])
            .to_vec();

        let fresh_bytes = BatchMarshaler::new()
            .marshal(&[ExportItem::new(&resource, &scope, &small)])
            .to_vec();

        assert_eq!(fresh_bytes, reused_bytes);
    }
}
