use bytes::BytesMut;

use crate::{
    context::MarshalerContext,
    id::{SpanId, TraceId},
    marshal::Encodable,
    proto::*,
};

use super::{size_any_value, size_attributes, write_any_value, write_attributes, AnyValue, KeyValue};

const LOG_RECORD_TIME_UNIX_NANO: Field = Field::fixed64(1);
const LOG_RECORD_SEVERITY_NUMBER: Field = Field::varint(2);
const LOG_RECORD_SEVERITY_TEXT: Field = Field::len(3);
const LOG_RECORD_BODY: Field = Field::len(5);
const LOG_RECORD_ATTRIBUTES: Field = Field::len(6);
const LOG_RECORD_DROPPED_ATTRIBUTES_COUNT: Field = Field::varint(7);
const LOG_RECORD_FLAGS: Field = Field::fixed32(8);
const LOG_RECORD_TRACE_ID: Field = Field::len(9);
const LOG_RECORD_SPAN_ID: Field = Field::len(10);
const LOG_RECORD_OBSERVED_TIME_UNIX_NANO: Field = Field::fixed64(11);

/**
The OTLP `SeverityNumber` ordinals.

Severities that don't map onto a named level must be carried as
[`SeverityNumber::Unspecified`], which encodes like any other proto3
default: by omission, decoded back as unspecified.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u32)]
pub enum SeverityNumber {
    #[default]
    Unspecified = 0,
    Trace = 1,
    Debug = 5,
    Info = 9,
    Warn = 13,
    Error = 17,
    Fatal = 21,
}

/**
A single log record.

`total_attribute_count` counts the attributes the record had before any were
dropped upstream; the encoder derives the wire-level dropped count from the
difference against the retained `attributes`.

The trace context is optional. Unset identifiers are omitted from the wire
entirely, but `flags` is always written, even when zero.
*/
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LogRecord {
    pub time_unix_nano: u64,
    pub observed_time_unix_nano: u64,
    pub severity_number: SeverityNumber,
    pub severity_text: String,
    pub body: Option<AnyValue>,
    pub attributes: Vec<KeyValue>,
    pub total_attribute_count: u32,
    pub flags: u32,
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
}

impl LogRecord {
    fn dropped_attributes_count(&self) -> u32 {
        self.total_attribute_count
            .saturating_sub(self.attributes.len() as u32)
    }
}

impl Encodable for LogRecord {
    fn size(&self, ctx: &mut MarshalerContext) -> usize {
        let mut n = 0;

        n += size_fixed64(LOG_RECORD_TIME_UNIX_NANO, self.time_unix_nano);
        n += size_varint32(LOG_RECORD_SEVERITY_NUMBER, self.severity_number as u32);
        n += size_string(LOG_RECORD_SEVERITY_TEXT, &self.severity_text);

        if let Some(ref body) = self.body {
            n += size_message(LOG_RECORD_BODY, ctx, |ctx| size_any_value(body, ctx));
        }

        n += size_attributes(LOG_RECORD_ATTRIBUTES, &self.attributes, ctx);
        n += size_varint32(
            LOG_RECORD_DROPPED_ATTRIBUTES_COUNT,
            self.dropped_attributes_count(),
        );

        // Flags carry the W3C trace flags byte and are written even at zero.
        n += LOG_RECORD_FLAGS.key_len() + 4;

        n += size_trace_id(LOG_RECORD_TRACE_ID, self.trace_id);
        n += size_span_id(LOG_RECORD_SPAN_ID, self.span_id);
        n += size_fixed64(
            LOG_RECORD_OBSERVED_TIME_UNIX_NANO,
            self.observed_time_unix_nano,
        );

        n
    }

    fn write(&self, buf: &mut BytesMut, ctx: &mut MarshalerContext) {
        use bytes::BufMut as _;

        put_fixed64(buf, LOG_RECORD_TIME_UNIX_NANO, self.time_unix_nano);
        put_varint32(buf, LOG_RECORD_SEVERITY_NUMBER, self.severity_number as u32);
        put_string(buf, LOG_RECORD_SEVERITY_TEXT, &self.severity_text);

        if let Some(ref body) = self.body {
            put_message(buf, LOG_RECORD_BODY, ctx, |buf, ctx| {
                write_any_value(buf, body, ctx)
            });
        }

        write_attributes(buf, LOG_RECORD_ATTRIBUTES, &self.attributes, ctx);
        put_varint32(
            buf,
            LOG_RECORD_DROPPED_ATTRIBUTES_COUNT,
            self.dropped_attributes_count(),
        );

        LOG_RECORD_FLAGS.put_key(buf);
        buf.put_u32_le(self.flags);

        put_trace_id(buf, LOG_RECORD_TRACE_ID, self.trace_id);
        put_span_id(buf, LOG_RECORD_SPAN_ID, self.span_id);
        put_fixed64(
            buf,
            LOG_RECORD_OBSERVED_TIME_UNIX_NANO,
            self.observed_time_unix_nano,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(record: &LogRecord) -> (usize, BytesMut) {
        let mut ctx = MarshalerContext::new();
        let size = record.size(&mut ctx);

        ctx.reset_read_index();

        let mut buf = BytesMut::new();
        record.write(&mut buf, &mut ctx);

        (size, buf)
    }

    #[test]
    fn simple_record_bytes() {
        let record = LogRecord {
            time_unix_nano: 1000,
            observed_time_unix_nano: 1000,
            severity_number: SeverityNumber::Info,
            severity_text: String::new(),
            body: Some(AnyValue::from("hello")),
            attributes: vec![KeyValue::new("k", "v")],
            total_attribute_count: 1,
            ..Default::default()
        };

        let (size, buf) = encode(&record);
        assert_eq!(size, buf.len());

        let mut expected = Vec::new();
        // time_unix_nano, fixed64
        expected.extend([0x09]);
        expected.extend(1000u64.to_le_bytes());
        // severity_number INFO
        expected.extend([0x10, 9]);
        // severity_text is empty and absent; body holds a string AnyValue
        expected.extend([0x2a, 0x07, 0x0a, 0x05]);
        expected.extend(b"hello");
        // one KeyValue attribute { "k": "v" }
        expected.extend([0x32, 0x08, 0x0a, 0x01, b'k', 0x12, 0x03, 0x0a, 0x01, b'v']);
        // dropped count is 1 - 1 = 0 and absent; flags written even at zero
        expected.extend([0x45, 0, 0, 0, 0]);
        // no trace or span ids
        // observed_time_unix_nano, fixed64
        expected.extend([0x59]);
        expected.extend(1000u64.to_le_bytes());

        assert_eq!(expected, &buf[..]);
    }

    #[test]
    fn unset_ids_are_omitted_and_set_ids_carry_full_width() {
        let mut record = LogRecord::default();

        let (without_ids, _) = encode(&record);

        record.trace_id = TraceId::from_u128(7);
        record.span_id = SpanId::from_u64(7);

        let (with_ids, buf) = encode(&record);

        // trace id: key + len + 16 bytes; span id: key + len + 8 bytes
        assert_eq!(without_ids + 18 + 10, with_ids);
        assert_eq!(with_ids, buf.len());
    }

    #[test]
    fn dropped_count_derives_from_total() {
        let record = LogRecord {
            attributes: vec![KeyValue::new("kept", 1i64)],
            total_attribute_count: 4,
            ..Default::default()
        };

        assert_eq!(3, record.dropped_attributes_count());

        // A total below the retained count never underflows.
        let record = LogRecord {
            attributes: vec![KeyValue::new("kept", 1i64)],
            total_attribute_count: 0,
            ..Default::default()
        };

        assert_eq!(0, record.dropped_attributes_count());
    }

    #[test]
    fn unspecified_severity_is_not_encoded() {
        let with = LogRecord {
            severity_number: SeverityNumber::Warn,
            ..Default::default()
        };
        let without = LogRecord::default();

        let (with_size, _) = encode(&with);
        let (without_size, _) = encode(&without);

        assert_eq!(with_size, without_size + 2);
    }
}
