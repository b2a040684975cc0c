use bytes::BytesMut;

use crate::{
    context::MarshalerContext,
    id::{SpanId, TraceId},
    marshal::Encodable,
    proto::*,
};

use super::{size_attributes, write_attributes, KeyValue};

const SPAN_TRACE_ID: Field = Field::len(1);
const SPAN_SPAN_ID: Field = Field::len(2);
const SPAN_TRACE_STATE: Field = Field::len(3);
const SPAN_PARENT_SPAN_ID: Field = Field::len(4);
const SPAN_NAME: Field = Field::len(5);
const SPAN_KIND: Field = Field::varint(6);
const SPAN_START_TIME_UNIX_NANO: Field = Field::fixed64(7);
const SPAN_END_TIME_UNIX_NANO: Field = Field::fixed64(8);
const SPAN_ATTRIBUTES: Field = Field::len(9);
const SPAN_DROPPED_ATTRIBUTES_COUNT: Field = Field::varint(10);
const SPAN_EVENTS: Field = Field::len(11);
const SPAN_DROPPED_EVENTS_COUNT: Field = Field::varint(12);
const SPAN_LINKS: Field = Field::len(13);
const SPAN_DROPPED_LINKS_COUNT: Field = Field::varint(14);
const SPAN_STATUS: Field = Field::len(15);
const SPAN_FLAGS: Field = Field::fixed32(16);

const EVENT_TIME_UNIX_NANO: Field = Field::fixed64(1);
const EVENT_NAME: Field = Field::len(2);
const EVENT_ATTRIBUTES: Field = Field::len(3);
const EVENT_DROPPED_ATTRIBUTES_COUNT: Field = Field::varint(4);

const LINK_TRACE_ID: Field = Field::len(1);
const LINK_SPAN_ID: Field = Field::len(2);
const LINK_TRACE_STATE: Field = Field::len(3);
const LINK_ATTRIBUTES: Field = Field::len(4);
const LINK_DROPPED_ATTRIBUTES_COUNT: Field = Field::varint(5);
const LINK_FLAGS: Field = Field::fixed32(6);

const STATUS_MESSAGE: Field = Field::len(2);
const STATUS_CODE: Field = Field::varint(3);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u32)]
pub enum SpanKind {
    #[default]
    Unspecified = 0,
    Internal = 1,
    Server = 2,
    Client = 3,
    Producer = 4,
    Consumer = 5,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u32)]
pub enum StatusCode {
    #[default]
    Unset = 0,
    Ok = 1,
    Error = 2,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct SpanStatus {
    pub message: String,
    pub code: StatusCode,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct SpanEvent {
    pub time_unix_nano: u64,
    pub name: String,
    pub attributes: Vec<KeyValue>,
    pub total_attribute_count: u32,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct SpanLink {
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub trace_state: String,
    pub attributes: Vec<KeyValue>,
    pub total_attribute_count: u32,
    pub flags: u32,
}

/// A single span. Dropped attribute, event, and link counts are derived
/// from the total counts the same way log records derive theirs.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Span {
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub trace_state: String,
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub kind: SpanKind,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
    pub total_attribute_count: u32,
    pub events: Vec<SpanEvent>,
    pub total_event_count: u32,
    pub links: Vec<SpanLink>,
    pub total_link_count: u32,
    pub status: Option<SpanStatus>,
    pub flags: u32,
}

fn dropped(total: u32, retained: usize) -> u32 {
    total.saturating_sub(retained as u32)
}

fn size_event(event: &SpanEvent, ctx: &mut MarshalerContext) -> usize {
    size_fixed64(EVENT_TIME_UNIX_NANO, event.time_unix_nano)
        + size_string(EVENT_NAME, &event.name)
        + size_attributes(EVENT_ATTRIBUTES, &event.attributes, ctx)
        + size_varint32(
            EVENT_DROPPED_ATTRIBUTES_COUNT,
            dropped(event.total_attribute_count, event.attributes.len()),
        )
}

fn write_event(buf: &mut BytesMut, event: &SpanEvent, ctx: &mut MarshalerContext) {
    put_fixed64(buf, EVENT_TIME_UNIX_NANO, event.time_unix_nano);
    put_string(buf, EVENT_NAME, &event.name);
    write_attributes(buf, EVENT_ATTRIBUTES, &event.attributes, ctx);
    put_varint32(
        buf,
        EVENT_DROPPED_ATTRIBUTES_COUNT,
        dropped(event.total_attribute_count, event.attributes.len()),
    );
}

fn size_link(link: &SpanLink, ctx: &mut MarshalerContext) -> usize {
    size_trace_id(LINK_TRACE_ID, link.trace_id)
        + size_span_id(LINK_SPAN_ID, link.span_id)
        + size_string(LINK_TRACE_STATE, &link.trace_state)
        + size_attributes(LINK_ATTRIBUTES, &link.attributes, ctx)
        + size_varint32(
            LINK_DROPPED_ATTRIBUTES_COUNT,
            dropped(link.total_attribute_count, link.attributes.len()),
        )
        + size_fixed32(LINK_FLAGS, link.flags)
}

fn write_link(buf: &mut BytesMut, link: &SpanLink, ctx: &mut MarshalerContext) {
    put_trace_id(buf, LINK_TRACE_ID, link.trace_id);
    put_span_id(buf, LINK_SPAN_ID, link.span_id);
    put_string(buf, LINK_TRACE_STATE, &link.trace_state);
    write_attributes(buf, LINK_ATTRIBUTES, &link.attributes, ctx);
    put_varint32(
        buf,
        LINK_DROPPED_ATTRIBUTES_COUNT,
        dropped(link.total_attribute_count, link.attributes.len()),
    );
    put_fixed32(buf, LINK_FLAGS, link.flags);
}

fn size_status(status: &SpanStatus) -> usize {
    size_string(STATUS_MESSAGE, &status.message) + size_varint32(STATUS_CODE, status.code as u32)
}

fn write_status(buf: &mut BytesMut, status: &SpanStatus) {
    put_string(buf, STATUS_MESSAGE, &status.message);
    put_varint32(buf, STATUS_CODE, status.code as u32);
}

impl Encodable for Span {
    fn size(&self, ctx: &mut MarshalerContext) -> usize {
        let mut n = 0;

        n += size_trace_id(SPAN_TRACE_ID, self.trace_id);
        n += size_span_id(SPAN_SPAN_ID, self.span_id);
        n += size_string(SPAN_TRACE_STATE, &self.trace_state);
        n += size_span_id(SPAN_PARENT_SPAN_ID, self.parent_span_id);
        n += size_string(SPAN_NAME, &self.name);
        n += size_varint32(SPAN_KIND, self.kind as u32);
        n += size_fixed64(SPAN_START_TIME_UNIX_NANO, self.start_time_unix_nano);
        n += size_fixed64(SPAN_END_TIME_UNIX_NANO, self.end_time_unix_nano);
        n += size_attributes(SPAN_ATTRIBUTES, &self.attributes, ctx);
        n += size_varint32(
            SPAN_DROPPED_ATTRIBUTES_COUNT,
            dropped(self.total_attribute_count, self.attributes.len()),
        );

        for event in &self.events {
            n += size_message(SPAN_EVENTS, ctx, |ctx| size_event(event, ctx));
        }
        n += size_varint32(
            SPAN_DROPPED_EVENTS_COUNT,
            dropped(self.total_event_count, self.events.len()),
        );

        for link in &self.links {
            n += size_message(SPAN_LINKS, ctx, |ctx| size_link(link, ctx));
        }
        n += size_varint32(
            SPAN_DROPPED_LINKS_COUNT,
            dropped(self.total_link_count, self.links.len()),
        );

        if let Some(ref status) = self.status {
            n += size_message(SPAN_STATUS, ctx, |_| size_status(status));
        }

        n += size_fixed32(SPAN_FLAGS, self.flags);

        n
    }

    fn write(&self, buf: &mut BytesMut, ctx: &mut MarshalerContext) {
        put_trace_id(buf, SPAN_TRACE_ID, self.trace_id);
        put_span_id(buf, SPAN_SPAN_ID, self.span_id);
        put_string(buf, SPAN_TRACE_STATE, &self.trace_state);
        put_span_id(buf, SPAN_PARENT_SPAN_ID, self.parent_span_id);
        put_string(buf, SPAN_NAME, &self.name);
        put_varint32(buf, SPAN_KIND, self.kind as u32);
        put_fixed64(buf, SPAN_START_TIME_UNIX_NANO, self.start_time_unix_nano);
        put_fixed64(buf, SPAN_END_TIME_UNIX_NANO, self.end_time_unix_nano);
        write_attributes(buf, SPAN_ATTRIBUTES, &self.attributes, ctx);
        put_varint32(
            buf,
            SPAN_DROPPED_ATTRIBUTES_COUNT,
            dropped(self.total_attribute_count, self.attributes.len()),
        );

        for event in &self.events {
            put_message(buf, SPAN_EVENTS, ctx, |buf, ctx| write_event(buf, event, ctx));
        }
        put_varint32(
            buf,
            SPAN_DROPPED_EVENTS_COUNT,
            dropped(self.total_event_count, self.events.len()),
        );

        for link in &self.links {
            put_message(buf, SPAN_LINKS, ctx, |buf, ctx| write_link(buf, link, ctx));
        }
        put_varint32(
            buf,
            SPAN_DROPPED_LINKS_COUNT,
            dropped(self.total_link_count, self.links.len()),
        );

        if let Some(ref status) = self.status {
            put_message(buf, SPAN_STATUS, ctx, |buf, _| write_status(buf, status));
        }

        put_fixed32(buf, SPAN_FLAGS, self.flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(span: &Span) -> (usize, BytesMut) {
        let mut ctx = MarshalerContext::new();
        let size = span.size(&mut ctx);

        ctx.reset_read_index();

        let mut buf = BytesMut::new();
        span.write(&mut buf, &mut ctx);

        (size, buf)
    }

    fn sample_span() -> Span {
        Span {
            trace_id: TraceId::from_u128(0x4bf92f3577b34da6a3ce929d0e0e4736),
            span_id: SpanId::from_u64(0x00f067aa0ba902b7),
            parent_span_id: SpanId::from_u64(0x00f067aa0ba902b8),
            name: "GET /".to_owned(),
            kind: SpanKind::Server,
            start_time_unix_nano: 1_000,
            end_time_unix_nano: 2_000,
            attributes: vec![KeyValue::new("http.status_code", 200i64)],
            total_attribute_count: 1,
            events: vec![SpanEvent {
                time_unix_nano: 1_500,
                name: "resolved".to_owned(),
                ..Default::default()
            }],
            total_event_count: 1,
            links: vec![SpanLink {
                trace_id: TraceId::from_u128(99),
                span_id: SpanId::from_u64(98),
                ..Default::default()
            }],
            total_link_count: 1,
            status: Some(SpanStatus {
                message: String::new(),
                code: StatusCode::Ok,
            }),
            flags: 1,
            ..Default::default()
        }
    }

    #[test]
    fn size_matches_written_bytes() {
        let (size, buf) = encode(&sample_span());
        assert_eq!(size, buf.len());
    }

    #[test]
    fn empty_span_still_sizes_consistently() {
        let (size, buf) = encode(&Span::default());
        assert_eq!(size, buf.len());
        // Every field of a default span is at its default and omitted.
        assert!(buf.is_empty());
    }

    #[test]
    fn unset_status_is_omitted() {
        let mut span = sample_span();
        let (with_status, _) = encode(&span);

        span.status = None;
        let (without_status, _) = encode(&span);

        // status held only its code: key + len + (code key + code value)
        assert_eq!(with_status, without_status + 4);
    }
}
