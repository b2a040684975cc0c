/*!
Protobuf wire primitives.

This module is the only place that knows how bytes are laid out on the wire.
Everything is split into a size half and a write half; the write half must
put exactly the bytes the size half counted, in the same order. Length
prefixes for embedded messages go through the [`MarshalerContext`] size
queue so the write pass never recomputes a child size.

Scalar fields follow the proto3 default-omission rule: a zero scalar or an
empty string/bytes field is not encoded at all. Receivers decode absence as
the default value, so omission is a compatibility requirement rather than a
space optimization.
*/

use bytes::{BufMut, BytesMut};

use crate::{
    context::MarshalerContext,
    id::{SpanId, TraceId},
};

/// Number of bytes a base-128 varint takes on the wire (1 to 10).
pub(crate) const fn varint_len(v: u64) -> usize {
    if v == 0 {
        1
    } else {
        (64 - v.leading_zeros() as usize + 6) / 7
    }
}

pub(crate) fn put_varint(buf: &mut BytesMut, mut v: u64) {
    loop {
        let b = (v & 0x7f) as u8;
        v >>= 7;

        if v == 0 {
            buf.put_u8(b);
            break;
        }

        buf.put_u8(b | 0x80);
    }
}

/// A field key: the field number pre-shifted together with its wire type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Field(u32);

impl Field {
    pub(crate) const fn varint(number: u32) -> Self {
        Field(number << 3)
    }

    pub(crate) const fn fixed64(number: u32) -> Self {
        Field(number << 3 | 1)
    }

    pub(crate) const fn len(number: u32) -> Self {
        Field(number << 3 | 2)
    }

    pub(crate) const fn fixed32(number: u32) -> Self {
        Field(number << 3 | 5)
    }

    pub(crate) const fn key_len(self) -> usize {
        varint_len(self.0 as u64)
    }

    pub(crate) fn put_key(self, buf: &mut BytesMut) {
        put_varint(buf, self.0 as u64);
    }
}

pub(crate) fn size_varint32(field: Field, v: u32) -> usize {
    if v == 0 {
        0
    } else {
        field.key_len() + varint_len(v as u64)
    }
}

pub(crate) fn put_varint32(buf: &mut BytesMut, field: Field, v: u32) {
    if v != 0 {
        field.put_key(buf);
        put_varint(buf, v as u64);
    }
}

// Signed 64-bit values use the plain (sign-extended) varint encoding, so a
// negative value always takes the full 10 bytes.
pub(crate) fn size_int64(field: Field, v: i64) -> usize {
    if v == 0 {
        0
    } else {
        field.key_len() + varint_len(v as u64)
    }
}

pub(crate) fn put_int64(buf: &mut BytesMut, field: Field, v: i64) {
    if v != 0 {
        field.put_key(buf);
        put_varint(buf, v as u64);
    }
}

pub(crate) fn size_bool(field: Field, v: bool) -> usize {
    if v {
        field.key_len() + 1
    } else {
        0
    }
}

pub(crate) fn put_bool(buf: &mut BytesMut, field: Field, v: bool) {
    if v {
        field.put_key(buf);
        buf.put_u8(1);
    }
}

pub(crate) fn size_fixed64(field: Field, v: u64) -> usize {
    if v == 0 {
        0
    } else {
        field.key_len() + 8
    }
}

pub(crate) fn put_fixed64(buf: &mut BytesMut, field: Field, v: u64) {
    if v != 0 {
        field.put_key(buf);
        buf.put_u64_le(v);
    }
}

pub(crate) fn size_fixed32(field: Field, v: u32) -> usize {
    if v == 0 {
        0
    } else {
        field.key_len() + 4
    }
}

pub(crate) fn put_fixed32(buf: &mut BytesMut, field: Field, v: u32) {
    if v != 0 {
        field.put_key(buf);
        buf.put_u32_le(v);
    }
}

// Doubles are omitted on a zero bit pattern, so -0.0 is still encoded.
pub(crate) fn size_double(field: Field, v: f64) -> usize {
    if v.to_bits() == 0 {
        0
    } else {
        field.key_len() + 8
    }
}

pub(crate) fn put_double(buf: &mut BytesMut, field: Field, v: f64) {
    if v.to_bits() != 0 {
        field.put_key(buf);
        buf.put_f64_le(v);
    }
}

pub(crate) fn size_string(field: Field, v: &str) -> usize {
    size_bytes(field, v.as_bytes())
}

pub(crate) fn put_string(buf: &mut BytesMut, field: Field, v: &str) {
    put_bytes(buf, field, v.as_bytes());
}

pub(crate) fn size_bytes(field: Field, v: &[u8]) -> usize {
    if v.is_empty() {
        0
    } else {
        field.key_len() + varint_len(v.len() as u64) + v.len()
    }
}

pub(crate) fn put_bytes(buf: &mut BytesMut, field: Field, v: &[u8]) {
    if !v.is_empty() {
        field.put_key(buf);
        put_varint(buf, v.len() as u64);
        buf.put_slice(v);
    }
}

// Identifiers are omitted entirely when unset. `TraceId` and `SpanId` can't
// hold the all-zero sentinel, so `None` is the only unset representation.

pub(crate) fn size_trace_id(field: Field, id: Option<TraceId>) -> usize {
    match id {
        Some(_) => field.key_len() + 1 + 16,
        None => 0,
    }
}

pub(crate) fn put_trace_id(buf: &mut BytesMut, field: Field, id: Option<TraceId>) {
    if let Some(id) = id {
        field.put_key(buf);
        put_varint(buf, 16);
        buf.put_slice(&id.to_bytes());
    }
}

pub(crate) fn size_span_id(field: Field, id: Option<SpanId>) -> usize {
    match id {
        Some(_) => field.key_len() + 1 + 8,
        None => 0,
    }
}

pub(crate) fn put_span_id(buf: &mut BytesMut, field: Field, id: Option<SpanId>) {
    if let Some(id) = id {
        field.put_key(buf);
        put_varint(buf, 8);
        buf.put_slice(&id.to_bytes());
    }
}

/**
Size an embedded message field.

Reserves a slot in the context size queue before descending so the queue
ends up in pre-order: a parent's length is always replayed before its
children's during the write pass.
*/
pub(crate) fn size_message(
    field: Field,
    ctx: &mut MarshalerContext,
    body: impl FnOnce(&mut MarshalerContext) -> usize,
) -> usize {
    let slot = ctx.reserve_size();
    let body_len = body(ctx);
    ctx.set_size(slot, body_len);

    field.key_len() + varint_len(body_len as u64) + body_len
}

/// Write an embedded message field, replaying the length the size pass
/// computed for it.
pub(crate) fn put_message(
    buf: &mut BytesMut,
    field: Field,
    ctx: &mut MarshalerContext,
    body: impl FnOnce(&mut BytesMut, &mut MarshalerContext),
) {
    let body_len = ctx.next_size();

    field.put_key(buf);
    put_varint(buf, body_len as u64);

    let at = buf.len();
    body(buf, ctx);
    debug_assert_eq!(buf.len() - at, body_len, "size/write pass divergence");
}

// Packed repeated scalars: one key, one length prefix, then the raw payload.
// An empty sequence is omitted like any other default.

pub(crate) fn size_packed_fixed64(field: Field, vals: &[u64]) -> usize {
    if vals.is_empty() {
        0
    } else {
        let payload = vals.len() * 8;
        field.key_len() + varint_len(payload as u64) + payload
    }
}

pub(crate) fn put_packed_fixed64(buf: &mut BytesMut, field: Field, vals: &[u64]) {
    if !vals.is_empty() {
        field.put_key(buf);
        put_varint(buf, (vals.len() * 8) as u64);

        for v in vals {
            buf.put_u64_le(*v);
        }
    }
}

pub(crate) fn size_packed_double(field: Field, vals: &[f64]) -> usize {
    if vals.is_empty() {
        0
    } else {
        let payload = vals.len() * 8;
        field.key_len() + varint_len(payload as u64) + payload
    }
}

pub(crate) fn put_packed_double(buf: &mut BytesMut, field: Field, vals: &[f64]) {
    if !vals.is_empty() {
        field.put_key(buf);
        put_varint(buf, (vals.len() * 8) as u64);

        for v in vals {
            buf.put_f64_le(*v);
        }
    }
}
