use std::hash::{Hash, Hasher};

use bytes::BytesMut;

use crate::{context::MarshalerContext, proto::*};

const ANY_VALUE_STRING: Field = Field::len(1);
const ANY_VALUE_BOOL: Field = Field::varint(2);
const ANY_VALUE_INT: Field = Field::varint(3);
const ANY_VALUE_DOUBLE: Field = Field::fixed64(4);
const ANY_VALUE_ARRAY: Field = Field::len(5);
const ANY_VALUE_KVLIST: Field = Field::len(6);
const ANY_VALUE_BYTES: Field = Field::len(7);

const ARRAY_VALUES: Field = Field::len(1);
const KVLIST_VALUES: Field = Field::len(1);

const KEY_VALUE_KEY: Field = Field::len(1);
const KEY_VALUE_VALUE: Field = Field::len(2);

/**
A dynamically typed attribute or body value.

The variants mirror the `AnyValue` oneof in the OTLP schema. Values nest
arbitrarily deep through [`AnyValue::Array`] and [`AnyValue::Map`]; the
encoder recurses to whatever depth the caller's data has.
*/
#[derive(Clone, Debug)]
pub enum AnyValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    Array(Vec<AnyValue>),
    Map(Vec<KeyValue>),
}

// Grouping buckets resources and scopes by value, so `AnyValue` needs
// `Eq` and `Hash`. Doubles compare and hash by bit pattern, which keeps
// hashing total (NaN == NaN) and deterministic.
impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AnyValue::String(a), AnyValue::String(b)) => a == b,
            (AnyValue::Bool(a), AnyValue::Bool(b)) => a == b,
            (AnyValue::Int(a), AnyValue::Int(b)) => a == b,
            (AnyValue::Double(a), AnyValue::Double(b)) => a.to_bits() == b.to_bits(),
            (AnyValue::Bytes(a), AnyValue::Bytes(b)) => a == b,
            (AnyValue::Array(a), AnyValue::Array(b)) => a == b,
            (AnyValue::Map(a), AnyValue::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AnyValue {}

impl Hash for AnyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);

        match self {
            AnyValue::String(v) => v.hash(state),
            AnyValue::Bool(v) => v.hash(state),
            AnyValue::Int(v) => v.hash(state),
            AnyValue::Double(v) => v.to_bits().hash(state),
            AnyValue::Bytes(v) => v.hash(state),
            AnyValue::Array(v) => v.hash(state),
            AnyValue::Map(v) => v.hash(state),
        }
    }
}

impl From<&str> for AnyValue {
    fn from(v: &str) -> Self {
        AnyValue::String(v.to_owned())
    }
}

impl From<String> for AnyValue {
    fn from(v: String) -> Self {
        AnyValue::String(v)
    }
}

impl From<bool> for AnyValue {
    fn from(v: bool) -> Self {
        AnyValue::Bool(v)
    }
}

impl From<i64> for AnyValue {
    fn from(v: i64) -> Self {
        AnyValue::Int(v)
    }
}

impl From<f64> for AnyValue {
    fn from(v: f64) -> Self {
        AnyValue::Double(v)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<AnyValue>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

// A scalar at its default (empty string, false, 0, 0.0) is omitted inside
// the `AnyValue` message too, leaving an empty message on the wire.
// Receivers read the absent oneof back as unset, which matches the
// reference OTLP encoding.

pub(crate) fn size_any_value(v: &AnyValue, ctx: &mut MarshalerContext) -> usize {
    match v {
        AnyValue::String(v) => size_string(ANY_VALUE_STRING, v),
        AnyValue::Bool(v) => size_bool(ANY_VALUE_BOOL, *v),
        AnyValue::Int(v) => size_int64(ANY_VALUE_INT, *v),
        AnyValue::Double(v) => size_double(ANY_VALUE_DOUBLE, *v),
        AnyValue::Bytes(v) => size_bytes(ANY_VALUE_BYTES, v),
        AnyValue::Array(vs) => size_message(ANY_VALUE_ARRAY, ctx, |ctx| {
            let mut n = 0;
            for v in vs {
                n += size_message(ARRAY_VALUES, ctx, |ctx| size_any_value(v, ctx));
            }
            n
        }),
        AnyValue::Map(kvs) => size_message(ANY_VALUE_KVLIST, ctx, |ctx| {
            let mut n = 0;
            for kv in kvs {
                n += size_message(KVLIST_VALUES, ctx, |ctx| size_key_value(kv, ctx));
            }
            n
        }),
    }
}

pub(crate) fn write_any_value(buf: &mut BytesMut, v: &AnyValue, ctx: &mut MarshalerContext) {
    match v {
        AnyValue::String(v) => put_string(buf, ANY_VALUE_STRING, v),
        AnyValue::Bool(v) => put_bool(buf, ANY_VALUE_BOOL, *v),
        AnyValue::Int(v) => put_int64(buf, ANY_VALUE_INT, *v),
        AnyValue::Double(v) => put_double(buf, ANY_VALUE_DOUBLE, *v),
        AnyValue::Bytes(v) => put_bytes(buf, ANY_VALUE_BYTES, v),
        AnyValue::Array(vs) => put_message(buf, ANY_VALUE_ARRAY, ctx, |buf, ctx| {
            for v in vs {
                put_message(buf, ARRAY_VALUES, ctx, |buf, ctx| {
                    write_any_value(buf, v, ctx)
                });
            }
        }),
        AnyValue::Map(kvs) => put_message(buf, ANY_VALUE_KVLIST, ctx, |buf, ctx| {
            for kv in kvs {
                put_message(buf, KVLIST_VALUES, ctx, |buf, ctx| {
                    write_key_value(buf, kv, ctx)
                });
            }
        }),
    }
}

pub(crate) fn size_key_value(kv: &KeyValue, ctx: &mut MarshalerContext) -> usize {
    size_string(KEY_VALUE_KEY, &kv.key)
        + size_message(KEY_VALUE_VALUE, ctx, |ctx| size_any_value(&kv.value, ctx))
}

pub(crate) fn write_key_value(buf: &mut BytesMut, kv: &KeyValue, ctx: &mut MarshalerContext) {
    put_string(buf, KEY_VALUE_KEY, &kv.key);
    put_message(buf, KEY_VALUE_VALUE, ctx, |buf, ctx| {
        write_any_value(buf, &kv.value, ctx)
    });
}

/// Size a repeated `KeyValue` field.
pub(crate) fn size_attributes(field: Field, attrs: &[KeyValue], ctx: &mut MarshalerContext) -> usize {
    let mut n = 0;
    for kv in attrs {
        n += size_message(field, ctx, |ctx| size_key_value(kv, ctx));
    }
    n
}

pub(crate) fn write_attributes(
    buf: &mut BytesMut,
    field: Field,
    attrs: &[KeyValue],
    ctx: &mut MarshalerContext,
) {
    for kv in attrs {
        put_message(buf, field, ctx, |buf, ctx| write_key_value(buf, kv, ctx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(v: &AnyValue) -> (usize, BytesMut) {
        let mut ctx = MarshalerContext::new();
        let size = size_any_value(v, &mut ctx);

        ctx.reset_read_index();

        let mut buf = BytesMut::new();
        write_any_value(&mut buf, v, &mut ctx);

        (size, buf)
    }

    #[test]
    fn string_value() {
        let (size, buf) = encode(&AnyValue::from("hello"));

        assert_eq!(size, buf.len());
        assert_eq!(&[0x0a, 0x05, b'h', b'e', b'l', b'l', b'o'], &buf[..]);
    }

    #[test]
    fn empty_string_value_is_an_empty_message() {
        let (size, buf) = encode(&AnyValue::from(""));

        assert_eq!(0, size);
        assert!(buf.is_empty());
    }

    #[test]
    fn nested_values_agree_on_size() {
        let v = AnyValue::Map(vec![
            KeyValue::new("outer", AnyValue::Array(vec![
                AnyValue::Int(-42),
                AnyValue::Map(vec![KeyValue::new("inner", 1.5)]),
            ])),
            KeyValue::new("b", AnyValue::Bytes(vec![0, 1, 2])),
        ]);

        let (size, buf) = encode(&v);
        assert_eq!(size, buf.len());
    }

    #[test]
    fn doubles_group_by_bit_pattern() {
        assert_eq!(AnyValue::Double(f64::NAN), AnyValue::Double(f64::NAN));
        assert_ne!(AnyValue::Double(0.0), AnyValue::Double(-0.0));
    }
}
