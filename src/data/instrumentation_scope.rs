use bytes::BytesMut;

use crate::{context::MarshalerContext, proto::*};

use super::{size_attributes, write_attributes, KeyValue};

const SCOPE_NAME: Field = Field::len(1);
const SCOPE_VERSION: Field = Field::len(2);
const SCOPE_ATTRIBUTES: Field = Field::len(3);
const SCOPE_DROPPED_ATTRIBUTES_COUNT: Field = Field::varint(4);

/// The library or component within a process that produced a record.
/// Like [`Resource`](super::Resource), scopes bucket by value equality and
/// the schema URL is encoded on the enclosing scope-items message.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
    pub schema_url: String,
}

impl InstrumentationScope {
    pub fn new(name: impl Into<String>) -> Self {
        InstrumentationScope {
            name: name.into(),
            ..Default::default()
        }
    }
}

pub(crate) fn size_scope(scope: &InstrumentationScope, ctx: &mut MarshalerContext) -> usize {
    size_string(SCOPE_NAME, &scope.name)
        + size_string(SCOPE_VERSION, &scope.version)
        + size_attributes(SCOPE_ATTRIBUTES, &scope.attributes, ctx)
        + size_varint32(
            SCOPE_DROPPED_ATTRIBUTES_COUNT,
            scope.dropped_attributes_count,
        )
}

pub(crate) fn write_scope(
    buf: &mut BytesMut,
    scope: &InstrumentationScope,
    ctx: &mut MarshalerContext,
) {
    put_string(buf, SCOPE_NAME, &scope.name);
    put_string(buf, SCOPE_VERSION, &scope.version);
    write_attributes(buf, SCOPE_ATTRIBUTES, &scope.attributes, ctx);
    put_varint32(
        buf,
        SCOPE_DROPPED_ATTRIBUTES_COUNT,
        scope.dropped_attributes_count,
    );
}
