use bytes::BytesMut;

use crate::{context::MarshalerContext, proto::*};

use super::{size_attributes, write_attributes, KeyValue};

const RESOURCE_ATTRIBUTES: Field = Field::len(1);
const RESOURCE_DROPPED_ATTRIBUTES_COUNT: Field = Field::varint(2);

/**
The entity that produced a batch of telemetry.

Records share a resource by value equality: two records whose resources
compare equal land in the same bucket when a batch is grouped, regardless of
which allocation they point at.

The schema URL is carried here but encoded on the enclosing
`Resource{Logs,Spans,Metrics}` message, where the OTLP schema puts it.
*/
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
    pub schema_url: String,
}

pub(crate) fn size_resource(resource: &Resource, ctx: &mut MarshalerContext) -> usize {
    size_attributes(RESOURCE_ATTRIBUTES, &resource.attributes, ctx)
        + size_varint32(
            RESOURCE_DROPPED_ATTRIBUTES_COUNT,
            resource.dropped_attributes_count,
        )
}

pub(crate) fn write_resource(buf: &mut BytesMut, resource: &Resource, ctx: &mut MarshalerContext) {
    write_attributes(buf, RESOURCE_ATTRIBUTES, &resource.attributes, ctx);
    put_varint32(
        buf,
        RESOURCE_DROPPED_ATTRIBUTES_COUNT,
        resource.dropped_attributes_count,
    );
}
