/*!
The OTLP data model and its marshalers.

Each message gets a pair of stateless functions, one that measures its body
and one that writes it. The functions are pure; anything they derive during
the size pass lands in the [`MarshalerContext`](crate::MarshalerContext) for
the write pass to replay. Field numbers and wire types follow the published
OTLP protobuf schema; getting them (or the default-omission rules) wrong
breaks interoperability with standard receivers.
*/

pub mod logs;
pub mod metrics;
pub mod traces;

mod any_value;
mod instrumentation_scope;
mod resource;

pub use self::{any_value::*, instrumentation_scope::*, resource::*};
