/*!
Batch grouping.

OTLP nests records under their resource and, within it, their
instrumentation scope. A flat batch is grouped in a single pass: buckets are
created at the end of iteration order the first time a resource or scope is
seen, so the nesting on the wire reproduces the first-seen order of the
input. Re-running the grouping over the same input yields the same
structure, which keeps retried exports byte-identical.
*/

use indexmap::IndexMap;

use crate::data::{InstrumentationScope, Resource};

/// One record of a batch, paired with the resource and scope that
/// produced it. The only coupling to the upstream telemetry store is that
/// it can hand out these three borrows per record.
#[derive(Clone, Copy, Debug)]
pub struct ExportItem<'a, R> {
    pub resource: &'a Resource,
    pub scope: &'a InstrumentationScope,
    pub record: &'a R,
}

impl<'a, R> ExportItem<'a, R> {
    pub fn new(
        resource: &'a Resource,
        scope: &'a InstrumentationScope,
        record: &'a R,
    ) -> Self {
        ExportItem {
            resource,
            scope,
            record,
        }
    }
}

pub(crate) type ScopeBuckets<'a, R> = IndexMap<&'a InstrumentationScope, Vec<&'a R>>;

pub(crate) struct Grouped<'a, R> {
    pub(crate) resources: IndexMap<&'a Resource, ScopeBuckets<'a, R>>,
}

pub(crate) fn group_by_resource_and_scope<'a, I, R>(
    items: &'a [I],
    resource_of: impl Fn(&'a I) -> &'a Resource,
    scope_of: impl Fn(&'a I) -> &'a InstrumentationScope,
    record_of: impl Fn(&'a I) -> &'a R,
) -> Grouped<'a, R> {
    let mut resources: IndexMap<&Resource, ScopeBuckets<R>> = IndexMap::new();

    for item in items {
        resources
            .entry(resource_of(item))
            .or_default()
            .entry(scope_of(item))
            .or_default()
            .push(record_of(item));
    }

    Grouped { resources }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::KeyValue;

    fn resource(name: &str) -> Resource {
        Resource {
            attributes: vec![KeyValue::new("service.name", name)],
            ..Default::default()
        }
    }

    fn items<'a>(
        batch: &'a [(Resource, InstrumentationScope, u32)],
    ) -> Vec<ExportItem<'a, u32>> {
        batch
            .iter()
            .map(|(r, s, v)| ExportItem::new(r, s, v))
            .collect()
    }

    fn group<'a>(items: &'a [ExportItem<'a, u32>]) -> Grouped<'a, u32> {
        group_by_resource_and_scope(items, |i| i.resource, |i| i.scope, |i| i.record)
    }

    #[test]
    fn scopes_nest_under_their_resource_in_first_seen_order() {
        let batch = vec![
            (resource("a"), InstrumentationScope::new("x"), 1),
            (resource("a"), InstrumentationScope::new("x"), 2),
            (resource("a"), InstrumentationScope::new("y"), 3),
        ];
        let items = items(&batch);
        let grouped = group(&items);

        assert_eq!(1, grouped.resources.len());

        let scopes = &grouped.resources[0];
        assert_eq!(2, scopes.len());

        let (scope_x, records_x) = scopes.get_index(0).unwrap();
        assert_eq!("x", scope_x.name);
        assert_eq!(vec![&1, &2], *records_x);

        let (scope_y, records_y) = scopes.get_index(1).unwrap();
        assert_eq!("y", scope_y.name);
        assert_eq!(vec![&3], *records_y);
    }

    #[test]
    fn equal_resources_bucket_together_across_allocations() {
        // Two distinct allocations with equal values share a bucket.
        let batch = vec![
            (resource("a"), InstrumentationScope::new("x"), 1),
            (resource("a"), InstrumentationScope::new("x"), 2),
        ];
        let items = items(&batch);

        assert!(!std::ptr::eq(items[0].resource, items[1].resource));

        let grouped = group(&items);
        assert_eq!(1, grouped.resources.len());
    }

    #[test]
    fn grouping_partitions_the_batch() {
        let batch = vec![
            (resource("a"), InstrumentationScope::new("x"), 1),
            (resource("b"), InstrumentationScope::new("x"), 2),
            (resource("a"), InstrumentationScope::new("y"), 3),
            (resource("b"), InstrumentationScope::new("x"), 4),
        ];
        let items = items(&batch);
        let grouped = group(&items);

        let mut flattened: Vec<u32> = Vec::new();
        for (_, scopes) in &grouped.resources {
            for (_, records) in scopes {
                flattened.extend(records.iter().map(|r| **r));
            }
        }

        flattened.sort_unstable();
        assert_eq!(vec![1, 2, 3, 4], flattened);
    }

    #[test]
    fn regrouping_is_deterministic() {
        let batch = vec![
            (resource("b"), InstrumentationScope::new("y"), 1),
            (resource("a"), InstrumentationScope::new("x"), 2),
            (resource("b"), InstrumentationScope::new("z"), 3),
        ];
        let items = items(&batch);

        let first = group(&items);
        let second = group(&items);

        let order = |grouped: &Grouped<u32>| {
            grouped
                .resources
                .iter()
                .map(|(r, scopes)| {
                    (
                        r.attributes[0].value.clone(),
                        scopes.keys().map(|s| s.name.clone()).collect::<Vec<_>>(),
                    )
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(order(&first), order(&second));
    }
}
