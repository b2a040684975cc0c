use bytes::{BufMut, BytesMut};

use crate::{context::MarshalerContext, marshal::Encodable, proto::*};

use super::{size_attributes, write_attributes, KeyValue};

const METRIC_NAME: Field = Field::len(1);
const METRIC_DESCRIPTION: Field = Field::len(2);
const METRIC_UNIT: Field = Field::len(3);
const METRIC_GAUGE: Field = Field::len(5);
const METRIC_SUM: Field = Field::len(7);
const METRIC_HISTOGRAM: Field = Field::len(9);

const GAUGE_DATA_POINTS: Field = Field::len(1);

const SUM_DATA_POINTS: Field = Field::len(1);
const SUM_AGGREGATION_TEMPORALITY: Field = Field::varint(2);
const SUM_IS_MONOTONIC: Field = Field::varint(3);

const HISTOGRAM_DATA_POINTS: Field = Field::len(1);
const HISTOGRAM_AGGREGATION_TEMPORALITY: Field = Field::varint(2);

const NUMBER_START_TIME_UNIX_NANO: Field = Field::fixed64(2);
const NUMBER_TIME_UNIX_NANO: Field = Field::fixed64(3);
const NUMBER_AS_DOUBLE: Field = Field::fixed64(4);
const NUMBER_AS_INT: Field = Field::fixed64(6);
const NUMBER_ATTRIBUTES: Field = Field::len(7);

const HISTOGRAM_POINT_START_TIME_UNIX_NANO: Field = Field::fixed64(2);
const HISTOGRAM_POINT_TIME_UNIX_NANO: Field = Field::fixed64(3);
const HISTOGRAM_POINT_COUNT: Field = Field::fixed64(4);
const HISTOGRAM_POINT_SUM: Field = Field::fixed64(5);
const HISTOGRAM_POINT_BUCKET_COUNTS: Field = Field::len(6);
const HISTOGRAM_POINT_EXPLICIT_BOUNDS: Field = Field::len(7);
const HISTOGRAM_POINT_ATTRIBUTES: Field = Field::len(9);
const HISTOGRAM_POINT_MIN: Field = Field::fixed64(11);
const HISTOGRAM_POINT_MAX: Field = Field::fixed64(12);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u32)]
pub enum AggregationTemporality {
    #[default]
    Unspecified = 0,
    Delta = 1,
    Cumulative = 2,
}

/// A gauge, sum, or histogram point value. Integer points encode as
/// sfixed64, doubles as fixed64; presence is what distinguishes the two on
/// the wire, so both are written even at zero.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum NumberValue {
    Int(i64),
    Double(f64),
}

#[derive(Clone, PartialEq, Debug)]
pub struct NumberDataPoint {
    pub attributes: Vec<KeyValue>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub value: NumberValue,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct HistogramDataPoint {
    pub attributes: Vec<KeyValue>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub count: u64,
    pub sum: Option<f64>,
    /// One count per bucket; encoded packed, `explicit_bounds.len() + 1`
    /// entries when bounds are present.
    pub bucket_counts: Vec<u64>,
    pub explicit_bounds: Vec<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Gauge {
    pub data_points: Vec<NumberDataPoint>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Sum {
    pub data_points: Vec<NumberDataPoint>,
    pub aggregation_temporality: AggregationTemporality,
    pub is_monotonic: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Histogram {
    pub data_points: Vec<HistogramDataPoint>,
    pub aggregation_temporality: AggregationTemporality,
}

#[derive(Clone, PartialEq, Debug)]
pub enum MetricData {
    Gauge(Gauge),
    Sum(Sum),
    Histogram(Histogram),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Metric {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub data: MetricData,
}

fn size_number_point(point: &NumberDataPoint, ctx: &mut MarshalerContext) -> usize {
    let mut n = 0;

    n += size_fixed64(NUMBER_START_TIME_UNIX_NANO, point.start_time_unix_nano);
    n += size_fixed64(NUMBER_TIME_UNIX_NANO, point.time_unix_nano);

    n += match point.value {
        NumberValue::Int(_) => NUMBER_AS_INT.key_len() + 8,
        NumberValue::Double(_) => NUMBER_AS_DOUBLE.key_len() + 8,
    };

    n += size_attributes(NUMBER_ATTRIBUTES, &point.attributes, ctx);

    n
}

fn write_number_point(buf: &mut BytesMut, point: &NumberDataPoint, ctx: &mut MarshalerContext) {
    put_fixed64(buf, NUMBER_START_TIME_UNIX_NANO, point.start_time_unix_nano);
    put_fixed64(buf, NUMBER_TIME_UNIX_NANO, point.time_unix_nano);

    match point.value {
        NumberValue::Int(v) => {
            NUMBER_AS_INT.put_key(buf);
            buf.put_i64_le(v);
        }
        NumberValue::Double(v) => {
            NUMBER_AS_DOUBLE.put_key(buf);
            buf.put_f64_le(v);
        }
    }

    write_attributes(buf, NUMBER_ATTRIBUTES, &point.attributes, ctx);
}

fn size_histogram_point(point: &HistogramDataPoint, ctx: &mut MarshalerContext) -> usize {
    let mut n = 0;

    n += size_fixed64(
        HISTOGRAM_POINT_START_TIME_UNIX_NANO,
        point.start_time_unix_nano,
    );
    n += size_fixed64(HISTOGRAM_POINT_TIME_UNIX_NANO, point.time_unix_nano);
    n += size_fixed64(HISTOGRAM_POINT_COUNT, point.count);

    if point.sum.is_some() {
        n += HISTOGRAM_POINT_SUM.key_len() + 8;
    }

    n += size_packed_fixed64(HISTOGRAM_POINT_BUCKET_COUNTS, &point.bucket_counts);
    n += size_packed_double(HISTOGRAM_POINT_EXPLICIT_BOUNDS, &point.explicit_bounds);
    n += size_attributes(HISTOGRAM_POINT_ATTRIBUTES, &point.attributes, ctx);

    if point.min.is_some() {
        n += HISTOGRAM_POINT_MIN.key_len() + 8;
    }

    if point.max.is_some() {
        n += HISTOGRAM_POINT_MAX.key_len() + 8;
    }

    n
}

fn write_histogram_point(
    buf: &mut BytesMut,
    point: &HistogramDataPoint,
    ctx: &mut MarshalerContext,
) {
    put_fixed64(
        buf,
        HISTOGRAM_POINT_START_TIME_UNIX_NANO,
        point.start_time_unix_nano,
    );
    put_fixed64(buf, HISTOGRAM_POINT_TIME_UNIX_NANO, point.time_unix_nano);
    put_fixed64(buf, HISTOGRAM_POINT_COUNT, point.count);

    if let Some(sum) = point.sum {
        HISTOGRAM_POINT_SUM.put_key(buf);
        buf.put_f64_le(sum);
    }

    put_packed_fixed64(buf, HISTOGRAM_POINT_BUCKET_COUNTS, &point.bucket_counts);
    put_packed_double(buf, HISTOGRAM_POINT_EXPLICIT_BOUNDS, &point.explicit_bounds);
    write_attributes(buf, HISTOGRAM_POINT_ATTRIBUTES, &point.attributes, ctx);

    if let Some(min) = point.min {
        HISTOGRAM_POINT_MIN.put_key(buf);
        buf.put_f64_le(min);
    }

    if let Some(max) = point.max {
        HISTOGRAM_POINT_MAX.put_key(buf);
        buf.put_f64_le(max);
    }
}

fn size_data(data: &MetricData, ctx: &mut MarshalerContext) -> usize {
    match data {
        MetricData::Gauge(gauge) => size_message(METRIC_GAUGE, ctx, |ctx| {
            let mut n = 0;
            for point in &gauge.data_points {
                n += size_message(GAUGE_DATA_POINTS, ctx, |ctx| size_number_point(point, ctx));
            }
            n
        }),
        MetricData::Sum(sum) => size_message(METRIC_SUM, ctx, |ctx| {
            let mut n = 0;
            for point in &sum.data_points {
                n += size_message(SUM_DATA_POINTS, ctx, |ctx| size_number_point(point, ctx));
            }
            n += size_varint32(
                SUM_AGGREGATION_TEMPORALITY,
                sum.aggregation_temporality as u32,
            );
            n += size_bool(SUM_IS_MONOTONIC, sum.is_monotonic);
            n
        }),
        MetricData::Histogram(histogram) => size_message(METRIC_HISTOGRAM, ctx, |ctx| {
            let mut n = 0;
            for point in &histogram.data_points {
                n += size_message(HISTOGRAM_DATA_POINTS, ctx, |ctx| {
                    size_histogram_point(point, ctx)
                });
            }
            n += size_varint32(
                HISTOGRAM_AGGREGATION_TEMPORALITY,
                histogram.aggregation_temporality as u32,
            );
            n
        }),
    }
}

fn write_data(buf: &mut BytesMut, data: &MetricData, ctx: &mut MarshalerContext) {
    match data {
        MetricData::Gauge(gauge) => put_message(buf, METRIC_GAUGE, ctx, |buf, ctx| {
            for point in &gauge.data_points {
                put_message(buf, GAUGE_DATA_POINTS, ctx, |buf, ctx| {
                    write_number_point(buf, point, ctx)
                });
            }
        }),
        MetricData::Sum(sum) => put_message(buf, METRIC_SUM, ctx, |buf, ctx| {
            for point in &sum.data_points {
                put_message(buf, SUM_DATA_POINTS, ctx, |buf, ctx| {
                    write_number_point(buf, point, ctx)
                });
            }
            put_varint32(
                buf,
                SUM_AGGREGATION_TEMPORALITY,
                sum.aggregation_temporality as u32,
            );
            put_bool(buf, SUM_IS_MONOTONIC, sum.is_monotonic);
        }),
        MetricData::Histogram(histogram) => put_message(buf, METRIC_HISTOGRAM, ctx, |buf, ctx| {
            for point in &histogram.data_points {
                put_message(buf, HISTOGRAM_DATA_POINTS, ctx, |buf, ctx| {
                    write_histogram_point(buf, point, ctx)
                });
            }
            put_varint32(
                buf,
                HISTOGRAM_AGGREGATION_TEMPORALITY,
                histogram.aggregation_temporality as u32,
            );
        }),
    }
}

impl Encodable for Metric {
    fn size(&self, ctx: &mut MarshalerContext) -> usize {
        size_string(METRIC_NAME, &self.name)
            + size_string(METRIC_DESCRIPTION, &self.description)
            + size_string(METRIC_UNIT, &self.unit)
            + size_data(&self.data, ctx)
    }

    fn write(&self, buf: &mut BytesMut, ctx: &mut MarshalerContext) {
        put_string(buf, METRIC_NAME, &self.name);
        put_string(buf, METRIC_DESCRIPTION, &self.description);
        put_string(buf, METRIC_UNIT, &self.unit);
        write_data(buf, &self.data, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(metric: &Metric) -> (usize, BytesMut) {
        let mut ctx = MarshalerContext::new();
        let size = metric.size(&mut ctx);

        ctx.reset_read_index();

        let mut buf = BytesMut::new();
        metric.write(&mut buf, &mut ctx);

        (size, buf)
    }

    #[test]
    fn gauge_sizes_consistently() {
        let metric = Metric {
            name: "queue_length".to_owned(),
            description: String::new(),
            unit: "1".to_owned(),
            data: MetricData::Gauge(Gauge {
                data_points: vec![NumberDataPoint {
                    attributes: vec![KeyValue::new("queue", "ingest")],
                    start_time_unix_nano: 10,
                    time_unix_nano: 20,
                    value: NumberValue::Int(0),
                }],
            }),
        };

        let (size, buf) = encode(&metric);
        assert_eq!(size, buf.len());
    }

    #[test]
    fn zero_point_values_are_still_present() {
        let int_point = NumberDataPoint {
            attributes: Vec::new(),
            start_time_unix_nano: 0,
            time_unix_nano: 0,
            value: NumberValue::Int(0),
        };
        let mut ctx = MarshalerContext::new();

        // A zero oneof value still takes key + 8 bytes.
        assert_eq!(9, size_number_point(&int_point, &mut ctx));
    }

    #[test]
    fn histogram_packed_fields() {
        let metric = Metric {
            name: "latency".to_owned(),
            description: "request latency".to_owned(),
            unit: "ms".to_owned(),
            data: MetricData::Histogram(Histogram {
                data_points: vec![HistogramDataPoint {
                    start_time_unix_nano: 1,
                    time_unix_nano: 2,
                    count: 6,
                    sum: Some(21.0),
                    bucket_counts: vec![1, 2, 3],
                    explicit_bounds: vec![5.0, 10.0],
                    min: Some(1.0),
                    max: Some(10.0),
                    ..Default::default()
                }],
                aggregation_temporality: AggregationTemporality::Cumulative,
            }),
        };

        let (size, buf) = encode(&metric);
        assert_eq!(size, buf.len());
    }
}
