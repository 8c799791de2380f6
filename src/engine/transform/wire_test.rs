use crate::engine::transform::error::WireError;
use crate::engine::transform::spec::{
    AggregateFn, AggregateSpec, ColumnFilter, FilterOp, FilterValue, GroupBySpec, GroupKey,
    SortConstraint, TransformSpec,
};
use crate::engine::transform::wire::{
    SPEC_MAGIC, TransformReply, WIRE_VERSION, decode_reply, decode_spec, encode_reply, encode_spec,
};

fn sample_spec() -> TransformSpec {
    TransformSpec {
        filters: vec![ColumnFilter {
            field: "value".to_string(),
            op: FilterOp::Between,
            value: FilterValue::Range {
                low: 10.1,
                high: 10.2,
            },
        }],
        order_by: vec![SortConstraint {
            field: "value".to_string(),
            ascending: true,
            nulls_first: false,
        }],
        group_by: Some(GroupBySpec {
            keys: vec![GroupKey {
                field: "value".to_string(),
                binning: None,
            }],
            aggregates: vec![AggregateSpec {
                field: None,
                alias: "count".to_string(),
                func: AggregateFn::CountStar,
            }],
        }),
        row_number: Some("row".to_string()),
        projection: Some(vec!["row".to_string()]),
    }
}

#[test]
fn spec_round_trips_through_the_frame() {
    let spec = sample_spec();
    let bytes = encode_spec(&spec).unwrap();
    assert_eq!(&bytes[..4], &SPEC_MAGIC);
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), WIRE_VERSION);

    let decoded = decode_spec(&bytes).unwrap();
    assert_eq!(decoded.filters.len(), 1);
    assert_eq!(decoded.order_by[0].field, "value");
    assert_eq!(decoded.row_number.as_deref(), Some("row"));
    assert_eq!(decoded.projection, Some(vec!["row".to_string()]));
}

#[test]
fn reply_round_trips_through_the_frame() {
    let reply = TransformReply {
        handle: 42,
        row_count: 16,
    };
    let bytes = encode_reply(&reply).unwrap();
    assert_eq!(decode_reply(&bytes).unwrap(), reply);
}

#[test]
fn rejects_foreign_magic() {
    let mut bytes = encode_spec(&TransformSpec::default()).unwrap();
    bytes[0] = b'X';
    assert!(matches!(decode_spec(&bytes), Err(WireError::BadMagic)));
}

#[test]
fn rejects_unknown_version() {
    let mut bytes = encode_spec(&TransformSpec::default()).unwrap();
    bytes[4] = 9;
    bytes[5] = 0;
    assert!(matches!(
        decode_spec(&bytes),
        Err(WireError::UnsupportedVersion(9))
    ));
}

#[test]
fn rejects_truncated_frames() {
    assert!(matches!(decode_spec(&[]), Err(WireError::Truncated(0))));
    assert!(matches!(
        decode_spec(&SPEC_MAGIC[..3]),
        Err(WireError::Truncated(3))
    ));
    // A header with no payload is structurally sound but fails the codec.
    let bytes = encode_spec(&TransformSpec::default()).unwrap();
    assert!(matches!(
        decode_spec(&bytes[..6]),
        Err(WireError::Codec(_))
    ));
}
