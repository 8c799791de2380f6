use std::sync::Arc;

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::engine::transform::engine::{TableHandle, TransformEngine};
use crate::engine::transform::error::TransformError;
use crate::engine::transform::local::LocalEngine;
use crate::engine::transform::spec::{
    AggregateFn, AggregateSpec, BinningSpec, ColumnFilter, FilterOp, FilterValue, GroupBySpec,
    GroupKey, SortConstraint, TransformSpec,
};
use crate::engine::transform::wire::{decode_reply, encode_spec};

fn values_batch() -> RecordBatch {
    RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("value", DataType::Float64, true),
        ])),
        vec![
            Arc::new(Int64Array::from(vec![1i64, 2, 3, 4])),
            Arc::new(Float64Array::from(vec![42.0, 10.2, 10.1, 30.005])),
        ],
    )
    .expect("batch")
}

async fn run(
    engine: &LocalEngine,
    source: TableHandle,
    spec: &TransformSpec,
    stats: Option<TableHandle>,
) -> Result<RecordBatch, TransformError> {
    let bytes = encode_spec(spec)?;
    let reply = decode_reply(&engine.submit(source, &bytes, stats).await?)?;
    engine.read_table(TableHandle(reply.handle)).await
}

fn int_column(batch: &RecordBatch, name: &str) -> Vec<i64> {
    let col = batch
        .column_by_name(name)
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    (0..col.len()).map(|i| col.value(i)).collect()
}

#[tokio::test]
async fn orders_ascending_with_nulls_last() {
    let engine = LocalEngine::new();
    let source = engine.register_batch(values_batch());

    let spec = TransformSpec {
        order_by: vec![SortConstraint {
            field: "value".to_string(),
            ascending: true,
            nulls_first: false,
        }],
        ..Default::default()
    };
    let result = run(&engine, source, &spec, None).await.unwrap();
    assert_eq!(int_column(&result, "id"), vec![3, 2, 4, 1]);
}

#[tokio::test]
async fn nulls_first_puts_null_rows_ahead() {
    let engine = LocalEngine::new();
    let source = engine.register_batch(
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("id", DataType::Int64, true),
                Field::new("value", DataType::Float64, true),
            ])),
            vec![
                Arc::new(Int64Array::from(vec![1i64, 2, 3])),
                Arc::new(Float64Array::from(vec![Some(5.0), None, Some(1.0)])),
            ],
        )
        .unwrap(),
    );

    let spec = TransformSpec {
        order_by: vec![SortConstraint {
            field: "value".to_string(),
            ascending: true,
            nulls_first: true,
        }],
        ..Default::default()
    };
    let result = run(&engine, source, &spec, None).await.unwrap();
    assert_eq!(int_column(&result, "id"), vec![2, 3, 1]);
}

#[tokio::test]
async fn row_numbers_are_assigned_before_filtering() {
    let engine = LocalEngine::new();
    let source = engine.register_batch(values_batch());

    let spec = TransformSpec {
        row_number: Some("row".to_string()),
        filters: vec![ColumnFilter {
            field: "value".to_string(),
            op: FilterOp::Between,
            value: FilterValue::Range {
                low: 10.1,
                high: 10.2,
            },
        }],
        projection: Some(vec!["row".to_string()]),
        ..Default::default()
    };
    let result = run(&engine, source, &spec, None).await.unwrap();

    // Survivors keep their pre-filter positions.
    assert_eq!(result.num_columns(), 1);
    assert_eq!(int_column(&result, "row"), vec![2, 3]);
}

#[tokio::test]
async fn filter_operators_cover_text_and_nullity() {
    let engine = LocalEngine::new();
    let source = engine.register_batch(
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("id", DataType::Int64, true),
                Field::new("label", DataType::Utf8, true),
                Field::new("value", DataType::Float64, true),
            ])),
            vec![
                Arc::new(Int64Array::from(vec![1i64, 2, 3, 4])),
                Arc::new(StringArray::from(vec![
                    Some("a"),
                    Some("b"),
                    None,
                    Some("a"),
                ])),
                Arc::new(Float64Array::from(vec![
                    Some(1.0),
                    Some(2.0),
                    Some(3.0),
                    None,
                ])),
            ],
        )
        .unwrap(),
    );

    let eq_text = TransformSpec {
        filters: vec![ColumnFilter {
            field: "label".to_string(),
            op: FilterOp::Eq,
            value: FilterValue::Text("a".to_string()),
        }],
        ..Default::default()
    };
    let result = run(&engine, source, &eq_text, None).await.unwrap();
    assert_eq!(int_column(&result, "id"), vec![1, 4]);

    let gt = TransformSpec {
        filters: vec![ColumnFilter {
            field: "value".to_string(),
            op: FilterOp::Gt,
            value: FilterValue::Float(1.5),
        }],
        ..Default::default()
    };
    let result = run(&engine, source, &gt, None).await.unwrap();
    // Null rows never satisfy a value predicate.
    assert_eq!(int_column(&result, "id"), vec![2, 3]);

    let is_null = TransformSpec {
        filters: vec![ColumnFilter {
            field: "label".to_string(),
            op: FilterOp::IsNull,
            value: FilterValue::Null,
        }],
        ..Default::default()
    };
    let result = run(&engine, source, &is_null, None).await.unwrap();
    assert_eq!(int_column(&result, "id"), vec![3]);
}

#[tokio::test]
async fn binned_aggregation_uses_the_stats_table() {
    let engine = LocalEngine::new();

    let mut values = vec![10.0];
    values.extend((1..=13).map(|i| (i * 100) as f64));
    values.push(3516.0);
    values.push(28054.0);
    let source = engine.register_batch(
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new(
                "value",
                DataType::Float64,
                true,
            )])),
            vec![Arc::new(Float64Array::from(values))],
        )
        .unwrap(),
    );
    let stats = engine.register_batch(
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("__stat_min", DataType::Float64, true),
                Field::new("__stat_max", DataType::Float64, true),
            ])),
            vec![
                Arc::new(Float64Array::from(vec![10.0])),
                Arc::new(Float64Array::from(vec![28054.0])),
            ],
        )
        .unwrap(),
    );

    let spec = TransformSpec {
        group_by: Some(GroupBySpec {
            keys: vec![GroupKey {
                field: "value".to_string(),
                binning: Some(BinningSpec {
                    stats_min_field: "__stat_min".to_string(),
                    stats_max_field: "__stat_max".to_string(),
                    bin_count: 8,
                    index_alias: "bin".to_string(),
                    width_alias: "bin_width".to_string(),
                    lower_alias: "bin_lower".to_string(),
                    upper_alias: "bin_upper".to_string(),
                }),
            }],
            aggregates: vec![AggregateSpec {
                field: None,
                alias: "count".to_string(),
                func: AggregateFn::CountStar,
            }],
        }),
        ..Default::default()
    };
    let result = run(&engine, source, &spec, Some(stats)).await.unwrap();

    assert_eq!(result.num_rows(), 8);
    assert_eq!(int_column(&result, "bin"), (0..8).collect::<Vec<i64>>());

    let width = result
        .column_by_name("bin_width")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(width.value(0), 3505.5);

    let lower = result
        .column_by_name("bin_lower")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    let upper = result
        .column_by_name("bin_upper")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(lower.value(0), 10.0);
    assert_eq!(upper.value(0), 3515.5);
    assert_eq!(upper.value(7), 28054.0);

    let counts = result
        .column_by_name("count")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(counts.value(0), 14);
    assert_eq!(counts.value(1), 1);
    assert_eq!(counts.value(7), 1);
    for bin in 2..7 {
        assert!(counts.is_null(bin), "empty bin {bin} must be null");
    }
    // The maximum lands in the last bin, never out of range.
    let total: i64 = (0..8).filter(|&i| !counts.is_null(i)).map(|i| counts.value(i)).sum();
    assert_eq!(total, 16);
}

#[tokio::test]
async fn grouped_aggregation_emits_groups_in_first_seen_order() {
    let engine = LocalEngine::new();
    let source = engine.register_batch(
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("label", DataType::Utf8, true),
                Field::new("value", DataType::Float64, true),
            ])),
            vec![
                Arc::new(StringArray::from(vec!["b", "a", "b", "a", "b"])),
                Arc::new(Float64Array::from(vec![1.0, 10.0, 2.0, 20.0, 3.0])),
            ],
        )
        .unwrap(),
    );

    let spec = TransformSpec {
        group_by: Some(GroupBySpec {
            keys: vec![GroupKey {
                field: "label".to_string(),
                binning: None,
            }],
            aggregates: vec![
                AggregateSpec {
                    field: Some("value".to_string()),
                    alias: "total".to_string(),
                    func: AggregateFn::Sum,
                },
                AggregateSpec {
                    field: Some("value".to_string()),
                    alias: "mean".to_string(),
                    func: AggregateFn::Mean,
                },
            ],
        }),
        ..Default::default()
    };
    let result = run(&engine, source, &spec, None).await.unwrap();

    let labels = result
        .column_by_name("label")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(labels.value(0), "b");
    assert_eq!(labels.value(1), "a");

    let totals = result
        .column_by_name("total")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(totals.value(0), 6.0);
    assert_eq!(totals.value(1), 30.0);

    let means = result
        .column_by_name("mean")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(means.value(0), 2.0);
    assert_eq!(means.value(1), 15.0);
}

#[tokio::test]
async fn global_aggregate_without_keys_yields_one_row() {
    let engine = LocalEngine::new();
    let source = engine.register_batch(values_batch());

    let spec = TransformSpec {
        group_by: Some(GroupBySpec {
            keys: Vec::new(),
            aggregates: vec![
                AggregateSpec {
                    field: Some("value".to_string()),
                    alias: "min".to_string(),
                    func: AggregateFn::Min,
                },
                AggregateSpec {
                    field: Some("value".to_string()),
                    alias: "max".to_string(),
                    func: AggregateFn::Max,
                },
            ],
        }),
        ..Default::default()
    };
    let result = run(&engine, source, &spec, None).await.unwrap();
    assert_eq!(result.num_rows(), 1);

    let min = result
        .column_by_name("min")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    let max = result
        .column_by_name("max")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(min.value(0), 10.1);
    assert_eq!(max.value(0), 42.0);
}

#[tokio::test]
async fn unknown_projection_field_is_a_kernel_error() {
    let engine = LocalEngine::new();
    let source = engine.register_batch(values_batch());

    let spec = TransformSpec {
        projection: Some(vec!["ghost".to_string()]),
        ..Default::default()
    };
    match run(&engine, source, &spec, None).await {
        Err(TransformError::Kernel(detail)) => assert!(detail.contains("ghost")),
        other => panic!("expected kernel error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_handle_is_reported_as_such() {
    let engine = LocalEngine::new();
    match engine.read_table(TableHandle(404)).await {
        Err(TransformError::UnknownHandle(404)) => {}
        other => panic!("expected unknown handle, got {other:?}"),
    }
}
