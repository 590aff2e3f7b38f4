//! Plan tree conversion: relation dispatch, join keys, virtual tables,
//! stream inputs, and the structural error cases.

mod common;

use common::*;
use std::sync::Arc;
use substrait::proto;
use substrait::proto::expression::literal::LiteralType;
use substrait::proto::read_rel::local_files::FileOrFiles;
use substrait::proto::read_rel::{LocalFiles, ReadType};
use substrait::proto::rel::RelType;
use substrait::proto::{
    AggregateRel, Expression, FilterRel, JoinRel, Plan, ProjectRel, ReadRel, Rel,
};
use vexec_core::connector::FileFormat;
use vexec_core::expr::TypedExpr;
use vexec_core::plan::{AggregationStep, JoinType, PlanNode, ValuesNode};
use vexec_core::types::{RowType, TypeKind};
use vexec_core::vector::ColumnVector;
use vexec_substrait::consumer::PlanConverter;
use vexec_substrait::error::ConvertError;

fn three_column_scan(prefix: &str) -> Rel {
    let schema = named_struct(&[
        (format!("{}0", prefix).as_str(), i64_type()),
        (format!("{}1", prefix).as_str(), i64_type()),
        (format!("{}2", prefix).as_str(), i64_type()),
    ]);
    read_rel(schema, vec![dwrf_file("/data/part-0.dwrf")], None)
}

fn join_rel(left: Rel, right: Rel, condition: Expression, join_type: i32) -> Rel {
    Rel {
        rel_type: Some(RelType::Join(Box::new(JoinRel {
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            expression: Some(Box::new(condition)),
            r#type: join_type,
            ..Default::default()
        }))),
    }
}

#[test]
fn test_join_keys_from_nested_and_in_textual_order() {
    // and(eq(L.a, R.a), and(eq(L.b, R.b), eq(L.c, R.c)))
    let eq = |left: i32, right: i32| scalar(1, vec![field(left), field(right)], bool_type());
    let condition = scalar(
        0,
        vec![
            eq(0, 3),
            scalar(0, vec![eq(1, 4), eq(2, 5)], bool_type()),
        ],
        bool_type(),
    );
    let plan = plan(
        vec![(0, "and:bool_bool"), (1, "eq:i64_i64")],
        join_rel(
            three_column_scan("l"),
            three_column_scan("r"),
            condition,
            proto::join_rel::JoinType::Inner as i32,
        ),
    );

    let converted = convert(&plan);
    let PlanNode::HashJoin(join) = converted.root.as_ref() else {
        panic!("expected a hash join, got {:?}", converted.root);
    };

    assert_eq!(join.join_type, JoinType::Inner);
    assert!(join.filter.is_none());
    assert_eq!(join.left_keys.len(), 3);
    assert_eq!(join.right_keys.len(), 3);

    // Keys resolve against left ∥ right in the declared textual order, and
    // every pair is type-consistent under the concatenated schema.
    let left_indices: Vec<_> = join.left_keys.iter().map(|k| k.index).collect();
    let right_indices: Vec<_> = join.right_keys.iter().map(|k| k.index).collect();
    assert_eq!(left_indices, vec![0, 1, 2]);
    assert_eq!(right_indices, vec![3, 4, 5]);
    for (left, right) in join.left_keys.iter().zip(&join.right_keys) {
        assert_eq!(left.kind, right.kind);
    }

    // Output schema is the concatenation of both scan outputs.
    assert_eq!(join.output_type.size(), 6);
    assert_eq!(join.output_type.name_of(0), Some("n0_0"));
    assert_eq!(join.output_type.name_of(3), Some("n1_0"));
}

#[test]
fn test_join_type_mapping() {
    let cases = [
        (proto::join_rel::JoinType::Inner, JoinType::Inner),
        (proto::join_rel::JoinType::Outer, JoinType::Full),
        (proto::join_rel::JoinType::Left, JoinType::Left),
        (proto::join_rel::JoinType::Right, JoinType::Right),
        (proto::join_rel::JoinType::LeftSemi, JoinType::LeftSemi),
        (proto::join_rel::JoinType::LeftAnti, JoinType::Anti),
    ];
    for (substrait_type, expected) in cases {
        let condition = scalar(1, vec![field(0), field(3)], bool_type());
        let plan = plan(
            vec![(0, "and:bool_bool"), (1, "eq:i64_i64")],
            join_rel(
                three_column_scan("l"),
                three_column_scan("r"),
                condition,
                substrait_type as i32,
            ),
        );
        let converted = convert(&plan);
        let PlanNode::HashJoin(join) = converted.root.as_ref() else {
            panic!("expected a hash join");
        };
        assert_eq!(join.join_type, expected);
    }
}

#[test]
fn test_join_without_left_child_is_invalid() {
    let plan = plan(
        vec![(0, "eq:i64_i64")],
        Rel {
            rel_type: Some(RelType::Join(Box::new(JoinRel {
                left: None,
                right: Some(Box::new(three_column_scan("r"))),
                expression: Some(Box::new(scalar(
                    0,
                    vec![field(0), field(1)],
                    bool_type(),
                ))),
                r#type: proto::join_rel::JoinType::Inner as i32,
                ..Default::default()
            }))),
        },
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::InvalidPlan(message)
        if message.contains("left Rel is expected")));
}

#[test]
fn test_non_equality_join_condition_is_rejected() {
    let condition = scalar(1, vec![field(0), field(3)], bool_type());
    let plan = plan(
        vec![(1, "lt:i64_i64")],
        join_rel(
            three_column_scan("l"),
            three_column_scan("r"),
            condition,
            proto::join_rel::JoinType::Inner as i32,
        ),
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::NotImplemented(_)));
}

#[test]
fn test_join_equality_over_literal_is_rejected() {
    let condition = scalar(1, vec![field(0), lit_i64(1)], bool_type());
    let plan = plan(
        vec![(1, "eq:i64_i64")],
        join_rel(
            three_column_scan("l"),
            three_column_scan("r"),
            condition,
            proto::join_rel::JoinType::Inner as i32,
        ),
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::NotImplemented(message)
        if message.contains("field reference")));
}

#[test]
fn test_values_node_materializes_column_major_batches() {
    // One literal struct holding a batch of two rows over (c0: BIGINT,
    // c1: VARCHAR), laid out column-major.
    let row = proto::expression::literal::Struct {
        fields: vec![
            raw_lit(LiteralType::I64(1)),
            raw_lit(LiteralType::I64(2)),
            raw_lit(LiteralType::String("x".into())),
            raw_lit(LiteralType::String("y".into())),
        ],
    };
    let plan = plan(
        vec![],
        virtual_read_rel(
            named_struct(&[("c0", i64_type()), ("c1", string_type())]),
            vec![row],
        ),
    );

    let converted = convert(&plan);
    let PlanNode::Values(values) = converted.root.as_ref() else {
        panic!("expected a values node, got {:?}", converted.root);
    };

    assert_eq!(values.vectors.len(), 1);
    let vector = &values.vectors[0];
    assert_eq!(vector.columns.len(), vector.row_type.size());
    assert_eq!(vector.size, 2);
    assert_eq!(
        vector.columns[0],
        ColumnVector::Bigint(vec![Some(1), Some(2)])
    );
    assert_eq!(
        vector.columns[1],
        ColumnVector::Varchar(vec![Some("x".into()), Some("y".into())])
    );
}

#[test]
fn test_values_node_rejects_ragged_struct() {
    let rows = vec![
        proto::expression::literal::Struct {
            fields: vec![raw_lit(LiteralType::I64(1)), raw_lit(LiteralType::I64(2))],
        },
        proto::expression::literal::Struct {
            fields: vec![raw_lit(LiteralType::I64(3))],
        },
    ];
    let plan = plan(
        vec![],
        virtual_read_rel(named_struct(&[("c0", i64_type())]), rows),
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::InvalidPlan(_)));
}

#[test]
fn test_values_node_rejects_complex_literals() {
    let row = proto::expression::literal::Struct {
        fields: vec![raw_lit(LiteralType::List(
            proto::expression::literal::List {
                values: vec![raw_lit(LiteralType::I64(1))],
            },
        ))],
    };
    let plan = plan(
        vec![],
        virtual_read_rel(named_struct(&[("c0", i64_type())]), vec![row]),
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::NotImplemented(_)));
}

#[test]
fn test_aggregate_with_grouping_and_measure() {
    let measure = proto::aggregate_rel::Measure {
        measure: Some(proto::AggregateFunction {
            function_reference: 0,
            arguments: vec![proto::FunctionArgument {
                arg_type: Some(proto::function_argument::ArgType::Value(field(1))),
            }],
            output_type: Some(i64_type()),
            phase: proto::AggregationPhase::InitialToResult as i32,
            ..Default::default()
        }),
        filter: None,
    };
    let aggregate = Rel {
        rel_type: Some(RelType::Aggregate(Box::new(AggregateRel {
            input: Some(Box::new(read_rel(
                named_struct(&[("c0", i64_type()), ("c1", i64_type())]),
                vec![dwrf_file("/data/part-0.dwrf")],
                None,
            ))),
            groupings: vec![proto::aggregate_rel::Grouping {
                grouping_expressions: vec![field(0)],
                ..Default::default()
            }],
            measures: vec![measure],
            ..Default::default()
        }))),
    };
    let plan = plan(vec![(0, "sum:i64")], aggregate);

    let converted = convert(&plan);
    let PlanNode::Aggregation(aggregation) = converted.root.as_ref() else {
        panic!("expected an aggregation, got {:?}", converted.root);
    };

    assert_eq!(aggregation.step, AggregationStep::Single);
    assert_eq!(aggregation.grouping_keys.len(), 1);
    assert_eq!(aggregation.grouping_keys[0].name, "n0_0");
    assert_eq!(aggregation.aggregate_names, vec!["n1_1".to_string()]);
    let TypedExpr::Call { name, kind, .. } = &aggregation.aggregates[0] else {
        panic!("expected a call for the measure");
    };
    assert_eq!(name, "sum");
    assert_eq!(*kind, TypeKind::Bigint);
    // Output schema: grouping keys first, then aggregates.
    assert_eq!(aggregation.output_type.names(), &["n0_0", "n1_1"]);
}

#[test]
fn test_aggregate_without_measures_is_single_step() {
    let aggregate = Rel {
        rel_type: Some(RelType::Aggregate(Box::new(AggregateRel {
            input: Some(Box::new(read_rel(
                named_struct(&[("c0", i64_type())]),
                vec![dwrf_file("/data/part-0.dwrf")],
                None,
            ))),
            groupings: vec![proto::aggregate_rel::Grouping {
                grouping_expressions: vec![field(0)],
                ..Default::default()
            }],
            measures: vec![],
            ..Default::default()
        }))),
    };
    let plan = plan(vec![], aggregate);

    let converted = convert(&plan);
    let PlanNode::Aggregation(aggregation) = converted.root.as_ref() else {
        panic!("expected an aggregation");
    };
    assert_eq!(aggregation.step, AggregationStep::Single);
    assert!(aggregation.aggregates.is_empty());
}

#[test]
fn test_filter_rel_above_scan() {
    let filter_rel = Rel {
        rel_type: Some(RelType::Filter(Box::new(FilterRel {
            input: Some(Box::new(read_rel(
                named_struct(&[("c0", i64_type())]),
                vec![dwrf_file("/data/part-0.dwrf")],
                None,
            ))),
            condition: Some(Box::new(scalar(
                0,
                vec![field(0), lit_i64(10)],
                bool_type(),
            ))),
            ..Default::default()
        }))),
    };
    let plan = plan(vec![(0, "gte:i64_i64")], filter_rel);

    let converted = convert(&plan);
    let PlanNode::Filter(filter) = converted.root.as_ref() else {
        panic!("expected a filter node, got {:?}", converted.root);
    };
    let TypedExpr::Call { name, args, .. } = &filter.predicate else {
        panic!("expected a call predicate");
    };
    assert_eq!(name, "gte");
    // The predicate resolves against the scan's renamed output columns.
    assert_eq!(
        args[0],
        TypedExpr::Field(vexec_core::expr::FieldAccess {
            name: "n0_0".into(),
            index: 0,
            kind: TypeKind::Bigint,
        })
    );
}

#[test]
fn test_project_renames_output_columns() {
    let project = Rel {
        rel_type: Some(RelType::Project(Box::new(ProjectRel {
            input: Some(Box::new(read_rel(
                named_struct(&[("c0", i64_type()), ("c1", string_type())]),
                vec![dwrf_file("/data/part-0.dwrf")],
                None,
            ))),
            expressions: vec![field(1), field(0)],
            ..Default::default()
        }))),
    };
    let plan = plan(vec![], project);

    let converted = convert(&plan);
    let PlanNode::Project(project) = converted.root.as_ref() else {
        panic!("expected a project node");
    };
    assert_eq!(project.names, vec!["n1_0".to_string(), "n1_1".to_string()]);
    assert_eq!(
        project.output_type.kinds(),
        &[TypeKind::Varchar, TypeKind::Bigint]
    );
}

#[test]
fn test_scan_split_info_and_format_mapping() {
    let plan = plan(
        vec![],
        read_rel(
            named_struct(&[("c0", i64_type())]),
            vec![
                FileOrFiles {
                    partition_index: 2,
                    start: 128,
                    length: 256,
                    ..parquet_file("/data/part-0.parquet")
                },
                FileOrFiles {
                    partition_index: 2,
                    ..parquet_file("/data/part-1.parquet")
                },
            ],
            None,
        ),
    );

    let converted = convert(&plan);
    let scan = as_scan(&converted.root);
    assert!(scan.table_handle.filter_pushdown_enabled);
    assert_eq!(scan.table_handle.connector_id, "test-hive");
    assert_eq!(scan.table_handle.table_name, "hive_table");

    let split = &converted.split_info_map[scan.id.as_str()];
    assert_eq!(split.format, FileFormat::Parquet);
    assert!(!split.is_stream);
    assert_eq!(
        split.paths,
        vec!["/data/part-0.parquet".to_string(), "/data/part-1.parquet".to_string()]
    );
    assert_eq!(split.starts, vec![128, 0]);
    assert_eq!(split.lengths, vec![256, 100]);
    assert_eq!(split.partition_index, 2);

    // A file with no declared format maps to UNKNOWN.
    let unknown = plan_with_unknown_format();
    let converted = convert(&unknown);
    let scan = as_scan(&converted.root);
    assert_eq!(
        converted.split_info_map[scan.id.as_str()].format,
        FileFormat::Unknown
    );
}

fn plan_with_unknown_format() -> Plan {
    plan(
        vec![],
        read_rel(
            named_struct(&[("c0", i64_type())]),
            vec![file("/data/part-0.bin", None)],
            None,
        ),
    )
}

#[test]
fn test_stream_input_substitutes_registered_node() {
    let upstream = Arc::new(PlanNode::Values(ValuesNode {
        id: "99".into(),
        output_type: RowType::new(vec!["n99_0".into()], vec![TypeKind::Bigint]),
        vectors: vec![],
    }));

    let plan = plan(
        vec![],
        read_rel(
            named_struct(&[("c0", i64_type())]),
            vec![file("iterator:0", None)],
            None,
        ),
    );

    let mut converter = PlanConverter::new();
    converter.register_input_node(0, Arc::clone(&upstream));
    let converted = converter.convert_plan(&plan).unwrap();

    assert!(Arc::ptr_eq(&converted.root, &upstream));
    let split = &converted.split_info_map["99"];
    assert!(split.is_stream);
    assert!(split.paths.is_empty());
}

#[test]
fn test_unregistered_stream_index_is_invalid() {
    let plan = plan(
        vec![],
        read_rel(
            named_struct(&[("c0", i64_type())]),
            vec![file("iterator:3", None)],
            None,
        ),
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::InvalidPlan(message)
        if message.contains("stream index 3")));
}

#[test]
fn test_malformed_stream_index_is_invalid() {
    let plan = plan(
        vec![],
        read_rel(
            named_struct(&[("c0", i64_type())]),
            vec![file("iterator:abc", None)],
            None,
        ),
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::InvalidPlan(_)));
}

#[test]
fn test_empty_file_list_is_invalid() {
    let read = Rel {
        rel_type: Some(RelType::Read(Box::new(ReadRel {
            base_schema: Some(named_struct(&[("c0", i64_type())])),
            read_type: Some(ReadType::LocalFiles(LocalFiles {
                items: vec![],
                ..Default::default()
            })),
            ..Default::default()
        }))),
    };
    let error = PlanConverter::new()
        .convert_plan(&plan(vec![], read))
        .unwrap_err();
    assert!(matches!(error, ConvertError::InvalidPlan(message)
        if message.contains("at least one file path")));
}

#[test]
fn test_plan_without_relations_is_invalid() {
    let empty = Plan::default();
    let error = PlanConverter::new().convert_plan(&empty).unwrap_err();
    assert!(matches!(error, ConvertError::InvalidPlan(_)));
}

#[test]
fn test_unknown_function_anchor_is_fatal() {
    let filter = scalar(9, vec![field(0), lit_i64(1)], bool_type());
    let plan = plan(
        vec![],
        read_rel(
            named_struct(&[("c0", i64_type())]),
            vec![dwrf_file("/data/part-0.dwrf")],
            Some(filter),
        ),
    );
    let error = PlanConverter::new().convert_plan(&plan).unwrap_err();
    assert!(matches!(error, ConvertError::UnknownFunction(9)));
}

#[test]
fn test_unsupported_relation_kind_is_rejected() {
    let sort = Rel {
        rel_type: Some(RelType::Sort(Box::new(proto::SortRel {
            input: Some(Box::new(three_column_scan("l"))),
            ..Default::default()
        }))),
    };
    let error = PlanConverter::new()
        .convert_plan(&plan(vec![], sort))
        .unwrap_err();
    assert!(matches!(error, ConvertError::NotImplemented(message)
        if message.contains("sort")));
}

#[test]
fn test_conversion_is_deterministic() {
    let filter = scalar(
        0,
        vec![
            scalar(1, vec![field(0), lit_i64(10)], bool_type()),
            scalar(2, vec![field(0), lit_i64(100)], bool_type()),
        ],
        bool_type(),
    );
    let source = plan(
        vec![(0, "and:bool_bool"), (1, "gte:i64_i64"), (2, "lt:i64_i64")],
        Rel {
            rel_type: Some(RelType::Filter(Box::new(FilterRel {
                input: Some(Box::new(read_rel(
                    named_struct(&[("c0", i64_type())]),
                    vec![dwrf_file("/data/part-0.dwrf")],
                    Some(filter),
                ))),
                condition: Some(Box::new(lit_bool(true))),
                ..Default::default()
            }))),
        },
    );

    let first = convert(&source);
    let second = convert(&source);
    assert_eq!(first.root, second.root);
    assert_eq!(first.split_info_map, second.split_info_map);
}
