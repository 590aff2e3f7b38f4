//! Builders for hand-assembled Substrait plans.

#![allow(dead_code)]

use substrait::proto;
use substrait::proto::expression::literal::LiteralType;
use substrait::proto::expression::{
    field_reference, reference_segment, FieldReference, Literal, ReferenceSegment, RexType,
    ScalarFunction,
};
use substrait::proto::extensions::simple_extension_declaration::{
    ExtensionFunction, MappingType,
};
use substrait::proto::extensions::SimpleExtensionDeclaration;
use substrait::proto::function_argument::ArgType;
use substrait::proto::read_rel::local_files::file_or_files::{
    DwrfReadOptions, FileFormat as ProtoFileFormat, ParquetReadOptions, PathType,
};
use substrait::proto::read_rel::local_files::FileOrFiles;
use substrait::proto::read_rel::{LocalFiles, ReadType, VirtualTable};
use substrait::proto::{
    Expression, FunctionArgument, NamedStruct, Plan, PlanRel, ReadRel, Rel,
};
use vexec_core::plan::{PlanNode, TableScanNode};
use vexec_substrait::consumer::{ConvertedPlan, PlanConverter};

pub fn bool_type() -> proto::Type {
    proto::Type {
        kind: Some(proto::r#type::Kind::Bool(proto::r#type::Boolean::default())),
    }
}

pub fn i32_type() -> proto::Type {
    proto::Type {
        kind: Some(proto::r#type::Kind::I32(proto::r#type::I32::default())),
    }
}

pub fn i64_type() -> proto::Type {
    proto::Type {
        kind: Some(proto::r#type::Kind::I64(proto::r#type::I64::default())),
    }
}

pub fn f64_type() -> proto::Type {
    proto::Type {
        kind: Some(proto::r#type::Kind::Fp64(proto::r#type::Fp64::default())),
    }
}

pub fn string_type() -> proto::Type {
    proto::Type {
        kind: Some(proto::r#type::Kind::String(proto::r#type::String::default())),
    }
}

pub fn named_struct(columns: &[(&str, proto::Type)]) -> NamedStruct {
    NamedStruct {
        names: columns.iter().map(|(name, _)| name.to_string()).collect(),
        r#struct: Some(proto::r#type::Struct {
            types: columns.iter().map(|(_, ty)| ty.clone()).collect(),
            ..Default::default()
        }),
    }
}

pub fn extension(anchor: u32, name: &str) -> SimpleExtensionDeclaration {
    SimpleExtensionDeclaration {
        mapping_type: Some(MappingType::ExtensionFunction(ExtensionFunction {
            extension_uri_reference: 0,
            function_anchor: anchor,
            name: name.to_string(),
        })),
    }
}

/// Direct struct-field reference to column `index`.
pub fn field(index: i32) -> Expression {
    Expression {
        rex_type: Some(RexType::Selection(Box::new(FieldReference {
            reference_type: Some(field_reference::ReferenceType::DirectReference(
                ReferenceSegment {
                    reference_type: Some(reference_segment::ReferenceType::StructField(
                        Box::new(reference_segment::StructField {
                            field: index,
                            child: None,
                        }),
                    )),
                },
            )),
            ..Default::default()
        }))),
    }
}

pub fn raw_lit(literal_type: LiteralType) -> Literal {
    Literal {
        literal_type: Some(literal_type),
        ..Default::default()
    }
}

pub fn lit(literal_type: LiteralType) -> Expression {
    Expression {
        rex_type: Some(RexType::Literal(raw_lit(literal_type))),
    }
}

pub fn lit_bool(value: bool) -> Expression {
    lit(LiteralType::Boolean(value))
}

pub fn lit_i32(value: i32) -> Expression {
    lit(LiteralType::I32(value))
}

pub fn lit_i64(value: i64) -> Expression {
    lit(LiteralType::I64(value))
}

pub fn lit_f64(value: f64) -> Expression {
    lit(LiteralType::Fp64(value))
}

pub fn lit_string(value: &str) -> Expression {
    lit(LiteralType::String(value.to_string()))
}

pub fn lit_i64_list(values: &[i64]) -> Expression {
    lit(LiteralType::List(proto::expression::literal::List {
        values: values
            .iter()
            .map(|value| raw_lit(LiteralType::I64(*value)))
            .collect(),
    }))
}

pub fn lit_string_list(values: &[&str]) -> Expression {
    lit(LiteralType::List(proto::expression::literal::List {
        values: values
            .iter()
            .map(|value| raw_lit(LiteralType::String(value.to_string())))
            .collect(),
    }))
}

/// Scalar call of the function at `anchor` with value arguments.
pub fn scalar(anchor: u32, args: Vec<Expression>, output: proto::Type) -> Expression {
    Expression {
        rex_type: Some(RexType::ScalarFunction(ScalarFunction {
            function_reference: anchor,
            arguments: args
                .into_iter()
                .map(|expression| FunctionArgument {
                    arg_type: Some(ArgType::Value(expression)),
                })
                .collect(),
            output_type: Some(output),
            ..Default::default()
        })),
    }
}

pub fn file(path: &str, format: Option<ProtoFileFormat>) -> FileOrFiles {
    FileOrFiles {
        path_type: Some(PathType::UriFile(path.to_string())),
        partition_index: 0,
        start: 0,
        length: 100,
        file_format: format,
        ..Default::default()
    }
}

pub fn parquet_file(path: &str) -> FileOrFiles {
    file(
        path,
        Some(ProtoFileFormat::Parquet(ParquetReadOptions::default())),
    )
}

pub fn dwrf_file(path: &str) -> FileOrFiles {
    file(path, Some(ProtoFileFormat::Dwrf(DwrfReadOptions::default())))
}

pub fn read_rel(
    schema: NamedStruct,
    files: Vec<FileOrFiles>,
    filter: Option<Expression>,
) -> Rel {
    Rel {
        rel_type: Some(proto::rel::RelType::Read(Box::new(ReadRel {
            base_schema: Some(schema),
            filter: filter.map(Box::new),
            read_type: Some(ReadType::LocalFiles(LocalFiles {
                items: files,
                ..Default::default()
            })),
            ..Default::default()
        }))),
    }
}

#[allow(deprecated)]
pub fn virtual_read_rel(
    schema: NamedStruct,
    rows: Vec<proto::expression::literal::Struct>,
) -> Rel {
    Rel {
        rel_type: Some(proto::rel::RelType::Read(Box::new(ReadRel {
            base_schema: Some(schema),
            read_type: Some(ReadType::VirtualTable(VirtualTable {
                values: rows,
                ..Default::default()
            })),
            ..Default::default()
        }))),
    }
}

pub fn plan(extensions: Vec<(u32, &str)>, rel: Rel) -> Plan {
    Plan {
        extensions: extensions
            .into_iter()
            .map(|(anchor, name)| extension(anchor, name))
            .collect(),
        relations: vec![PlanRel {
            rel_type: Some(proto::plan_rel::RelType::Rel(rel)),
        }],
        ..Default::default()
    }
}

pub fn convert(plan: &Plan) -> ConvertedPlan {
    PlanConverter::new()
        .convert_plan(plan)
        .expect("plan conversion should succeed")
}

pub fn as_scan(node: &PlanNode) -> &TableScanNode {
    match node {
        PlanNode::TableScan(scan) => scan,
        other => panic!("expected a table scan, got {:?}", other),
    }
}
