//! # Substrait Plan Consumer
//!
//! Converts a decoded Substrait `Plan` into a vexec physical plan tree plus
//! the split metadata that binds each leaf scan to its data sources:
//!
//! ```text
//! substrait::proto::Plan
//!   -> PlanConverter::convert_plan()
//!   -> ConvertedPlan { root: Arc<PlanNode>, split_info_map }
//! ```
//!
//! ## Conversion Strategy
//!
//! The consumer recursively walks the Substrait `Rel` tree, one case per
//! relation kind:
//!
//! - **ReadRel** -> `TableScanNode` (with pushed-down subfield filters and a
//!   residual filter on the table handle) or `ValuesNode` for virtual
//!   tables; an `iterator:<N>` file path substitutes a pre-registered
//!   input node instead.
//! - **FilterRel** -> `FilterNode`
//! - **ProjectRel** -> `ProjectNode`
//! - **AggregateRel** -> `AggregationNode` (step derived from the measures)
//! - **JoinRel** -> `HashJoinNode` (equality keys extracted from the
//!   condition tree)
//!
//! Node ids are handed out post-order from a counter starting at zero, and
//! output columns are named `n<id>_<col>`, so converting the same plan
//! twice yields identical ids and names.

use crate::error::ConvertError;
use crate::expr::{literal_variant, ExprConverter};
use crate::functions::FunctionRegistry;
use crate::pushdown::analyze_scan_filter;
use crate::types::parse_named_struct;
use std::collections::HashMap;
use std::sync::Arc;
use substrait::proto;
use substrait::proto::expression::{FieldReference, RexType};
use substrait::proto::function_argument::ArgType;
use substrait::proto::read_rel::local_files::file_or_files::{
    FileFormat as ProtoFileFormat, PathType,
};
use substrait::proto::read_rel::ReadType;
use substrait::proto::rel::RelType;
use tracing::debug;
use vexec_core::connector::{
    ColumnHandle, ColumnType, FileFormat, SplitInfo, TableHandle,
};
use vexec_core::expr::{FieldAccess, TypedExpr};
use vexec_core::filter::SubfieldFilters;
use vexec_core::plan::{
    AggregationNode, AggregationStep, FilterNode, HashJoinNode, JoinType, PlanNode,
    ProjectNode, TableScanNode, ValuesNode,
};
use vexec_core::types::RowType;
use vexec_core::variant::Variant;
use vexec_core::vector::{ColumnVector, RowVector};

/// Connector the produced scans are bound to.
const HIVE_CONNECTOR_ID: &str = "test-hive";
const HIVE_TABLE_NAME: &str = "hive_table";

/// Prefix marking a file path as a reference to a registered input node.
const ITERATOR_PREFIX: &str = "iterator:";

/// Result of converting one plan.
#[derive(Debug)]
pub struct ConvertedPlan {
    pub root: Arc<PlanNode>,
    /// Scan node id -> split metadata.
    pub split_info_map: HashMap<String, SplitInfo>,
}

/// Converts one Substrait plan into a vexec plan tree.
///
/// A converter holds per-plan state (the function registry, the node id
/// counter, the split map), so use a fresh instance per plan.
#[derive(Debug, Default)]
pub struct PlanConverter {
    exprs: ExprConverter,
    next_node_id: u64,
    split_info_map: HashMap<String, SplitInfo>,
    input_nodes: HashMap<usize, Arc<PlanNode>>,
}

impl PlanConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an upstream node that `iterator:<index>` scans resolve to.
    pub fn register_input_node(&mut self, index: usize, node: Arc<PlanNode>) {
        self.input_nodes.insert(index, node);
    }

    /// Convert a whole plan. Exactly one `RelRoot` or `Rel` is expected.
    pub fn convert_plan(
        mut self,
        plan: &proto::Plan,
    ) -> Result<ConvertedPlan, ConvertError> {
        self.exprs = ExprConverter::new(FunctionRegistry::from_plan(plan));
        debug!(
            functions = self.exprs.functions().len(),
            "constructed function map"
        );

        for relation in &plan.relations {
            match &relation.rel_type {
                Some(proto::plan_rel::RelType::Root(root)) => {
                    let input = root.input.as_ref().ok_or_else(|| {
                        ConvertError::InvalidPlan("input is expected in RelRoot".into())
                    })?;
                    let node = self.convert_rel(input)?;
                    return Ok(ConvertedPlan {
                        root: node,
                        split_info_map: self.split_info_map,
                    });
                }
                Some(proto::plan_rel::RelType::Rel(rel)) => {
                    let node = self.convert_rel(rel)?;
                    return Ok(ConvertedPlan {
                        root: node,
                        split_info_map: self.split_info_map,
                    });
                }
                None => continue,
            }
        }
        Err(ConvertError::InvalidPlan(
            "RelRoot or Rel is expected in Plan".into(),
        ))
    }

    fn convert_rel(&mut self, rel: &proto::Rel) -> Result<Arc<PlanNode>, ConvertError> {
        let rel_type = rel
            .rel_type
            .as_ref()
            .ok_or_else(|| ConvertError::InvalidPlan("relation without rel_type".into()))?;
        match rel_type {
            RelType::Aggregate(aggregate) => self.convert_aggregate(aggregate),
            RelType::Project(project) => self.convert_project(project),
            RelType::Filter(filter) => self.convert_filter(filter),
            RelType::Join(join) => self.convert_join(join),
            RelType::Read(read) => self.convert_read(read),
            other => Err(ConvertError::NotImplemented(format!(
                "substrait relation kind '{}'",
                rel_kind_name(other)
            ))),
        }
    }

    fn convert_filter(
        &mut self,
        filter: &proto::FilterRel,
    ) -> Result<Arc<PlanNode>, ConvertError> {
        let input = filter.input.as_ref().ok_or_else(|| {
            ConvertError::InvalidPlan("child Rel is expected in FilterRel".into())
        })?;
        let child = self.convert_rel(input)?;

        let condition = filter.condition.as_deref().ok_or_else(|| {
            ConvertError::InvalidPlan("condition is expected in FilterRel".into())
        })?;
        let predicate = self.exprs.to_typed(condition, child.output_type())?;

        let id = self.take_node_id();
        Ok(Arc::new(PlanNode::Filter(FilterNode {
            id: id.to_string(),
            predicate,
            input: child,
        })))
    }

    fn convert_project(
        &mut self,
        project: &proto::ProjectRel,
    ) -> Result<Arc<PlanNode>, ConvertError> {
        let input = project.input.as_ref().ok_or_else(|| {
            ConvertError::InvalidPlan("child Rel is expected in ProjectRel".into())
        })?;
        let child = self.convert_rel(input)?;
        let input_type = child.output_type().clone();

        let id = self.take_node_id();
        let mut names = Vec::with_capacity(project.expressions.len());
        let mut expressions = Vec::with_capacity(project.expressions.len());
        for (column, expression) in project.expressions.iter().enumerate() {
            expressions.push(self.exprs.to_typed(expression, &input_type)?);
            names.push(node_column_name(id, column));
        }

        Ok(Arc::new(PlanNode::Project(ProjectNode::new(
            id.to_string(),
            names,
            expressions,
            child,
        ))))
    }

    fn convert_aggregate(
        &mut self,
        aggregate: &proto::AggregateRel,
    ) -> Result<Arc<PlanNode>, ConvertError> {
        let input = aggregate.input.as_ref().ok_or_else(|| {
            ConvertError::InvalidPlan("child Rel is expected in AggregateRel".into())
        })?;
        let child = self.convert_rel(input)?;
        let input_type = child.output_type().clone();

        let step = set_step(aggregate)?;

        // Groupings are limited to direct field references.
        let mut grouping_keys = Vec::new();
        #[allow(deprecated)]
        for grouping in &aggregate.groupings {
            for expression in &grouping.grouping_expressions {
                match &expression.rex_type {
                    Some(RexType::Selection(reference)) => {
                        grouping_keys.push(self.exprs.field_access(reference, &input_type)?)
                    }
                    _ => {
                        return Err(ConvertError::NotImplemented(
                            "grouping expression must be a field reference".into(),
                        ))
                    }
                }
            }
        }

        // One call expression per measure.
        let mut aggregates = Vec::with_capacity(aggregate.measures.len());
        for measure in &aggregate.measures {
            let function = measure.measure.as_ref().ok_or_else(|| {
                ConvertError::InvalidPlan("measure without an aggregate function".into())
            })?;
            let name = self
                .exprs
                .functions()
                .base_name(function.function_reference)?
                .to_string();
            let mut args = Vec::with_capacity(function.arguments.len());
            for argument in &function.arguments {
                match &argument.arg_type {
                    Some(ArgType::Value(value)) => {
                        args.push(self.exprs.to_typed(value, &input_type)?)
                    }
                    _ => {
                        return Err(ConvertError::UnsupportedExpression(format!(
                            "non-value argument of aggregate function '{}'",
                            name
                        )))
                    }
                }
            }
            let kind = match &function.output_type {
                Some(ty) => crate::types::parse_type(ty)?,
                None => {
                    return Err(ConvertError::InvalidPlan(format!(
                        "aggregate function '{}' without an output type",
                        name
                    )))
                }
            };
            aggregates.push(TypedExpr::Call { kind, name, args });
        }

        let id = self.take_node_id();
        let aggregate_names = (0..aggregates.len())
            .map(|index| node_column_name(id, grouping_keys.len() + index))
            .collect();

        Ok(Arc::new(PlanNode::Aggregation(AggregationNode::new(
            id.to_string(),
            step,
            grouping_keys,
            aggregate_names,
            aggregates,
            child,
        ))))
    }

    fn convert_join(&mut self, join: &proto::JoinRel) -> Result<Arc<PlanNode>, ConvertError> {
        let left = join
            .left
            .as_ref()
            .ok_or_else(|| ConvertError::InvalidPlan("left Rel is expected in JoinRel".into()))?;
        let right = join.right.as_ref().ok_or_else(|| {
            ConvertError::InvalidPlan("right Rel is expected in JoinRel".into())
        })?;

        let left_node = self.convert_rel(left)?;
        let right_node = self.convert_rel(right)?;

        // Keys and the post-join filter resolve against left ∥ right.
        let output_type = left_node.output_type().concat(right_node.output_type());

        let expression = join.expression.as_deref().ok_or_else(|| {
            ConvertError::InvalidPlan("join condition is expected in JoinRel".into())
        })?;
        let mut left_references = Vec::new();
        let mut right_references = Vec::new();
        self.extract_join_keys(expression, &mut left_references, &mut right_references)?;

        let left_keys = left_references
            .iter()
            .map(|reference| self.exprs.field_access(reference, &output_type))
            .collect::<Result<Vec<FieldAccess>, _>>()?;
        let right_keys = right_references
            .iter()
            .map(|reference| self.exprs.field_access(reference, &output_type))
            .collect::<Result<Vec<FieldAccess>, _>>()?;

        let filter = join
            .post_join_filter
            .as_deref()
            .map(|expression| self.exprs.to_typed(expression, &output_type))
            .transpose()?;

        let join_type = match join.r#type {
            t if t == proto::join_rel::JoinType::Inner as i32 => JoinType::Inner,
            t if t == proto::join_rel::JoinType::Outer as i32 => JoinType::Full,
            t if t == proto::join_rel::JoinType::Left as i32 => JoinType::Left,
            t if t == proto::join_rel::JoinType::Right as i32 => JoinType::Right,
            t if t == proto::join_rel::JoinType::LeftSemi as i32 => JoinType::LeftSemi,
            t if t == proto::join_rel::JoinType::LeftAnti as i32 => JoinType::Anti,
            other => {
                return Err(ConvertError::NotImplemented(format!(
                    "join type {}",
                    other
                )))
            }
        };

        let id = self.take_node_id();
        Ok(Arc::new(PlanNode::HashJoin(HashJoinNode::new(
            id.to_string(),
            join_type,
            left_keys,
            right_keys,
            filter,
            left_node,
            right_node,
        ))))
    }

    /// Collect the (left, right) key pairs of a join condition.
    ///
    /// `and` recurses in argument order, `eq(field, field)` contributes one
    /// pair, anything else is rejected.
    fn extract_join_keys<'a>(
        &self,
        expression: &'a proto::Expression,
        left_keys: &mut Vec<&'a FieldReference>,
        right_keys: &mut Vec<&'a FieldReference>,
    ) -> Result<(), ConvertError> {
        let Some(RexType::ScalarFunction(function)) = &expression.rex_type else {
            return Err(ConvertError::InvalidPlan(
                "unable to parse the join condition expression".into(),
            ));
        };
        let name = self
            .exprs
            .functions()
            .base_name(function.function_reference)?;
        match name {
            "and" => {
                for argument in &function.arguments {
                    match &argument.arg_type {
                        Some(ArgType::Value(child)) => {
                            self.extract_join_keys(child, left_keys, right_keys)?
                        }
                        _ => {
                            return Err(ConvertError::InvalidPlan(
                                "non-expression argument in a join condition".into(),
                            ))
                        }
                    }
                }
                Ok(())
            }
            "eq" => {
                let mut references = Vec::with_capacity(2);
                for argument in &function.arguments {
                    let value = match &argument.arg_type {
                        Some(ArgType::Value(value)) => value,
                        _ => {
                            return Err(ConvertError::InvalidPlan(
                                "non-expression argument in a join condition".into(),
                            ))
                        }
                    };
                    match &value.rex_type {
                        Some(RexType::Selection(reference)) => references.push(&**reference),
                        _ => {
                            return Err(ConvertError::NotImplemented(
                                "join equality argument must be a field reference".into(),
                            ))
                        }
                    }
                }
                if references.len() != 2 {
                    return Err(ConvertError::InvalidPlan(
                        "two arguments are expected for eq in a join condition".into(),
                    ));
                }
                left_keys.push(references[0]);
                right_keys.push(references[1]);
                Ok(())
            }
            other => Err(ConvertError::NotImplemented(format!(
                "join condition function '{}'",
                other
            ))),
        }
    }

    fn convert_read(&mut self, read: &proto::ReadRel) -> Result<Arc<PlanNode>, ConvertError> {
        let base_row = match &read.base_schema {
            Some(schema) => parse_named_struct(schema)?,
            None => RowType::empty(),
        };

        match &read.read_type {
            Some(ReadType::VirtualTable(table)) => self.convert_virtual_table(table, &base_row),
            Some(ReadType::LocalFiles(files)) => self.convert_scan(read, files, &base_row),
            Some(_) => Err(ConvertError::NotImplemented(
                "only local files and virtual tables are supported in ReadRel".into(),
            )),
            None => Err(ConvertError::InvalidPlan(
                "local files or a virtual table is expected in ReadRel".into(),
            )),
        }
    }

    fn convert_scan(
        &mut self,
        read: &proto::ReadRel,
        files: &proto::read_rel::LocalFiles,
        base_row: &RowType,
    ) -> Result<Arc<PlanNode>, ConvertError> {
        if files.items.is_empty() {
            return Err(ConvertError::InvalidPlan(
                "at least one file path is expected".into(),
            ));
        }

        // A scan whose first file is `iterator:<N>` is fed by the
        // pre-registered input node N instead of reading files.
        if let Some(stream_index) = stream_index(files)? {
            let node = self.input_nodes.get(&stream_index).cloned().ok_or_else(|| {
                ConvertError::InvalidPlan(format!(
                    "no input node registered for stream index {}",
                    stream_index
                ))
            })?;
            let split_info = SplitInfo {
                is_stream: true,
                ..Default::default()
            };
            self.split_info_map.insert(node.id().to_string(), split_info);
            debug!(index = stream_index, "substituted stream input for scan");
            return Ok(node);
        }

        let mut split_info = SplitInfo::default();
        split_info.paths.reserve(files.items.len());
        split_info.starts.reserve(files.items.len());
        split_info.lengths.reserve(files.items.len());
        for file in &files.items {
            // All partitions of one scan share the same index.
            split_info.partition_index = file.partition_index;
            split_info.paths.push(match &file.path_type {
                Some(PathType::UriFile(path)) => path.clone(),
                _ => String::new(),
            });
            split_info.starts.push(file.start);
            split_info.lengths.push(file.length);
            split_info.format = match &file.file_format {
                Some(ProtoFileFormat::Parquet(_)) => FileFormat::Parquet,
                Some(ProtoFileFormat::Dwrf(_)) => FileFormat::Dwrf,
                Some(ProtoFileFormat::Orc(_)) => FileFormat::Orc,
                _ => FileFormat::Unknown,
            };
        }

        let (subfield_filters, remaining_filter) = match read.filter.as_deref() {
            Some(filter) => {
                let analysis =
                    analyze_scan_filter(filter, base_row, split_info.format, &self.exprs)?;
                (analysis.subfield_filters, analysis.remaining_filter)
            }
            None => (SubfieldFilters::new(), None),
        };

        let table_handle = TableHandle {
            connector_id: HIVE_CONNECTOR_ID.to_string(),
            table_name: HIVE_TABLE_NAME.to_string(),
            // The engine requires filter pushdown to be enabled on scans.
            filter_pushdown_enabled: true,
            subfield_filters,
            remaining_filter,
        };

        let id = self.take_node_id();
        let mut out_names = Vec::with_capacity(base_row.size());
        let mut assignments = HashMap::with_capacity(base_row.size());
        for (column, name) in base_row.names().iter().enumerate() {
            let out_name = node_column_name(id, column);
            assignments.insert(
                out_name.clone(),
                ColumnHandle {
                    name: name.clone(),
                    column_type: ColumnType::Regular,
                    kind: base_row.kind_of(column).unwrap_or_default(),
                },
            );
            out_names.push(out_name);
        }
        let output_type = RowType::new(out_names, base_row.kinds().to_vec());

        let node = Arc::new(PlanNode::TableScan(TableScanNode {
            id: id.to_string(),
            output_type,
            table_handle,
            assignments,
        }));
        self.split_info_map.insert(id.to_string(), split_info);
        Ok(node)
    }

    /// Materialize a virtual table into literal-backed row vectors.
    ///
    /// Each literal struct holds `batch_size * column_count` fields laid out
    /// column-major: field `col * batch_size + row` is row `row` of column
    /// `col`.
    fn convert_virtual_table(
        &mut self,
        table: &proto::read_rel::VirtualTable,
        base_row: &RowType,
    ) -> Result<Arc<PlanNode>, ConvertError> {
        let column_count = base_row.size();
        if column_count == 0 {
            return Err(ConvertError::InvalidPlan(
                "a base schema is expected for a virtual table".into(),
            ));
        }

        let id = self.take_node_id();
        let out_names = (0..column_count)
            .map(|column| node_column_name(id, column))
            .collect();
        let output_type = RowType::new(out_names, base_row.kinds().to_vec());

        #[allow(deprecated)]
        let rows = &table.values;
        let batch_size = rows
            .last()
            .map(|row| row.fields.len() / column_count)
            .unwrap_or(0);

        let mut vectors = Vec::with_capacity(rows.len());
        for row_value in rows {
            if row_value.fields.len() != batch_size * column_count {
                return Err(ConvertError::InvalidPlan(format!(
                    "virtual table struct holds {} fields, expected {}",
                    row_value.fields.len(),
                    batch_size * column_count
                )));
            }
            let mut columns = Vec::with_capacity(column_count);
            for column in 0..column_count {
                let kind = output_type.kind_of(column).unwrap_or_default();
                let mut batch = Vec::with_capacity(batch_size);
                for row in 0..batch_size {
                    let literal = &row_value.fields[column * batch_size + row];
                    let value = match literal_variant(literal) {
                        Ok(Variant::Array(_)) | Err(ConvertError::UnsupportedExpression(_)) => {
                            return Err(ConvertError::NotImplemented(
                                "values node with complex type values is not supported yet"
                                    .into(),
                            ))
                        }
                        Ok(value) => value,
                        Err(error) => return Err(error),
                    };
                    batch.push(value);
                }
                columns.push(
                    ColumnVector::from_variants(kind, &batch)
                        .map_err(|error| ConvertError::NotImplemented(error.to_string()))?,
                );
            }
            let vector = RowVector::new(output_type.clone(), columns)
                .map_err(|error| ConvertError::InvalidPlan(error.to_string()))?;
            vectors.push(vector);
        }

        Ok(Arc::new(PlanNode::Values(ValuesNode {
            id: id.to_string(),
            output_type,
            vectors,
        })))
    }

    fn take_node_id(&mut self) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }
}

/// Derive the aggregation step from the phase of the first measure; with no
/// measures the aggregation is single-step. If measures disagree on their
/// phase, the first one silently wins.
fn set_step(aggregate: &proto::AggregateRel) -> Result<AggregationStep, ConvertError> {
    use substrait::proto::AggregationPhase;

    let Some(measure) = aggregate.measures.first() else {
        return Ok(AggregationStep::Single);
    };
    let function = measure.measure.as_ref().ok_or_else(|| {
        ConvertError::InvalidPlan("measure without an aggregate function".into())
    })?;
    match function.phase {
        p if p == AggregationPhase::InitialToIntermediate as i32 => Ok(AggregationStep::Partial),
        p if p == AggregationPhase::IntermediateToIntermediate as i32 => {
            Ok(AggregationStep::Intermediate)
        }
        p if p == AggregationPhase::IntermediateToResult as i32 => Ok(AggregationStep::Final),
        p if p == AggregationPhase::InitialToResult as i32 => Ok(AggregationStep::Single),
        other => Err(ConvertError::NotImplemented(format!(
            "aggregation phase {}",
            other
        ))),
    }
}

/// Stream index of a scan whose first file path is `iterator:<N>`.
fn stream_index(files: &proto::read_rel::LocalFiles) -> Result<Option<usize>, ConvertError> {
    let first = &files.items[0];
    let path = match &first.path_type {
        Some(PathType::UriFile(path)) => path.as_str(),
        _ => return Ok(None),
    };
    match path.strip_prefix(ITERATOR_PREFIX) {
        Some(index) => index.parse::<usize>().map(Some).map_err(|error| {
            ConvertError::InvalidPlan(format!("invalid stream index '{}': {}", index, error))
        }),
        None => Ok(None),
    }
}

/// Output column naming scheme: column `col` of node `id` is `n<id>_<col>`.
fn node_column_name(node_id: u64, column: usize) -> String {
    format!("n{}_{}", node_id, column)
}

fn rel_kind_name(rel_type: &RelType) -> &'static str {
    match rel_type {
        RelType::Read(_) => "read",
        RelType::Filter(_) => "filter",
        RelType::Fetch(_) => "fetch",
        RelType::Aggregate(_) => "aggregate",
        RelType::Sort(_) => "sort",
        RelType::Join(_) => "join",
        RelType::Project(_) => "project",
        RelType::Set(_) => "set",
        RelType::Cross(_) => "cross",
        _ => "extension",
    }
}
