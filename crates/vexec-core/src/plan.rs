//! The engine plan node tree.
//!
//! Nodes are immutable once built; children are shared through `Arc` so a
//! subtree can be referenced from several places (e.g. a pre-registered
//! stream input substituted into more than one scan position).

use crate::connector::{ColumnHandle, TableHandle};
use crate::expr::{FieldAccess, TypedExpr};
use crate::types::RowType;
use crate::vector::RowVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// SQL join types supported by the hash join operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    LeftSemi,
    Anti,
}

/// Which phase of a multi-step aggregation this node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationStep {
    Partial,
    Intermediate,
    Final,
    Single,
}

/// Leaf scan over a connector table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableScanNode {
    pub id: String,
    pub output_type: RowType,
    pub table_handle: TableHandle,
    /// Output column name -> physical column binding.
    pub assignments: HashMap<String, ColumnHandle>,
}

/// Leaf node producing literal rows (a virtual table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesNode {
    pub id: String,
    pub output_type: RowType,
    pub vectors: Vec<RowVector>,
}

/// Row filter above another node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub id: String,
    pub predicate: TypedExpr,
    pub input: Arc<PlanNode>,
}

/// Projection computing a new set of output columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectNode {
    pub id: String,
    pub names: Vec<String>,
    pub expressions: Vec<TypedExpr>,
    pub output_type: RowType,
    pub input: Arc<PlanNode>,
}

impl ProjectNode {
    pub fn new(
        id: String,
        names: Vec<String>,
        expressions: Vec<TypedExpr>,
        input: Arc<PlanNode>,
    ) -> Self {
        let kinds = expressions.iter().map(TypedExpr::kind).collect();
        let output_type = RowType::new(names.clone(), kinds);
        ProjectNode {
            id,
            names,
            expressions,
            output_type,
            input,
        }
    }
}

/// Grouped aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationNode {
    pub id: String,
    pub step: AggregationStep,
    pub grouping_keys: Vec<FieldAccess>,
    pub aggregate_names: Vec<String>,
    /// One call expression per measure.
    pub aggregates: Vec<TypedExpr>,
    pub output_type: RowType,
    pub input: Arc<PlanNode>,
}

impl AggregationNode {
    /// Output schema is the grouping keys followed by the aggregates.
    pub fn new(
        id: String,
        step: AggregationStep,
        grouping_keys: Vec<FieldAccess>,
        aggregate_names: Vec<String>,
        aggregates: Vec<TypedExpr>,
        input: Arc<PlanNode>,
    ) -> Self {
        let mut names: Vec<String> = grouping_keys.iter().map(|k| k.name.clone()).collect();
        names.extend(aggregate_names.iter().cloned());
        let mut kinds: Vec<_> = grouping_keys.iter().map(|k| k.kind).collect();
        kinds.extend(aggregates.iter().map(TypedExpr::kind));
        let output_type = RowType::new(names, kinds);
        AggregationNode {
            id,
            step,
            grouping_keys,
            aggregate_names,
            aggregates,
            output_type,
            input,
        }
    }
}

/// Hash join of two inputs on equality keys, with an optional extra filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashJoinNode {
    pub id: String,
    pub join_type: JoinType,
    pub left_keys: Vec<FieldAccess>,
    pub right_keys: Vec<FieldAccess>,
    pub filter: Option<TypedExpr>,
    pub output_type: RowType,
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
}

impl HashJoinNode {
    /// Output schema is the left schema followed by the right schema.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        join_type: JoinType,
        left_keys: Vec<FieldAccess>,
        right_keys: Vec<FieldAccess>,
        filter: Option<TypedExpr>,
        left: Arc<PlanNode>,
        right: Arc<PlanNode>,
    ) -> Self {
        let output_type = left.output_type().concat(right.output_type());
        HashJoinNode {
            id,
            join_type,
            left_keys,
            right_keys,
            filter,
            output_type,
            left,
            right,
        }
    }
}

/// A node of the physical plan tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    TableScan(TableScanNode),
    Values(ValuesNode),
    Filter(FilterNode),
    Project(ProjectNode),
    Aggregation(AggregationNode),
    HashJoin(HashJoinNode),
}

impl PlanNode {
    pub fn id(&self) -> &str {
        match self {
            PlanNode::TableScan(n) => &n.id,
            PlanNode::Values(n) => &n.id,
            PlanNode::Filter(n) => &n.id,
            PlanNode::Project(n) => &n.id,
            PlanNode::Aggregation(n) => &n.id,
            PlanNode::HashJoin(n) => &n.id,
        }
    }

    pub fn output_type(&self) -> &RowType {
        match self {
            PlanNode::TableScan(n) => &n.output_type,
            PlanNode::Values(n) => &n.output_type,
            PlanNode::Filter(n) => n.input.output_type(),
            PlanNode::Project(n) => &n.output_type,
            PlanNode::Aggregation(n) => &n.output_type,
            PlanNode::HashJoin(n) => &n.output_type,
        }
    }

    pub fn children(&self) -> Vec<&Arc<PlanNode>> {
        match self {
            PlanNode::TableScan(_) | PlanNode::Values(_) => vec![],
            PlanNode::Filter(n) => vec![&n.input],
            PlanNode::Project(n) => vec![&n.input],
            PlanNode::Aggregation(n) => vec![&n.input],
            PlanNode::HashJoin(n) => vec![&n.left, &n.right],
        }
    }
}
