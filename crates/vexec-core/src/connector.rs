//! Connector-facing metadata: table handles, column handles, and splits.

use crate::expr::TypedExpr;
use crate::filter::SubfieldFilters;
use crate::types::TypeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// On-disk format of the files behind a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    Parquet,
    Dwrf,
    Orc,
    #[default]
    Unknown,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Parquet => "parquet",
            FileFormat::Dwrf => "dwrf",
            FileFormat::Orc => "orc",
            FileFormat::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Per-scan split metadata: the file regions a scan reads, or a marker that
/// the scan is fed by an upstream stream instead of files.
///
/// `paths`, `starts`, and `lengths` are parallel lists, one entry per file
/// region. Created alongside the scan node and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub paths: Vec<String>,
    pub starts: Vec<u64>,
    pub lengths: Vec<u64>,
    pub partition_index: u64,
    pub format: FileFormat,
    pub is_stream: bool,
}

/// Role of a column within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Regular,
    PartitionKey,
    Synthesized,
}

/// Binding of a scan output column to a physical table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHandle {
    pub name: String,
    pub column_type: ColumnType,
    pub kind: TypeKind,
}

/// What the scan reads and which filters it evaluates itself.
///
/// `subfield_filters` are pushed into the reader; `remaining_filter` is the
/// residual predicate the scan evaluates row-by-row after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHandle {
    pub connector_id: String,
    pub table_name: String,
    pub filter_pushdown_enabled: bool,
    pub subfield_filters: SubfieldFilters,
    pub remaining_filter: Option<TypedExpr>,
}
