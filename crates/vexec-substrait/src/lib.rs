//! # vexec-substrait: Substrait Plan Ingestion
//!
//! This crate converts a decoded [Substrait](https://substrait.io/) `Plan`
//! into a vexec physical plan tree:
//!
//! ```text
//! substrait::proto::Plan
//!   -> PlanConverter::convert_plan()
//!   -> vexec plan nodes + { scan node id -> SplitInfo }
//! ```
//!
//! The conversion is a single-threaded, synchronous transformation with no
//! shared state; to convert plans in parallel, use one `PlanConverter` per
//! plan.
//!
//! ## Filter pushdown
//!
//! The interesting part is deciding how much of a scan's filter can be
//! evaluated by the scan reader itself. A boolean conjunction above a
//! `ReadRel` is flattened, each conjunct is classified as a pushdown
//! candidate or a residual, candidates are folded into per-column
//! constraints, and the constraints are lowered into the typed subfield
//! filter primitives the reader understands. Whatever cannot be represented
//! that way, or whatever the scan's file format cannot evaluate, remains a
//! residual expression above the scan.
//!
//! ## Module Overview
//!
//! - **`error`**: The error taxonomy of the converter.
//! - **`functions`**: Function anchor -> name registry built per plan.
//! - **`types`**: Substrait type and schema parsing.
//! - **`expr`**: Substrait expression -> typed engine expression.
//! - **`pushdown`**: Conjunction flattening, pushdown/residual partition,
//!   format veto, residual reassembly.
//! - **`filter_info`**: Per-column constraint accumulation.
//! - **`subfield`**: Lowering of column constraints into filter primitives.
//! - **`consumer`**: The per-relation plan translator.

pub mod consumer;
pub mod error;
pub mod expr;
pub mod filter_info;
pub mod functions;
pub mod pushdown;
pub mod subfield;
pub mod types;
