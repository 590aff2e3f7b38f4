//! # vexec-core: Plan Representation for the vexec Columnar Engine
//!
//! This crate defines the engine-native plan tree and the supporting value
//! types that the rest of the engine consumes: row types, literal variants,
//! typed expressions, scan pushdown filters, split metadata, and the plan
//! nodes themselves.
//!
//! ## Module Overview
//!
//! - **`types`**: Scalar type tags (`TypeKind`) and row schemas (`RowType`).
//! - **`variant`**: Tagged literal scalar values used for constants and
//!   filter bounds.
//! - **`expr`**: Engine-native typed expressions (field accesses, constants,
//!   function calls).
//! - **`filter`**: The subfield filter primitives a scan reader can evaluate
//!   directly (ranges, value sets, null checks) and their factories.
//! - **`vector`**: Literal-backed columnar vectors for in-plan value sets
//!   (virtual tables).
//! - **`connector`**: Table handles, column handles, file formats, and the
//!   per-scan split metadata.
//! - **`plan`**: The immutable plan node tree produced by plan conversion.
//!
//! Plan nodes and split info are immutable after construction; a producer
//! builds them once and hands ownership to the caller.

pub mod connector;
pub mod expr;
pub mod filter;
pub mod plan;
pub mod types;
pub mod variant;
pub mod vector;
