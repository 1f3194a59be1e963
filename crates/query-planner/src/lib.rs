//! Statement shapes walked by the catalog collector
//!
//! The planner hands the dispatcher a range table and, for each slice, a plan
//! tree. This crate models only what the dispatcher needs to find every
//! catalog object a statement touches:
//!
//! - [`expr`]: expression trees (function calls, constants, operators)
//! - [`range_table`]: range table entries, subqueries and target lists
//! - [`plan`]: plan nodes with target lists and child subtrees

pub mod expr;
pub mod plan;
pub mod range_table;

pub use expr::{BoolOp, Datum, Expr};
pub use plan::{Plan, PlanNode};
pub use range_table::{Query, RangeTblEntry, TargetEntry};
