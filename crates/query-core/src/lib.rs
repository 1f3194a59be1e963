//! Core types shared by the query-context dispatching crates
//!
//! - [`error`]: the [`QueryError`] taxonomy raised while collecting or applying catalog state
//! - [`types`]: object identifiers, content ids and the catalog enums
//! - [`oids`]: well-known object ids every node carries locally

pub mod error;
pub mod oids;
pub mod types;

pub use error::{QueryError, Result};
pub use types::*;
