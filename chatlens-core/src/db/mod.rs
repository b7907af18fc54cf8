//! Database layer for chatlens
//!
//! This module provides read-only access to the backing chat log:
//! - Physical schema detection (which of the two supported layouts is present)
//! - A reload-capable connection handle with uniform fetch primitives
//!
//! Nothing outside this module sees table names or SQL; schema drift is
//! contained here.

pub mod repo;
pub mod schema;

pub use repo::{ChatLog, RawRow, RowOrder};
pub use schema::{SchemaLayout, UserDirectory};
