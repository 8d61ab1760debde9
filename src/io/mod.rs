//! Input/output helpers.
//!
//! - CSV ingest of `(x, y)` series (`ingest`)
//! - parameter table CSV export (`export`)
//! - fit snapshot JSON read/write (`snapshot`)

pub mod export;
pub mod ingest;
pub mod snapshot;

pub use export::*;
pub use ingest::*;
pub use snapshot::*;
