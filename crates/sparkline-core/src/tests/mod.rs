//! Host-level tests.
//!
//! - `integration.rs`: tick dispatch, conditions, filters, events and fault
//!   containment through a real plugin directory
//! - `lifecycle.rs`: load, reload, enable/disable, background tasks and
//!   shutdown ordering
//! - `helpers.rs`: scratch directories, the recording plugin and snapshots

mod helpers;

pub use helpers::*;
