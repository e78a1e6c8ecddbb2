//! # Fleetstore Testkit
//!
//! Test utilities for fleetstore.
//!
//! This crate provides:
//! - The warranty domain model (customers, vehicles, parts, service
//!   histories, warranty claims) with metadata and include directives
//! - Seeded test stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleetstore_testkit::prelude::*;
//!
//! #[test]
//! fn lists_vehicles() {
//!     let store = TestStore::seeded();
//!     let ctx = store.context();
//!     let vehicles = ctx.repository::<Vehicle>().unwrap();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
