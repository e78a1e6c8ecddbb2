//! Command implementations.

pub mod add_part;
pub mod claims;
pub mod vehicles;
