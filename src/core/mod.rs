//! Core record types
//!
//! Catalog records are a single tagged struct: the [`MaterialType`]
//! discriminant plus a flat set of optional subtype fields.

pub mod material;

pub use material::{Material, MaterialDetails, MaterialType};
