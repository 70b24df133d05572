//! Citation key generation and identifier validation for bibstash
//!
//! This crate provides the identifier logic the reference store builds on:
//! - Citation key generation from author/year/title metadata
//! - Collision-safe uniquification via a bijective base-26 letter suffix
//! - UUID v4 pattern validation

pub mod cite_key;
pub mod suffix;
pub mod validators;

pub use cite_key::*;
pub use suffix::*;
pub use validators::*;
