//! Concrete identity providers.
//!
//! Each module exposes a `Provider` struct implementing [`crate::oauth::Provider`]
//! and the configuration it is built from.

pub mod custom;
pub mod google;
