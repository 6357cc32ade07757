//! # Adapters
//!
//! Concrete implementations of the `ports` traits.

pub mod memory_backend;

pub use memory_backend::*;
