//! Persistence context implementations.

pub mod memory;
pub mod postgres;
