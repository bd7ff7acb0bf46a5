// # Store Implementations
//
// This module provides implementations of the store traits that run
// without a console backend.

pub mod memory;

pub use memory::MemoryStore;
