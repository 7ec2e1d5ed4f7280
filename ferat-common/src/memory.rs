//! General purpose data structures
//!
//! These are simply `std::vec::Vec` wrappers tuned for a specific purpose,
//! so they are harder to misuse, or more efficient.
//!
//! - The per-formula indexes are direct-addressed by variable, so a plain
//!   growable vector doubles as a map from dense 32-bit identifiers.
//!
//! - Bounds checking can be disabled for all accesses through `Vector`.

#[macro_use]
mod vector;

pub use crate::memory::vector::{assert_in_bounds, Vector};

/// Trait for types that can be used as an array index.
pub trait Offset {
    fn as_offset(&self) -> usize;
}

impl Offset for usize {
    fn as_offset(&self) -> usize {
        *self
    }
}

/// A trait for objects that can report their memory usage on the heap
pub trait HeapSpace {
    /// The number of bytes allocated on the heap that this owns.
    fn heap_space(&self) -> usize;
}

impl<T: Copy> HeapSpace for T {
    fn heap_space(&self) -> usize {
        0
    }
}

/// Convert bytes to  megabytes for readability.
pub fn format_memory_usage(bytes: usize) -> String {
    format!("{:12}", bytes >> 20) // MB
}
