//! Race-free session allocation.

pub mod allocator;
pub mod outcome;

pub use allocator::Allocator;
pub use outcome::AllocationOutcome;
