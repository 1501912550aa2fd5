use thiserror::Error;

/// Errors reported by [`BvhBuilder`](struct.BvhBuilder.html)
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum BvhError {
    #[error("capacity must be at least one object")]
    ZeroCapacity,
    #[error("capacity {capacity} exceeds the largest addressable tree ({max} objects)")]
    CapacityTooLarge {
        capacity: usize,
        max: usize
    },
    #[error("{count} objects supplied to a tree with capacity {capacity}")]
    CapacityExceeded {
        count: usize,
        capacity: usize
    }
}
