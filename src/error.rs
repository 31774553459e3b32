use thiserror::Error;

/// Failures reported by the allocator.
///
/// Out of memory is the only failure a well-formed caller can observe once
/// the heap is running. `InvalidConfig` only comes from construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
  /// The heap-grow provider could not extend the heap by `requested` bytes,
  /// or the heap would outgrow what a 32-bit boundary tag can describe.
  #[error("out of memory: heap cannot grow by {requested} bytes")]
  OutOfMemory { requested: usize },

  #[error("invalid allocator configuration: {0}")]
  InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AllocError>;

/// An invariant violation found by [`crate::Allocator::check_heap`]. Each
/// variant names the payload offset of the offending block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapCorruption {
  #[error("prologue block at {at} is damaged")]
  BadPrologue { at: usize },

  #[error("epilogue header at {at} is damaged")]
  BadEpilogue { at: usize },

  #[error("block at {at} is not aligned to a double word")]
  Misaligned { at: usize },

  #[error("block at {at} has size {size}, below the minimum block")]
  Undersized { at: usize, size: usize },

  #[error("block at {at}: header says {header:#x}, footer says {footer:#x}")]
  TagMismatch { at: usize, header: u32, footer: u32 },

  #[error("free blocks at {at} and {next} are adjacent")]
  AdjacentFree { at: usize, next: usize },

  #[error("block sizes add up to {walked} bytes, heap holds {expected}")]
  Conservation { walked: usize, expected: usize },

  #[error("free list entry at {at} is not a free block")]
  ListedNotFree { at: usize },

  #[error("free list holds {listed} blocks, heap walk found {walked}")]
  ListCount { listed: usize, walked: usize },
}
