//! # tagalloc - A Boundary Tag Heap Allocator
//!
//! This crate implements the classic **boundary tag** allocator: one
//! contiguous heap that grows through an `sbrk`-like primitive, carved into
//! variable sized blocks that are split on allocation and coalesced on free.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬──────────┬────────────┬────────────┬──────────┬────────────┬──────────┐
//!   │ pad │ prologue │  block A   │  block F   │ block A  │  block F   │ epilogue │
//!   │     │  8 / 1   │  32 / 1    │  48 / 0    │ 24 / 1   │ 4000 / 0   │  0 / 1   │
//!   └─────┴──────────┴────────────┴────────────┴──────────┴────────────┴──────────┘
//!   ▲                                                                             ▲
//!   │                                                                             │
//!   heap start                                                        heap end (break)
//!
//!   size / allocated bit in every header and footer
//! ```
//!
//! The prologue and epilogue are permanently allocated sentinels, so no block
//! ever needs special treatment for being first or last.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Header/footer encoding and neighbor navigation
//!   ├── memory     - Heap-grow providers (MemLib, Sbrk)
//!   ├── tracker    - FreeTracker trait
//!   ├── explicit   - Explicit doubly linked free list, first fit
//!   ├── next_fit   - Implicit free list, next fit cursor
//!   ├── heap       - Allocator: init, allocate, free, reallocate
//!   ├── check      - Heap walk and consistency checker
//!   └── config     - Allocator tunables
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{ExplicitAllocator, MemLib};
//!
//! let mut heap = ExplicitAllocator::init(MemLib::default()).unwrap();
//!
//! let bp = heap.allocate(100).unwrap().unwrap();
//! heap.payload_mut(bp)[..5].copy_from_slice(b"hello");
//!
//! let bp = heap.reallocate(Some(bp), 200).unwrap().unwrap();
//! assert_eq!(&heap.payload(bp)[..5], b"hello");
//!
//! heap.free(bp);
//! heap.check_heap().unwrap();
//! ```
//!
//! ## How It Works
//!
//! An allocation rounds the request up to a double word multiple plus room
//! for header and footer, asks the free block tracker for a fit and, if
//! nothing fits, grows the heap by at least one chunk:
//!
//! ```text
//!   allocate(n)
//!       │
//!       ▼
//!   round up ──▶ find_fit ──hit──▶ place (split if the rest is ≥ 16 bytes)
//!                    │
//!                   miss
//!                    ▼
//!                 extend ──▶ coalesce with trailing free block ──▶ place
//! ```
//!
//! Freeing marks the block free and coalesces it with free neighbors, so two
//! free blocks are never adjacent.
//!
//! ## Features
//!
//! - **Two fit strategies** behind one [`FreeTracker`] trait: an explicit
//!   LIFO free list ([`ExplicitList`]) and a next fit cursor over all blocks
//!   ([`NextFit`]).
//! - **Offsets, not addresses**: blocks are named by [`BlockPtr`], a payload
//!   offset into the heap bytes, and free list links are stored as offsets.
//!   Every metadata access is bounds checked.
//! - **Pluggable memory**: a bounded `Vec` backed [`MemLib`] or the real
//!   program break through [`Sbrk`].
//! - **Heap checker**: [`Allocator::check_heap`] verifies every invariant.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives.
//! - **Never shrinks**: memory is not given back to the provider.
//! - **Naive reallocation**: always allocates, copies and frees.
//! - **No misuse detection**: double free and foreign pointers corrupt the
//!   heap metadata (debug builds assert against double free).

pub mod align;
pub mod block;
mod check;
mod config;
mod error;
mod explicit;
mod heap;
pub mod memory;
mod next_fit;
mod tracker;

pub use block::BlockPtr;
pub use check::{BlockInfo, Blocks, HeapStats};
pub use config::Config;
pub use error::{AllocError, HeapCorruption, Result};
pub use explicit::ExplicitList;
pub use heap::{Allocator, ExplicitAllocator, NextFitAllocator};
pub use memory::{HeapGrow, MemLib, Sbrk};
pub use next_fit::NextFit;
pub use tracker::FreeTracker;
