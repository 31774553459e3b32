//! Heap-grow providers.
//!
//! The allocator never asks for memory in any other way than "make the heap
//! `n` bytes longer and tell me where it used to end". Whatever stands behind
//! that call implements [`HeapGrow`]. Two providers ship with the crate:
//!
//! ```text
//!   MemLib                               Sbrk
//!   ┌──────────────────────────┐         ┌──────────────────────────────┐
//!   │ Vec<u8> with a hard cap  │         │ the process data segment,    │
//!   │ (20 MiB by default)      │         │ grown with sbrk(2)           │
//!   └──────────────────────────┘         └──────────────────────────────┘
//! ```

use std::{ptr, slice};

use libc::{c_void, intptr_t, sbrk};
use log::warn;

use crate::{
  align_to,
  block::DSIZE,
  error::{AllocError, Result},
};

/// Default cap for [`MemLib`].
pub const MAX_HEAP: usize = 20 * (1 << 20);

/// A monotonic source of heap bytes.
pub trait HeapGrow {
  /// Grows the heap by `incr` bytes and returns the previous heap size, which
  /// is also the offset where the new bytes start. The heap never shrinks.
  fn sbrk(
    &mut self,
    incr: usize,
  ) -> Result<usize>;

  /// All bytes acquired so far.
  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];

  fn heap_size(&self) -> usize {
    self.bytes().len()
  }
}

/// Simulated heap backed by a `Vec<u8>` that refuses to grow past `max`
/// bytes. Bytes are only reserved as the heap grows, so `max` may be far
/// larger than the machine can back.
pub struct MemLib {
  heap: Vec<u8>,
  max: usize,
}

impl MemLib {
  pub fn new(max: usize) -> Self {
    Self {
      heap: Vec::new(),
      max,
    }
  }

  pub fn max(&self) -> usize {
    self.max
  }
}

impl Default for MemLib {
  fn default() -> Self {
    Self::new(MAX_HEAP)
  }
}

impl HeapGrow for MemLib {
  fn sbrk(
    &mut self,
    incr: usize,
  ) -> Result<usize> {
    let old = self.heap.len();

    if incr > self.max - old {
      warn!("memlib exhausted: {old} of {} bytes in use, asked for {incr} more", self.max);
      return Err(AllocError::OutOfMemory { requested: incr });
    }

    if let Err(err) = self.heap.try_reserve(incr) {
      warn!("memlib could not reserve {incr} more bytes: {err}");
      return Err(AllocError::OutOfMemory { requested: incr });
    }

    self.heap.resize(old + incr, 0);
    Ok(old)
  }

  fn bytes(&self) -> &[u8] {
    &self.heap
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    &mut self.heap
  }
}

/// The real program break.
///
/// The first call aligns the break to [`DSIZE`] and remembers it as the heap
/// base. Every later call must find the break exactly where the previous one
/// left it: if anything else in the process moved it in between, the heap
/// would no longer be contiguous and the request fails as out of memory.
///
/// Only one `Sbrk` per process makes sense, and the process must not have
/// other code calling `brk`/`sbrk` concurrently.
pub struct Sbrk {
  base: *mut u8,
  len: usize,
}

impl Sbrk {
  pub fn new() -> Self {
    Self {
      base: ptr::null_mut(),
      len: 0,
    }
  }

  /// Current program break, as reported by `sbrk(0)`.
  pub fn program_break() -> *const u8 {
    unsafe { sbrk(0) as *const u8 }
  }

  /// Address of the first heap byte, null before the first grow.
  pub fn base(&self) -> *const u8 {
    self.base
  }

  fn failed(ret: *mut c_void) -> bool {
    ret as usize == usize::MAX
  }
}

impl Default for Sbrk {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapGrow for Sbrk {
  fn sbrk(
    &mut self,
    incr: usize,
  ) -> Result<usize> {
    let oom = AllocError::OutOfMemory { requested: incr };
    let step = intptr_t::try_from(incr).map_err(|_| oom.clone())?;

    unsafe {
      if self.base.is_null() {
        let brk = sbrk(0);
        if Self::failed(brk) {
          return Err(oom);
        }

        let brk = brk as usize;
        let pad = align_to!(brk, DSIZE) - brk;
        if pad > 0 && Self::failed(sbrk(pad as intptr_t)) {
          return Err(oom);
        }

        self.base = (brk + pad) as *mut u8;
      }

      let old = sbrk(step);
      if Self::failed(old) {
        warn!("sbrk({incr}) failed");
        return Err(oom);
      }

      if old as *mut u8 != self.base.add(self.len) {
        warn!("program break moved behind the allocator's back, heap is no longer contiguous");
        return Err(oom);
      }
    }

    let old = self.len;
    self.len += incr;
    Ok(old)
  }

  fn bytes(&self) -> &[u8] {
    if self.base.is_null() {
      return &[];
    }
    // SAFETY: `base..base + len` was handed to us by sbrk, is never returned
    // and nothing else in the process writes to it.
    unsafe { slice::from_raw_parts(self.base, self.len) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    if self.base.is_null() {
      return &mut [];
    }
    // SAFETY: see `bytes`. `&mut self` makes this the only live view.
    unsafe { slice::from_raw_parts_mut(self.base, self.len) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memlib_returns_previous_break() {
    let mut mem = MemLib::new(64);

    assert_eq!(mem.sbrk(16), Ok(0));
    assert_eq!(mem.sbrk(32), Ok(16));
    assert_eq!(mem.heap_size(), 48);
    assert!(mem.bytes().iter().all(|&b| b == 0));
  }

  #[test]
  fn test_memlib_exhaustion_leaves_heap_untouched() {
    let mut mem = MemLib::new(64);

    mem.sbrk(48).unwrap();
    assert_eq!(mem.sbrk(17), Err(AllocError::OutOfMemory { requested: 17 }));
    assert_eq!(mem.heap_size(), 48);
    assert_eq!(mem.sbrk(16), Ok(48));
    assert_eq!(mem.heap_size(), mem.max());
  }

  #[test]
  fn test_memlib_huge_cap_reserves_lazily() {
    let mut mem = MemLib::new(usize::MAX);
    assert_eq!(mem.sbrk(32), Ok(0));

    // Past isize::MAX bytes no Vec can hold it: an error, not an abort.
    assert_eq!(
      mem.sbrk(usize::MAX / 2 + 1),
      Err(AllocError::OutOfMemory { requested: usize::MAX / 2 + 1 })
    );
    assert_eq!(mem.heap_size(), 32);
    assert_eq!(mem.sbrk(16), Ok(32));
  }
}
