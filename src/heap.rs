use log::{debug, trace, warn};

use crate::{
  align,
  block::{self, BlockPtr, DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  config::Config,
  error::{AllocError, Result},
  explicit::ExplicitList,
  memory::{HeapGrow, MemLib},
  next_fit::NextFit,
  tracker::FreeTracker,
};

/// Boundary tag allocator over one growable heap.
///
/// `M` supplies the heap bytes, `T` decides how free blocks are found. The
/// allocator is single threaded: it holds no locks and every operation takes
/// `&mut self`, so sharing one between threads needs outside synchronization.
pub struct Allocator<M: HeapGrow = MemLib, T: FreeTracker = ExplicitList> {
  pub(crate) mem: M,
  pub(crate) tracker: T,
  pub(crate) prologue: BlockPtr,
  config: Config,
}

/// First fit over an explicit free list.
pub type ExplicitAllocator<M = MemLib> = Allocator<M, ExplicitList>;

/// Next fit over all blocks.
pub type NextFitAllocator<M = MemLib> = Allocator<M, NextFit>;

impl<M: HeapGrow, T: FreeTracker> Allocator<M, T> {
  /// Lays out the bootstrap heap on `mem` and grows it by one default chunk.
  pub fn init(mem: M) -> Result<Self> {
    Self::with_config(mem, Config::default())
  }

  /// Bootstrap layout, with the seeded free block only when `T` wants one:
  ///
  /// ```text
  ///   +-----+---------+---------+------------------------------+---------+
  ///   | pad | hdr 8/1 | ftr 8/1 | hdr 16/0 pred succ ftr 16/0  | hdr 0/1 |
  ///   +-----+---------+---------+------------------------------+---------+
  ///          \___ prologue ___/   \____ seeded free block ____/  epilogue
  /// ```
  pub fn with_config(
    mut mem: M,
    config: Config,
  ) -> Result<Self> {
    config.validate()?;

    let words = if T::SEEDS_FREE_BLOCK { 8 } else { 4 };
    let start = mem.sbrk(words * WSIZE)?;

    let bytes = mem.bytes_mut();
    block::put(bytes, start, 0);

    let prologue = BlockPtr::new(start + DSIZE);
    prologue.set_tags(bytes, Tag::allocated(DSIZE));

    let mut epilogue = prologue.next(bytes);
    let mut seed = None;
    if T::SEEDS_FREE_BLOCK {
      epilogue.set_tags(bytes, Tag::free(MIN_BLOCK_SIZE));
      seed = Some(epilogue);
      epilogue = epilogue.next(bytes);
    }
    epilogue.set_header(bytes, Tag::allocated(0));

    let mut heap = Self {
      mem,
      tracker: T::new(prologue),
      prologue,
      config,
    };

    if let Some(seed) = seed {
      heap.coalesce(seed);
    }

    heap.extend(config.chunk_size / WSIZE)?;

    debug!(
      "heap initialized: {} bytes, chunk size {}",
      heap.heap_size(),
      config.chunk_size
    );

    Ok(heap)
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn memory(&self) -> &M {
    &self.mem
  }

  pub fn tracker(&self) -> &T {
    &self.tracker
  }

  /// Total bytes acquired from the provider so far.
  pub fn heap_size(&self) -> usize {
    self.mem.heap_size()
  }

  /// Bytes the caller may use in an allocated block. At least what was asked
  /// for, often a little more due to rounding.
  pub fn usable_size(
    &self,
    bp: BlockPtr,
  ) -> usize {
    bp.size(self.mem.bytes()) - DSIZE
  }

  pub fn payload(
    &self,
    bp: BlockPtr,
  ) -> &[u8] {
    let len = self.usable_size(bp);
    &self.mem.bytes()[bp.offset()..bp.offset() + len]
  }

  pub fn payload_mut(
    &mut self,
    bp: BlockPtr,
  ) -> &mut [u8] {
    let len = self.usable_size(bp);
    &mut self.mem.bytes_mut()[bp.offset()..bp.offset() + len]
  }

  /// Allocates a block with room for at least `size` bytes.
  ///
  /// Returns `Ok(None)` for a zero size request without touching the heap.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<BlockPtr>> {
    if size == 0 {
      return Ok(None);
    }

    let bp = self.allocate_block(Self::adjust(size)?)?;
    trace!("allocate({size}) -> {}", bp.offset());
    Ok(Some(bp))
  }

  /// Returns a block to the heap.
  ///
  /// `bp` must come from this allocator and must not have been freed since.
  /// Breaking that rule corrupts the heap metadata. Heap bytes are bounds
  /// checked, so the damage stays inside the heap.
  pub fn free(
    &mut self,
    bp: BlockPtr,
  ) {
    let mem = self.mem.bytes_mut();
    debug_assert!(
      bp.is_allocated(mem),
      "free of unallocated block at {}",
      bp.offset()
    );

    let size = bp.size(mem);
    bp.set_tags(mem, Tag::free(size));
    trace!("free({}) size {size}", bp.offset());

    self.coalesce(bp);
  }

  /// Moves the payload into a block of `size` bytes.
  ///
  /// `None` behaves as [`Allocator::allocate`], a zero size as
  /// [`Allocator::free`]. Otherwise a new block is always allocated, the
  /// first `min(size, old usable size)` bytes are copied over and the old
  /// block is freed. If the new block cannot be allocated the old one is left
  /// as it was.
  ///
  /// `ptr` must come from this allocator and not have been freed since. A
  /// stale or foreign block is not detected: it can corrupt heap metadata, or
  /// panic on an out-of-range heap index, in release builds too.
  pub fn reallocate(
    &mut self,
    ptr: Option<BlockPtr>,
    size: usize,
  ) -> Result<Option<BlockPtr>> {
    let Some(old) = ptr else {
      return self.allocate(size);
    };

    if size == 0 {
      self.free(old);
      return Ok(None);
    }

    let new = self.allocate_block(Self::adjust(size)?)?;

    let copy = self.usable_size(old).min(size);
    self
      .mem
      .bytes_mut()
      .copy_within(old.offset()..old.offset() + copy, new.offset());

    self.free(old);
    trace!("reallocate({}, {size}) -> {}", old.offset(), new.offset());

    Ok(Some(new))
  }

  /// Block size for a `size` byte request: room for header and footer,
  /// rounded to a double word, never below the minimum block.
  fn adjust(size: usize) -> Result<usize> {
    if size <= DSIZE {
      return Ok(MIN_BLOCK_SIZE);
    }
    if size > usize::MAX - 2 * DSIZE {
      return Err(AllocError::OutOfMemory { requested: size });
    }
    Ok(align!(size + DSIZE))
  }

  fn allocate_block(
    &mut self,
    asize: usize,
  ) -> Result<BlockPtr> {
    if let Some(bp) = self.tracker.find_fit(self.mem.bytes(), asize) {
      self.place(bp, asize);
      return Ok(bp);
    }

    let bp = self.extend(asize.max(self.config.chunk_size) / WSIZE)?;
    self.place(bp, asize);
    Ok(bp)
  }

  /// Grows the heap by `words` (rounded up to an even count) and returns the
  /// free block covering the new space, merged with a free block that may
  /// have ended the heap before.
  fn extend(
    &mut self,
    words: usize,
  ) -> Result<BlockPtr> {
    let words = words + words % 2;
    let size = words
      .checked_mul(WSIZE)
      .ok_or(AllocError::OutOfMemory { requested: usize::MAX })?;

    // Tags and free list links are 32-bit words.
    let end = self.mem.heap_size().checked_add(size);
    if end.is_none_or(|end| end > u32::MAX as usize) {
      warn!("heap cannot grow by {size} bytes past the 32-bit tag range");
      return Err(AllocError::OutOfMemory { requested: size });
    }

    // The old epilogue header becomes the new block's header.
    let bp = BlockPtr::new(self.mem.sbrk(size)?);

    let mem = self.mem.bytes_mut();
    bp.set_tags(mem, Tag::free(size));
    bp.next(mem).set_header(mem, Tag::allocated(0));

    debug!("heap extended by {size} bytes to {}", mem.len());

    Ok(self.coalesce(bp))
  }

  /// Merges the free block `bp` with free neighbors and tracks the result.
  ///
  /// ```text
  ///   prev   bp   next           result
  ///   [A]    [F]  [A]   ->   [A] [  F  ] [A]              bp
  ///   [A]    [F]  [F]   ->   [A] [  F       F  ]          bp
  ///   [F]    [F]  [A]   ->   [  F       F  ] [A]          prev
  ///   [F]    [F]  [F]   ->   [  F       F       F  ]      prev
  /// ```
  ///
  /// Neighbors leave the tracker before any tag is rewritten, since the
  /// explicit list reads links out of their payloads.
  pub(crate) fn coalesce(
    &mut self,
    bp: BlockPtr,
  ) -> BlockPtr {
    let mem = self.mem.bytes_mut();

    let prev = bp.prev(mem);
    let next = bp.next(mem);
    let prev_alloc = prev.footer(mem).allocated;
    let next_alloc = next.is_allocated(mem);
    let mut size = bp.size(mem);

    let merged = match (prev_alloc, next_alloc) {
      (true, true) => bp,
      (true, false) => {
        self.tracker.untrack(mem, next);
        size += next.size(mem);
        bp.set_tags(mem, Tag::free(size));
        bp
      }
      (false, true) => {
        self.tracker.untrack(mem, prev);
        size += prev.size(mem);
        prev.set_tags(mem, Tag::free(size));
        prev
      }
      (false, false) => {
        self.tracker.untrack(mem, prev);
        self.tracker.untrack(mem, next);
        size += prev.size(mem) + next.size(mem);
        prev.set_tags(mem, Tag::free(size));
        prev
      }
    };

    trace!(
      "coalesce({}) prev_alloc={prev_alloc} next_alloc={next_alloc} -> {} size {size}",
      bp.offset(),
      merged.offset()
    );

    self.tracker.track(mem, merged);
    merged
  }

  /// Allocates `asize` bytes at the start of free block `bp`, splitting off
  /// the rest as a new free block when it can hold a minimum block.
  fn place(
    &mut self,
    bp: BlockPtr,
    asize: usize,
  ) {
    let mem = self.mem.bytes_mut();
    self.tracker.untrack(mem, bp);

    let csize = bp.size(mem);
    if csize - asize >= MIN_BLOCK_SIZE {
      bp.set_tags(mem, Tag::allocated(asize));
      let rest = bp.next(mem);
      rest.set_tags(mem, Tag::free(csize - asize));
      self.coalesce(rest);
    } else {
      bp.set_tags(mem, Tag::allocated(csize));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn explicit() -> ExplicitAllocator {
    ExplicitAllocator::init(MemLib::default()).unwrap()
  }

  #[test]
  fn test_adjust() {
    type A = ExplicitAllocator;
    assert_eq!(A::adjust(1), Ok(16));
    assert_eq!(A::adjust(8), Ok(16));
    assert_eq!(A::adjust(9), Ok(24));
    assert_eq!(A::adjust(16), Ok(24));
    assert_eq!(A::adjust(17), Ok(32));
    assert_eq!(A::adjust(100), Ok(112));
    assert!(matches!(A::adjust(usize::MAX), Err(AllocError::OutOfMemory { .. })));
  }

  #[test]
  fn test_init_layouts() {
    let heap = explicit();
    // 8 bootstrap words plus one chunk, seeded block absorbed.
    assert_eq!(heap.heap_size(), 32 + 4096);
    let first = heap.prologue.next(heap.mem.bytes());
    assert_eq!(first.offset(), 16);
    assert_eq!(heap.tracker().root(), Some(first));
    assert_eq!(first.size(heap.mem.bytes()), 16 + 4096);

    let heap = NextFitAllocator::init(MemLib::default()).unwrap();
    assert_eq!(heap.heap_size(), 16 + 4096);
    let first = heap.prologue.next(heap.mem.bytes());
    assert_eq!(first.size(heap.mem.bytes()), 4096);
    assert_eq!(heap.tracker().cursor(), first);
  }

  #[test]
  fn test_init_fails_without_memory() {
    let res = ExplicitAllocator::init(MemLib::new(1024));
    assert!(matches!(res, Err(AllocError::OutOfMemory { requested: 4096 })));

    let res = NextFitAllocator::init(MemLib::new(8));
    assert!(matches!(res, Err(AllocError::OutOfMemory { requested: 16 })));
  }

  #[test]
  fn test_init_rejects_bad_config() {
    let config = Config::default().with_chunk_size(12);
    let res = ExplicitAllocator::with_config(MemLib::default(), config);
    assert!(matches!(res, Err(AllocError::InvalidConfig(_))));
  }

  #[test]
  fn test_place_splits_only_useful_leftovers() {
    let mut heap = explicit();
    let total = heap.tracker().root().map(|bp| bp.size(heap.mem.bytes())).unwrap();

    // Leaves exactly 8 bytes: not worth a block, so the whole block is used.
    let bp = heap.allocate(total - 16).unwrap().unwrap();
    assert_eq!(bp.size(heap.mem.bytes()), total);
    assert_eq!(heap.tracker().root(), None);
  }

  #[test]
  fn test_extend_merges_with_trailing_free_block() {
    let mut heap = explicit();
    let size_before = heap.heap_size();

    let big = heap.allocate(8000).unwrap().unwrap();
    // The trailing free block of the first chunk was absorbed.
    assert_eq!(big.offset(), 16);
    assert_eq!(heap.heap_size(), size_before + align!(8000 + DSIZE));
    // What is left of the merged block follows the allocation.
    let rest = big.next(heap.mem.bytes());
    assert_eq!(heap.tracker().root(), Some(rest));
    assert_eq!(rest.size(heap.mem.bytes()), 16 + 4096);
  }

  #[test]
  fn test_allocate_reports_out_of_memory() {
    let mut heap = ExplicitAllocator::init(MemLib::new(8192)).unwrap();
    let before = heap.heap_size();

    let res = heap.allocate(10_000);
    assert!(matches!(res, Err(AllocError::OutOfMemory { .. })));
    assert_eq!(heap.heap_size(), before);

    // Still usable afterwards.
    assert!(heap.allocate(100).unwrap().is_some());
  }

  #[test]
  fn test_payload_is_writable() {
    let mut heap = explicit();
    let bp = heap.allocate(10).unwrap().unwrap();
    assert_eq!(heap.usable_size(bp), 16);

    heap.payload_mut(bp).copy_from_slice(&[7; 16]);
    assert_eq!(heap.payload(bp), &[7u8; 16]);
  }
}
