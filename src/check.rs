//! Heap walking and consistency checks.

use std::collections::HashSet;

use crate::{
  block::{self, BlockPtr, DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  error::HeapCorruption,
  heap::Allocator,
  memory::HeapGrow,
  tracker::FreeTracker,
};

/// One block as seen by a heap walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub bp: BlockPtr,
  pub size: usize,
  pub allocated: bool,
}

/// Totals over every block between prologue and epilogue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
}

/// Iterator over the blocks of a heap in address order, prologue and
/// epilogue excluded.
pub struct Blocks<'a> {
  mem: &'a [u8],
  current: BlockPtr,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<Self::Item> {
    let Tag { size, allocated } = self.current.header(self.mem);
    if size == 0 {
      return None;
    }

    let info = BlockInfo {
      bp: self.current,
      size,
      allocated,
    };
    self.current = self.current.next(self.mem);
    Some(info)
  }
}

impl<M: HeapGrow, T: FreeTracker> Allocator<M, T> {
  /// Walks the heap through the boundary tags.
  pub fn blocks(&self) -> Blocks<'_> {
    let mem = self.mem.bytes();
    Blocks {
      mem,
      current: self.prologue.next(mem),
    }
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      heap_size: self.heap_size(),
      ..HeapStats::default()
    };

    for block in self.blocks() {
      if block.allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += block.size;
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
      }
    }

    stats
  }

  /// Verifies every heap invariant:
  ///
  /// - the prologue and epilogue are intact,
  /// - each block is aligned, at least a minimum block, and its header
  ///   matches its footer,
  /// - no two free blocks touch,
  /// - block sizes account for every byte of the heap,
  /// - the tracker holds exactly the free blocks.
  ///
  /// Never panics on a damaged heap.
  pub fn check_heap(&self) -> Result<HeapStats, HeapCorruption> {
    let mem = self.mem.bytes();
    let prologue = self.prologue;

    if prologue.offset() + WSIZE > mem.len()
      || block::get(mem, prologue.hdrp()) != Tag::allocated(DSIZE).pack()
      || block::get(mem, prologue.offset()) != Tag::allocated(DSIZE).pack()
    {
      return Err(HeapCorruption::BadPrologue { at: prologue.offset() });
    }

    let mut stats = HeapStats {
      heap_size: mem.len(),
      ..HeapStats::default()
    };
    let mut free = HashSet::new();
    let mut prev_free: Option<BlockPtr> = None;
    let mut bp = BlockPtr::new(prologue.offset() + DSIZE);

    loop {
      if bp.offset() > mem.len() {
        return Err(HeapCorruption::BadEpilogue { at: bp.offset() });
      }

      let header = block::get(mem, bp.hdrp());
      let Tag { size, allocated } = Tag::unpack(header);

      if size == 0 {
        if !allocated {
          return Err(HeapCorruption::BadEpilogue { at: bp.offset() });
        }
        break;
      }

      if bp.offset() % DSIZE != 0 {
        return Err(HeapCorruption::Misaligned { at: bp.offset() });
      }
      if size < MIN_BLOCK_SIZE {
        return Err(HeapCorruption::Undersized { at: bp.offset(), size });
      }
      if bp.offset() + size > mem.len() {
        return Err(HeapCorruption::Conservation {
          walked: bp.hdrp() + size + WSIZE,
          expected: mem.len(),
        });
      }

      let footer = block::get(mem, bp.offset() + size - DSIZE);
      if header != footer {
        return Err(HeapCorruption::TagMismatch { at: bp.offset(), header, footer });
      }

      if allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += size;
        prev_free = None;
      } else {
        if let Some(prev) = prev_free {
          return Err(HeapCorruption::AdjacentFree { at: prev.offset(), next: bp.offset() });
        }
        stats.free_blocks += 1;
        stats.free_bytes += size;
        free.insert(bp);
        prev_free = Some(bp);
      }

      bp = BlockPtr::new(bp.offset() + size);
    }

    // The epilogue header is the last word of the heap.
    if bp.offset() != mem.len() {
      return Err(HeapCorruption::Conservation {
        walked: bp.offset(),
        expected: mem.len(),
      });
    }

    if let Some(list) = self.tracker.free_list(mem) {
      if let Some(bp) = list.iter().find(|bp| !free.contains(*bp)) {
        return Err(HeapCorruption::ListedNotFree { at: bp.offset() });
      }
      let listed: HashSet<_> = list.iter().collect();
      if list.len() != free.len() || listed.len() != list.len() {
        return Err(HeapCorruption::ListCount {
          listed: list.len(),
          walked: free.len(),
        });
      }
    }

    Ok(stats)
  }
}
