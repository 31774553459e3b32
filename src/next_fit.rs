//! Implicit free list with a next fit cursor.
//!
//! There is no list: the heap itself, walked through the boundary tags, is
//! the set of blocks to search. A cursor remembers where the last search
//! stopped and the next one resumes there, wrapping around to the start of
//! the heap once it reaches the epilogue.
//!
//! ```text
//!                        cursor
//!                          |
//!   +----------+-----+-----v-----+-----+-----+-----+----------+
//!   | prologue |  A  |     F     |  A  |  F  |  A  | epilogue |
//!   +----------+-----+-----------+-----+-----+-----+----------+
//!                          ----------------------------->  (1)
//!     ------------------->                                 (2)
//! ```
//!
//! Every freshly coalesced block is tracked, and tracking moves the cursor
//! onto it, so the cursor never points into the middle of a merged block.

use crate::{block::BlockPtr, tracker::FreeTracker};

#[derive(Debug)]
pub struct NextFit {
  start: BlockPtr,
  cursor: BlockPtr,
}

impl NextFit {
  pub fn cursor(&self) -> BlockPtr {
    self.cursor
  }

  fn fits(
    mem: &[u8],
    bp: BlockPtr,
    asize: usize,
  ) -> bool {
    let tag = bp.header(mem);
    !tag.allocated && tag.size >= asize
  }
}

impl FreeTracker for NextFit {
  const SEEDS_FREE_BLOCK: bool = false;

  fn new(prologue: BlockPtr) -> Self {
    Self {
      start: prologue,
      cursor: prologue,
    }
  }

  fn track(
    &mut self,
    _mem: &mut [u8],
    bp: BlockPtr,
  ) {
    self.cursor = bp;
  }

  fn untrack(
    &mut self,
    _mem: &mut [u8],
    _bp: BlockPtr,
  ) {
  }

  fn find_fit(
    &mut self,
    mem: &[u8],
    asize: usize,
  ) -> Option<BlockPtr> {
    let mut bp = self.cursor;
    while bp.size(mem) > 0 {
      if Self::fits(mem, bp, asize) {
        self.cursor = bp;
        return Some(bp);
      }
      bp = bp.next(mem);
    }

    bp = self.start;
    while bp != self.cursor {
      if Self::fits(mem, bp, asize) {
        self.cursor = bp;
        return Some(bp);
      }
      bp = bp.next(mem);
    }

    None
  }

  fn free_list(
    &self,
    _mem: &[u8],
  ) -> Option<Vec<BlockPtr>> {
    None
  }
}
