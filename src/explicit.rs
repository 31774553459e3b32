//! Explicit free list.
//!
//! Free blocks double as list nodes. The first two payload words of a free
//! block hold the heap offsets of its predecessor and successor in the list:
//!
//! ```text
//!                   +-----------------------------------------+
//!                   |                                         v
//!   +--------+------+------+-----+--------+   +--------+------+------+-----+--------+
//!   | header | pred | succ | ... | footer |   | header | pred | succ | ... | footer |
//!   +--------+--|---+------+-----+--------+   +--------+---|--+------+-----+--------+
//!       ^       |                                 ^        |
//!   root        0                                 +--------+
//! ```
//!
//! Offset 0 never names a payload, so it stands for "no block". Insertion is
//! LIFO at the root and the fit search is first fit from the root, which
//! skips allocated blocks entirely.

use crate::{
  block::{self, BlockPtr, MIN_BLOCK_SIZE, WSIZE},
  tracker::FreeTracker,
};

#[derive(Debug, Default)]
pub struct ExplicitList {
  root: Option<BlockPtr>,
}

impl ExplicitList {
  pub fn root(&self) -> Option<BlockPtr> {
    self.root
  }

  fn iter<'a>(
    &self,
    mem: &'a [u8],
  ) -> Iter<'a> {
    Iter {
      mem,
      current: self.root,
    }
  }
}

fn decode(word: u32) -> Option<BlockPtr> {
  (word != 0).then(|| BlockPtr::new(word as usize))
}

fn encode(link: Option<BlockPtr>) -> u32 {
  link.map_or(0, |bp| bp.offset() as u32)
}

fn pred(
  mem: &[u8],
  bp: BlockPtr,
) -> Option<BlockPtr> {
  decode(block::get(mem, bp.offset()))
}

fn succ(
  mem: &[u8],
  bp: BlockPtr,
) -> Option<BlockPtr> {
  decode(block::get(mem, bp.offset() + WSIZE))
}

fn set_pred(
  mem: &mut [u8],
  bp: BlockPtr,
  link: Option<BlockPtr>,
) {
  block::put(mem, bp.offset(), encode(link));
}

fn set_succ(
  mem: &mut [u8],
  bp: BlockPtr,
  link: Option<BlockPtr>,
) {
  block::put(mem, bp.offset() + WSIZE, encode(link));
}

struct Iter<'a> {
  mem: &'a [u8],
  current: Option<BlockPtr>,
}

impl Iterator for Iter<'_> {
  type Item = BlockPtr;

  fn next(&mut self) -> Option<Self::Item> {
    let bp = self.current?;
    self.current = succ(self.mem, bp);
    Some(bp)
  }
}

impl FreeTracker for ExplicitList {
  const SEEDS_FREE_BLOCK: bool = true;

  fn new(_prologue: BlockPtr) -> Self {
    Self::default()
  }

  fn track(
    &mut self,
    mem: &mut [u8],
    bp: BlockPtr,
  ) {
    set_pred(mem, bp, None);
    set_succ(mem, bp, self.root);

    if let Some(root) = self.root {
      set_pred(mem, root, Some(bp));
    }

    self.root = Some(bp);
  }

  fn untrack(
    &mut self,
    mem: &mut [u8],
    bp: BlockPtr,
  ) {
    let next = succ(mem, bp);

    if self.root == Some(bp) {
      self.root = next;
      if let Some(next) = next {
        set_pred(mem, next, None);
      }
      return;
    }

    let prev = pred(mem, bp);
    if let Some(prev) = prev {
      set_succ(mem, prev, next);
    }
    if let Some(next) = next {
      set_pred(mem, next, prev);
    }
  }

  fn find_fit(
    &mut self,
    mem: &[u8],
    asize: usize,
  ) -> Option<BlockPtr> {
    self.iter(mem).find(|bp| bp.size(mem) >= asize)
  }

  fn free_list(
    &self,
    mem: &[u8],
  ) -> Option<Vec<BlockPtr>> {
    // A damaged list may loop. No heap holds more blocks than this.
    let bound = mem.len() / MIN_BLOCK_SIZE + 1;
    Some(self.iter(mem).take(bound).collect())
  }
}
