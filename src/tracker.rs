use crate::block::BlockPtr;

/// Keeps track of which blocks are free and answers fit queries.
///
/// The boundary tags are the source of truth about whether a block is free.
/// A tracker only decides how to find one quickly. Trackers never touch the
/// tags themselves: the allocator calls [`FreeTracker::untrack`] before it
/// rewrites a free block's tags and [`FreeTracker::track`] after it has
/// written the final tags of a free block.
pub trait FreeTracker {
  /// Whether the bootstrap heap should carry one minimum free block between
  /// prologue and epilogue, giving the tracker somewhere to keep its links
  /// before the first extension.
  const SEEDS_FREE_BLOCK: bool;

  /// Creates a tracker for a heap whose first block is `prologue`.
  fn new(prologue: BlockPtr) -> Self
  where
    Self: Sized;

  /// Registers a free block whose tags are already written.
  fn track(
    &mut self,
    mem: &mut [u8],
    bp: BlockPtr,
  );

  /// Forgets a free block that is about to be merged or allocated. Must run
  /// before its tags change.
  fn untrack(
    &mut self,
    mem: &mut [u8],
    bp: BlockPtr,
  );

  /// Returns a free block of at least `asize` bytes, if one is tracked.
  fn find_fit(
    &mut self,
    mem: &[u8],
    asize: usize,
  ) -> Option<BlockPtr>;

  /// The blocks held in the tracker's own structure, for heap checking.
  /// `None` when the tracker keeps no structure beyond the tags.
  fn free_list(
    &self,
    mem: &[u8],
  ) -> Option<Vec<BlockPtr>>;
}
