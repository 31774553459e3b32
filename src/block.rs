//! Boundary tags.
//!
//! Every block starts with a one word header and ends with a one word footer,
//! both holding the same packed `(size, allocated)` pair:
//!
//! ```text
//!        31                         3  2  1  0
//!       +----------------------------+--+--+--+
//!       |        block size          | 0| 0| a|   a = 1: allocated
//!       +----------------------------+--+--+--+
//!
//!   hdrp(bp)   bp                                  ftrp(bp)   next(bp)
//!     |        |                                     |          |
//!     v        v                                     v          v
//!   +--------+-------------------------------------+--------+--------+---
//!   | header |               payload               | footer | header |
//!   +--------+-------------------------------------+--------+--------+---
//!   |<------------------------ size ------------------------>|
//! ```
//!
//! Block sizes are always multiples of [`DSIZE`], which leaves the low three
//! bits of a tag for flags. Only bit 0 is used.
//!
//! Raw word access stays inside the crate. Outside code sees blocks through
//! [`BlockPtr`] and the heap walk and cannot rewrite tags:
//!
//! ```compile_fail
//! let mut heap = [0u8; 8];
//! tagalloc::block::put(&mut heap, 0, 1);
//! ```

/// Word size in bytes. Headers, footers and free list links are one word.
pub const WSIZE: usize = 4;

/// Double word size in bytes, the alignment of every block and payload.
pub const DSIZE: usize = 8;

/// Default amount of bytes the heap grows by when no free block fits.
pub const CHUNKSIZE: usize = 1 << 12;

/// Header + footer + two words of payload. Two words are exactly what a free
/// block needs to hold its predecessor and successor links.
pub const MIN_BLOCK_SIZE: usize = 2 * DSIZE;

const ALLOC_MASK: u32 = 0x1;
const SIZE_MASK: u32 = !0x7;

/// Decoded contents of a header or footer word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
}

impl Tag {
  pub const fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  pub const fn free(size: usize) -> Self {
    Self::new(size, false)
  }

  pub const fn allocated(size: usize) -> Self {
    Self::new(size, true)
  }

  /// Packs size and allocation bit into one word.
  pub const fn pack(self) -> u32 {
    (self.size as u32 & SIZE_MASK) | self.allocated as u32
  }

  pub const fn unpack(word: u32) -> Self {
    Self {
      size: (word & SIZE_MASK) as usize,
      allocated: word & ALLOC_MASK != 0,
    }
  }
}

/// Reads the word at byte offset `at`.
#[inline]
pub(crate) fn get(
  mem: &[u8],
  at: usize,
) -> u32 {
  let mut word = [0; WSIZE];
  word.copy_from_slice(&mem[at..at + WSIZE]);
  u32::from_ne_bytes(word)
}

/// Writes `value` to the word at byte offset `at`.
#[inline]
pub(crate) fn put(
  mem: &mut [u8],
  at: usize,
  value: u32,
) {
  mem[at..at + WSIZE].copy_from_slice(&value.to_ne_bytes());
}

/// Payload offset of a block, relative to the start of the heap.
///
/// Offsets instead of addresses keep every header, footer and neighbor
/// computation a bounds-checked index into the heap bytes. A payload offset
/// is never zero because the heap starts with a padding word and the
/// prologue, so zero doubles as the "no block" value inside free list links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPtr(usize);

impl BlockPtr {
  pub(crate) const fn new(offset: usize) -> Self {
    Self(offset)
  }

  /// Byte offset of the payload from the start of the heap.
  pub const fn offset(self) -> usize {
    self.0
  }

  /// Offset of the header word.
  #[inline]
  pub(crate) const fn hdrp(self) -> usize {
    self.0 - WSIZE
  }

  /// Offset of the footer word, located through the header's size.
  #[inline]
  pub(crate) fn ftrp(
    self,
    mem: &[u8],
  ) -> usize {
    self.0 + self.size(mem) - DSIZE
  }

  #[inline]
  pub(crate) fn header(
    self,
    mem: &[u8],
  ) -> Tag {
    Tag::unpack(get(mem, self.hdrp()))
  }

  #[inline]
  pub(crate) fn footer(
    self,
    mem: &[u8],
  ) -> Tag {
    Tag::unpack(get(mem, self.ftrp(mem)))
  }

  #[inline]
  pub(crate) fn size(
    self,
    mem: &[u8],
  ) -> usize {
    self.header(mem).size
  }

  #[inline]
  pub(crate) fn is_allocated(
    self,
    mem: &[u8],
  ) -> bool {
    self.header(mem).allocated
  }

  /// The block that starts right after this one.
  #[inline]
  pub(crate) fn next(
    self,
    mem: &[u8],
  ) -> Self {
    Self(self.0 + self.size(mem))
  }

  /// The block that ends right before this one, found through its footer.
  #[inline]
  pub(crate) fn prev(
    self,
    mem: &[u8],
  ) -> Self {
    Self(self.0 - Tag::unpack(get(mem, self.0 - DSIZE)).size)
  }

  #[inline]
  pub(crate) fn set_header(
    self,
    mem: &mut [u8],
    tag: Tag,
  ) {
    put(mem, self.hdrp(), tag.pack());
  }

  /// Writes `tag` to the header and then to the footer that the new size
  /// puts in place.
  #[inline]
  pub(crate) fn set_tags(
    self,
    mem: &mut [u8],
    tag: Tag,
  ) {
    self.set_header(mem, tag);
    let footer = self.ftrp(mem);
    put(mem, footer, tag.pack());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pack_unpack() {
    assert_eq!(Tag::allocated(24).pack(), 25);
    assert_eq!(Tag::free(4096).pack(), 4096);
    assert_eq!(Tag::unpack(0x19), Tag::allocated(24));
    assert_eq!(Tag::unpack(0), Tag::free(0));
    // The epilogue: zero size, allocated.
    assert_eq!(Tag::unpack(1), Tag::allocated(0));
  }

  #[test]
  fn test_flag_bits_do_not_leak_into_size() {
    assert_eq!(Tag::unpack(0x17).size, 0x10);
    assert!(Tag::unpack(0x17).allocated);
    assert!(!Tag::unpack(0x16).allocated);
  }

  #[test]
  fn test_navigation() {
    // pad | A: 16 bytes allocated | B: 24 bytes free | epilogue
    let mut mem = vec![0u8; 48];
    let a = BlockPtr::new(8);
    a.set_tags(&mut mem, Tag::allocated(16));
    let b = a.next(&mem);
    b.set_tags(&mut mem, Tag::free(24));
    b.next(&mem).set_header(&mut mem, Tag::allocated(0));

    assert_eq!(b.offset(), 24);
    assert_eq!(a.hdrp(), 4);
    assert_eq!(a.ftrp(&mem), 16);
    assert_eq!(b.ftrp(&mem), 40);
    assert_eq!(b.prev(&mem), a);
    assert_eq!(b.header(&mem), b.footer(&mem));
    assert!(!b.is_allocated(&mem));
    assert_eq!(b.next(&mem).header(&mem), Tag::allocated(0));
  }

  #[test]
  #[should_panic]
  fn test_out_of_range_access_panics() {
    let mem = vec![0u8; 8];
    get(&mem, 6);
  }
}
