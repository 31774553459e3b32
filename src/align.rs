/// Rounds `value` up to the next multiple of `align`, which must be a power of
/// two.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(1, 4096), 4096);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Rounds `value` up to the double word boundary every block size and payload
/// address in the heap respects.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(24), 24);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::block::DSIZE)
  };
}

#[cfg(test)]
mod tests {
  use crate::block::DSIZE;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DSIZE * i + 1)..=(DSIZE * (i + 1));

      let expected_alignment = DSIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to_page() {
    assert_eq!(align_to!(0usize, 4096), 0);
    assert_eq!(align_to!(4095usize, 4096), 4096);
    assert_eq!(align_to!(4097usize, 4096), 8192);
  }
}
