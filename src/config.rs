use crate::{
  block::{CHUNKSIZE, DSIZE, MIN_BLOCK_SIZE},
  error::{AllocError, Result},
};

/// Tunables of an [`crate::Allocator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
  /// Minimum number of bytes the heap grows by when no free block fits.
  pub chunk_size: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      chunk_size: CHUNKSIZE,
    }
  }
}

impl Config {
  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.chunk_size < MIN_BLOCK_SIZE || self.chunk_size % DSIZE != 0 {
      return Err(AllocError::InvalidConfig(format!(
        "chunk size {} must be a multiple of {DSIZE} and at least {MIN_BLOCK_SIZE}",
        self.chunk_size
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_valid() {
    assert_eq!(Config::default().chunk_size, 4096);
    assert!(Config::default().validate().is_ok());
  }

  #[test]
  fn test_rejects_bad_chunk_sizes() {
    for chunk_size in [0, 8, 20, 4097] {
      let config = Config::default().with_chunk_size(chunk_size);
      assert!(matches!(config.validate(), Err(AllocError::InvalidConfig(_))));
    }
    assert!(Config::default().with_chunk_size(16).validate().is_ok());
  }
}
