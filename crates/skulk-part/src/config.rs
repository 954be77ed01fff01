//! Block encoder configuration.

/// Maximum number of rows in a single block.
pub const MAX_ROWS_PER_BLOCK: usize = 8 * 1024;

/// Default maximum size of one index block (64 KB).
pub const DEFAULT_INDEX_BLOCK_SIZE: usize = 64 * 1024;

/// Largest allowed index block size (256 MB).
pub const MAX_INDEX_BLOCK_SIZE: usize = 256 * 1024 * 1024;

/// Configuration for block encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Rows per block before a same-series run is split.
    pub max_rows_per_block: usize,
    /// Soft limit on the bytes of block headers grouped into one index block.
    pub index_block_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_rows_per_block: MAX_ROWS_PER_BLOCK,
            index_block_size: DEFAULT_INDEX_BLOCK_SIZE,
        }
    }
}

impl EncoderConfig {
    /// Creates a new encoder configuration with custom settings.
    pub fn new(max_rows_per_block: usize, index_block_size: usize) -> Self {
        Self {
            max_rows_per_block,
            index_block_size,
        }
    }

    /// Sets the row cap per block.
    pub fn with_max_rows_per_block(mut self, rows: usize) -> Self {
        self.max_rows_per_block = rows;
        self
    }

    /// Sets the index block size.
    pub fn with_index_block_size(mut self, bytes: usize) -> Self {
        self.index_block_size = bytes;
        self
    }

    /// Checks the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the row cap is zero or above [`MAX_ROWS_PER_BLOCK`], or if
    /// the index block size is zero or above [`MAX_INDEX_BLOCK_SIZE`].
    pub fn validate(&self) {
        assert!(
            self.max_rows_per_block > 0 && self.max_rows_per_block <= MAX_ROWS_PER_BLOCK,
            "BUG: max_rows_per_block must be in 1..={}, got {}",
            MAX_ROWS_PER_BLOCK,
            self.max_rows_per_block
        );
        assert!(
            self.index_block_size > 0 && self.index_block_size <= MAX_INDEX_BLOCK_SIZE,
            "BUG: index_block_size must be in 1..={}, got {}",
            MAX_INDEX_BLOCK_SIZE,
            self.index_block_size
        );
    }
}
