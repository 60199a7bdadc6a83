//! Page and bucket geometry shared by every codec.
//!
//! Page size is an explicit value threaded through dump and load calls; there
//! is no process-wide configuration. Two parts dumped with different page
//! sizes cannot read each other's files.

use crate::error::{PartError, Result};

/// Default size of one file page in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 8192;

/// Default size of one string bucket in bytes.
pub const DEFAULT_BUCKET_SIZE: usize = 2048;

/// Smallest page size the codecs accept; every metadata page must fit.
pub const MIN_PAGE_SIZE: usize = 64;

/// Geometry options for dumping and loading part files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartConfig {
    /// Fixed size of one file page in bytes.
    pub page_size: usize,
    /// Fixed size of one string bucket in bytes. Must not exceed the page
    /// size; buckets are packed whole into pages.
    pub bucket_size: usize,
}

impl Default for PartConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }
}

impl PartConfig {
    /// Overrides the page size.
    pub fn page_size(mut self, bytes: usize) -> Self {
        self.page_size = bytes;
        self
    }

    /// Overrides the string bucket size.
    pub fn bucket_size(mut self, bytes: usize) -> Self {
        self.bucket_size = bytes;
        self
    }

    /// Rejects geometries the codecs cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(PartError::Invalid(format!(
                "page size {} below minimum {MIN_PAGE_SIZE}",
                self.page_size
            )));
        }
        if self.bucket_size == 0 || self.bucket_size > self.page_size {
            return Err(PartError::Invalid(format!(
                "bucket size {} must be in 1..={}",
                self.bucket_size, self.page_size
            )));
        }
        Ok(())
    }
}
