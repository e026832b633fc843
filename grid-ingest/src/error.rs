//! Chunk pipeline errors

use std::time::Duration;
use thiserror::Error;

use grid_common::error::{ErrorCategory, ErrorClassification};

use crate::calendar::CalendarError;
use crate::parser::ParseError;
use crate::provider::FetchError;
use crate::storage::StoreError;

/// Anything that can stop a chunk
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Chunk timed out after {0:?}")]
    ChunkTimeout(Duration),
}

impl IngestError {
    /// Configuration defects end the run instead of the chunk
    pub fn is_fatal(&self) -> bool {
        self.is_configuration()
    }
}

impl ErrorClassification for IngestError {
    fn category(&self) -> ErrorCategory {
        match self {
            IngestError::Calendar(e) => e.category(),
            IngestError::Parse(e) => e.category(),
            IngestError::Fetch(e) => e.category(),
            IngestError::Store(e) => e.category(),
            IngestError::ChunkTimeout(_) => ErrorCategory::Transient,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
