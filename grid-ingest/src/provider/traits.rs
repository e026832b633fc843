//! Fetcher trait definitions
//!
//! A fetcher turns a [`DocumentRequest`] into the raw bytes of one upstream
//! document. Parsing is not its concern; the bytes are handed unchanged to
//! the matching [`SourceVariant`](crate::parser::SourceVariant).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use grid_common::error::{ErrorCategory, ErrorClassification, NetworkError};

use crate::parser::SourceVariant;
use crate::reference::AreaReference;

/// Fetch error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchError {
    /// Timeouts, connection failures, 429 and 5xx answers
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// Other 4xx answers, SOAP faults, requests that cannot be built
    #[error("Permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        FetchError::Transient(reason.into())
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        FetchError::Permanent(reason.into())
    }
}

impl From<NetworkError> for FetchError {
    fn from(err: NetworkError) -> Self {
        if err.is_transient() {
            FetchError::Transient(err.to_string())
        } else {
            FetchError::Permanent(err.to_string())
        }
    }
}

impl ErrorClassification for FetchError {
    fn category(&self) -> ErrorCategory {
        match self {
            FetchError::Transient(_) => ErrorCategory::Transient,
            FetchError::Permanent(_) => ErrorCategory::Permanent,
        }
    }

    fn suggested_retry_delay(&self) -> Option<std::time::Duration> {
        match self {
            FetchError::Transient(_) => Some(std::time::Duration::from_secs(1)),
            FetchError::Permanent(_) => None,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// One document to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequest {
    /// Source variant the document will be parsed with
    pub source: SourceVariant,
    /// Area the document is about
    pub area: AreaReference,
    /// Other side of a border, for physical flows
    pub counterpart: Option<AreaReference>,
    /// Start time (inclusive)
    pub start: DateTime<Utc>,
    /// End time (exclusive)
    pub end: DateTime<Utc>,
    /// Trade date, for providers that publish one document per day
    pub trade_date: Option<NaiveDate>,
}

impl DocumentRequest {
    pub fn new(
        source: SourceVariant,
        area: AreaReference,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            area,
            counterpart: None,
            start,
            end,
            trade_date: None,
        }
    }

    pub fn with_counterpart(mut self, counterpart: AreaReference) -> Self {
        self.counterpart = Some(counterpart);
        self
    }

    pub fn for_trade_date(mut self, trade_date: NaiveDate) -> Self {
        self.trade_date = Some(trade_date);
        self
    }
}

impl fmt::Display for DocumentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.area.label)?;
        if let Some(counterpart) = &self.counterpart {
            write!(f, "<->{}", counterpart.label)?;
        }
        match self.trade_date {
            Some(date) => write!(f, " {}", date),
            None => write!(
                f,
                " [{}, {})",
                self.start.format("%Y-%m-%dT%H:%MZ"),
                self.end.format("%Y-%m-%dT%H:%MZ")
            ),
        }
    }
}

/// Raw document as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedDocument {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            fetched_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Source of raw provider documents
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch one document. Transient failures have already been retried.
    async fn request(&self, request: &DocumentRequest) -> FetchResult<FetchedDocument>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn request(&self, request: &DocumentRequest) -> FetchResult<FetchedDocument> {
        (**self).request(request).await
    }
}
