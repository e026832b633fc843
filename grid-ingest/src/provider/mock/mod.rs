//! Mock fetcher for testing
//!
//! Serves scripted documents and injects failures by request number or by
//! the time window a request covers. Every request is recorded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::parser::SourceVariant;
use crate::provider::{DocumentRequest, FetchError, FetchResult, FetchedDocument, Fetcher};

type Responder = Box<dyn Fn(&DocumentRequest) -> FetchResult<Vec<u8>> + Send + Sync>;

enum Trigger {
    /// 1-based position in the request sequence
    Nth(usize),
    /// Any request whose window contains the instant
    Covering(DateTime<Utc>),
}

struct Failure {
    trigger: Trigger,
    error: FetchError,
}

/// Mock fetcher for testing
pub struct MockFetcher {
    documents: HashMap<SourceVariant, Vec<u8>>,
    responder: Option<Responder>,
    failures: Vec<Failure>,
    delay: Option<Duration>,
    log: Mutex<Vec<DocumentRequest>>,
}

impl MockFetcher {
    /// Create a fetcher with nothing scripted
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            responder: None,
            failures: Vec::new(),
            delay: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Serve the same body for every request of `source`
    pub fn with_document(mut self, source: SourceVariant, body: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(source, body.into());
        self
    }

    /// Build bodies from the request, for sources without a fixed document
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&DocumentRequest) -> FetchResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Fail the `n`th request (1-based)
    pub fn fail_nth(mut self, n: usize, error: FetchError) -> Self {
        self.failures.push(Failure {
            trigger: Trigger::Nth(n),
            error,
        });
        self
    }

    /// Fail every request whose `[start, end)` contains `instant`
    pub fn fail_covering(mut self, instant: DateTime<Utc>, error: FetchError) -> Self {
        self.failures.push(Failure {
            trigger: Trigger::Covering(instant),
            error,
        });
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<DocumentRequest> {
        self.log.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().len()
    }

    fn injected_failure(&self, n: usize, request: &DocumentRequest) -> Option<FetchError> {
        self.failures
            .iter()
            .find(|f| match f.trigger {
                Trigger::Nth(k) => k == n,
                Trigger::Covering(t) => request.start <= t && t < request.end,
            })
            .map(|f| f.error.clone())
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn request(&self, request: &DocumentRequest) -> FetchResult<FetchedDocument> {
        let n = {
            let mut log = self.log.lock();
            log.push(request.clone());
            log.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.injected_failure(n, request) {
            return Err(error);
        }

        if let Some(body) = self.documents.get(&request.source) {
            return Ok(FetchedDocument::new(body.clone()));
        }

        match &self.responder {
            Some(responder) => responder(request).map(FetchedDocument::new),
            None => Err(FetchError::permanent(format!("no scripted document for {}", request))),
        }
    }
}
