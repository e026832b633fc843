//! Provider routing

use async_trait::async_trait;
use chrono_tz::Tz;

use super::{
    CepsSoapClient, DocumentRequest, EntsoeClient, FetchResult, FetchedDocument, Fetcher,
    OteClient,
};
use crate::config::ProviderSettings;
use crate::parser::Provider;

/// Live fetcher that dispatches on the request's provider
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    entsoe: EntsoeClient,
    ceps: CepsSoapClient,
    ote: OteClient,
}

impl HttpFetcher {
    pub fn from_settings(settings: &ProviderSettings, tz: Tz) -> FetchResult<Self> {
        Ok(Self {
            entsoe: EntsoeClient::new(&settings.entsoe, settings.max_attempts)?,
            ceps: CepsSoapClient::new(&settings.ceps, tz, settings.max_attempts)?,
            ote: OteClient::new(&settings.ote, settings.max_attempts)?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn request(&self, request: &DocumentRequest) -> FetchResult<FetchedDocument> {
        match request.source.provider() {
            Provider::Entsoe => self.entsoe.request(request).await,
            Provider::Ceps => self.ceps.request(request).await,
            Provider::Ote => self.ote.request(request).await,
        }
    }
}
