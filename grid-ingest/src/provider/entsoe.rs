//! ENTSO-E Transparency Platform client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use grid_common::error::{retry_with_backoff, NetworkError};

use super::{DocumentRequest, FetchError, FetchResult, FetchedDocument, Fetcher};
use crate::config::EntsoeSettings;
use crate::parser::{FlowDirection, SourceVariant};

const ACKNOWLEDGEMENT: &str = "Acknowledgement_MarketDocument";

/// REST client for the Transparency Platform `api` endpoint
#[derive(Debug, Clone)]
pub struct EntsoeClient {
    http: reqwest::Client,
    base_url: String,
    security_token: String,
    max_attempts: u32,
}

impl EntsoeClient {
    pub fn new(settings: &EntsoeSettings, max_attempts: u32) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| FetchError::permanent(format!("cannot build ENTSO-E client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            security_token: settings.security_token.clone(),
            max_attempts: max_attempts.max(1),
        })
    }

    async fn fetch_once(&self, params: &[(&'static str, String)]) -> FetchResult<FetchedDocument> {
        let response = self
            .http
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .map_err(NetworkError::from)?;

        let status = response.status();
        let body = response.bytes().await.map_err(NetworkError::from)?;

        // "No matching data" comes back as a 400 acknowledgement
        if status.is_success() || (status.as_u16() == 400 && is_acknowledgement(&body)) {
            return Ok(FetchedDocument::new(body.to_vec()));
        }

        Err(NetworkError::status(status.as_u16(), &String::from_utf8_lossy(&body)).into())
    }
}

#[async_trait]
impl Fetcher for EntsoeClient {
    fn name(&self) -> &str {
        "entsoe"
    }

    async fn request(&self, request: &DocumentRequest) -> FetchResult<FetchedDocument> {
        let mut params = query_params(request)?;
        debug!("ENTSO-E request {} {:?}", request, params);
        params.push(("securityToken", self.security_token.clone()));

        retry_with_backoff(
            || self.fetch_once(&params),
            self.max_attempts,
            Duration::from_secs(1),
        )
        .await
    }
}

fn is_acknowledgement(body: &[u8]) -> bool {
    String::from_utf8_lossy(body).contains(ACKNOWLEDGEMENT)
}

fn api_time(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%d%H%M").to_string()
}

/// Query parameters for a request, without the security token.
pub fn query_params(request: &DocumentRequest) -> FetchResult<Vec<(&'static str, String)>> {
    let area = request.area.code.to_string();
    let mut params: Vec<(&'static str, String)> = Vec::with_capacity(6);

    match request.source {
        SourceVariant::EntsoeImbalancePrices => {
            params.push(("documentType", "A85".into()));
            params.push(("controlArea_Domain", area));
        }
        SourceVariant::EntsoeImbalanceVolumes => {
            params.push(("documentType", "A86".into()));
            params.push(("controlArea_Domain", area));
        }
        SourceVariant::EntsoeActualLoad => {
            params.push(("documentType", "A65".into()));
            params.push(("processType", "A16".into()));
            params.push(("outBiddingZone_Domain", area));
        }
        SourceVariant::EntsoeLoadForecast => {
            params.push(("documentType", "A65".into()));
            params.push(("processType", "A01".into()));
            params.push(("outBiddingZone_Domain", area));
        }
        SourceVariant::EntsoeGeneration => {
            params.push(("documentType", "A75".into()));
            params.push(("processType", "A16".into()));
            params.push(("in_Domain", area));
        }
        SourceVariant::EntsoeBalancingEnergy => {
            params.push(("documentType", "A84".into()));
            params.push(("processType", "A16".into()));
            params.push(("controlArea_Domain", area));
        }
        SourceVariant::EntsoePhysicalFlow { direction, .. } => {
            let counterpart = request
                .counterpart
                .ok_or_else(|| FetchError::permanent(format!("{} has no counterpart area", request)))?
                .code
                .to_string();
            let (in_domain, out_domain) = match direction {
                FlowDirection::Import => (area, counterpart),
                FlowDirection::Export => (counterpart, area),
            };
            params.push(("documentType", "A11".into()));
            params.push(("in_Domain", in_domain));
            params.push(("out_Domain", out_domain));
        }
        SourceVariant::Ceps(_) | SourceVariant::OteDayAhead => {
            return Err(FetchError::permanent(format!(
                "{} is not an ENTSO-E document",
                request.source
            )));
        }
    }

    params.push(("periodStart", api_time(request.start)));
    params.push(("periodEnd", api_time(request.end)));
    Ok(params)
}
