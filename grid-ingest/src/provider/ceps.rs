//! CEPS SOAP client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;
use tracing::debug;

use grid_common::error::{retry_with_backoff, NetworkError};

use super::{DocumentRequest, FetchError, FetchResult, FetchedDocument, Fetcher};
use crate::config::CepsSettings;
use crate::parser::{CepsDataset, SourceVariant};

/// Namespace of the CepsData web service
pub const CEPS_NAMESPACE: &str = "https://www.ceps.cz/CepsData/";

/// SOAP 1.1 client for `CepsData.asmx`
#[derive(Debug, Clone)]
pub struct CepsSoapClient {
    http: reqwest::Client,
    endpoint: String,
    tz: Tz,
    max_attempts: u32,
}

impl CepsSoapClient {
    pub fn new(settings: &CepsSettings, tz: Tz, max_attempts: u32) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| FetchError::permanent(format!("cannot build CEPS client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            tz,
            max_attempts: max_attempts.max(1),
        })
    }

    async fn fetch_once(&self, dataset: CepsDataset, envelope: &str) -> FetchResult<FetchedDocument> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", soap_action(dataset))
            .body(envelope.to_string())
            .send()
            .await
            .map_err(NetworkError::from)?;

        let status = response.status();
        let body = response.bytes().await.map_err(NetworkError::from)?;

        if status.is_success() {
            return Ok(FetchedDocument::new(body.to_vec()));
        }

        let text = String::from_utf8_lossy(&body);
        if text.contains("Fault>") {
            return Err(FetchError::permanent(format!(
                "SOAP fault from {}: {}",
                dataset.operation(),
                fault_string(&text)
            )));
        }
        Err(NetworkError::status(status.as_u16(), &text).into())
    }
}

#[async_trait]
impl Fetcher for CepsSoapClient {
    fn name(&self) -> &str {
        "ceps"
    }

    async fn request(&self, request: &DocumentRequest) -> FetchResult<FetchedDocument> {
        let dataset = match request.source {
            SourceVariant::Ceps(dataset) => dataset,
            other => {
                return Err(FetchError::permanent(format!("{} is not a CEPS operation", other)));
            }
        };

        let envelope = soap_envelope(dataset, request.start, request.end, self.tz);
        debug!("CEPS request {} via {}", request, soap_action(dataset));

        retry_with_backoff(
            || self.fetch_once(dataset, &envelope),
            self.max_attempts,
            Duration::from_secs(1),
        )
        .await
    }
}

pub fn soap_action(dataset: CepsDataset) -> String {
    format!("{}{}", CEPS_NAMESPACE, dataset.operation())
}

fn local_time(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// SOAP body for one operation over `[start, end)` in provider-local time.
pub fn soap_envelope(dataset: CepsDataset, start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> String {
    let mut params = format!(
        "<dateFrom>{}</dateFrom><dateTo>{}</dateTo>",
        local_time(start, tz),
        local_time(end, tz)
    );
    match dataset {
        CepsDataset::Imbalance => {
            params.push_str("<agregation>MI</agregation><function>AVG</function>");
        }
        CepsDataset::RePrice => {
            params.push_str("<param1>all</param1>");
        }
        CepsDataset::SvrActivation | CepsDataset::ExportImportSvr => {
            params.push_str("<agregation>MI</agregation><function>AVG</function><param1>all</param1>");
        }
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
            r#"<soap:Body><{op} xmlns="{ns}">{params}</{op}></soap:Body></soap:Envelope>"#
        ),
        op = dataset.operation(),
        ns = CEPS_NAMESPACE,
        params = params
    )
}

fn fault_string(text: &str) -> &str {
    text.split_once("<faultstring>")
        .and_then(|(_, rest)| rest.split_once("</faultstring>"))
        .map(|(fault, _)| fault)
        .unwrap_or("no faultstring")
}
