//! OTE day-ahead workbook download

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::time::Duration;
use tracing::debug;

use grid_common::error::{retry_with_backoff, NetworkError};

use super::{DocumentRequest, FetchError, FetchResult, FetchedDocument, Fetcher};
use crate::config::OteSettings;
use crate::parser::SourceVariant;

/// First trade date published in the 15-minute workbook layout
pub fn quarter_hour_since() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 1).unwrap_or(NaiveDate::MIN)
}

/// Downloads one results workbook per trade date
#[derive(Debug, Clone)]
pub struct OteClient {
    http: reqwest::Client,
    url_template: String,
    max_attempts: u32,
}

impl OteClient {
    pub fn new(settings: &OteSettings, max_attempts: u32) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| FetchError::permanent(format!("cannot build OTE client: {}", e)))?;

        Ok(Self {
            http,
            url_template: settings.url_template.clone(),
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn url(&self, trade_date: NaiveDate) -> String {
        workbook_url(&self.url_template, trade_date)
    }

    async fn fetch_once(&self, url: &str) -> FetchResult<FetchedDocument> {
        let response = self.http.get(url).send().await.map_err(NetworkError::from)?;
        let status = response.status();
        let body = response.bytes().await.map_err(NetworkError::from)?;

        if status.is_success() {
            return Ok(FetchedDocument::new(body.to_vec()));
        }
        Err(NetworkError::status(status.as_u16(), &String::from_utf8_lossy(&body)).into())
    }
}

#[async_trait]
impl Fetcher for OteClient {
    fn name(&self) -> &str {
        "ote"
    }

    async fn request(&self, request: &DocumentRequest) -> FetchResult<FetchedDocument> {
        if request.source != SourceVariant::OteDayAhead {
            return Err(FetchError::permanent(format!(
                "{} is not an OTE document",
                request.source
            )));
        }
        let trade_date = request
            .trade_date
            .ok_or_else(|| FetchError::permanent(format!("{} has no trade date", request)))?;

        let url = self.url(trade_date);
        debug!("OTE request {} from {}", request, url);

        retry_with_backoff(|| self.fetch_once(&url), self.max_attempts, Duration::from_secs(1)).await
    }
}

/// Published file name of the results workbook for a trade date.
pub fn workbook_file(trade_date: NaiveDate) -> String {
    let prefix = if trade_date >= quarter_hour_since() {
        "DM_15MIN"
    } else {
        "DM"
    };
    format!("{}_{}_EN.xlsx", prefix, trade_date.format("%d_%m_%Y"))
}

pub fn workbook_url(template: &str, trade_date: NaiveDate) -> String {
    template
        .replace("{yyyy}", &format!("{:04}", trade_date.year()))
        .replace("{mm}", &format!("{:02}", trade_date.month()))
        .replace("{dd}", &format!("{:02}", trade_date.day()))
        .replace("{file}", &workbook_file(trade_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_switches_on_first_quarter_hour_day() {
        let before = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        let after = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();

        assert_eq!(workbook_file(before), "DM_30_09_2025_EN.xlsx");
        assert_eq!(workbook_file(after), "DM_15MIN_01_10_2025_EN.xlsx");
    }

    #[test]
    fn test_url_template() {
        let template = "https://www.ote-cr.cz/pubweb/attachments/01/{yyyy}/month{mm}/day{dd}/{file}";
        let date = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();

        assert_eq!(
            workbook_url(template, date),
            "https://www.ote-cr.cz/pubweb/attachments/01/2025/month11/day05/DM_15MIN_05_11_2025_EN.xlsx"
        );
    }
}
