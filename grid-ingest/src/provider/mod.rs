//! Document fetchers for the upstream providers
//!
//! Each provider client implements [`Fetcher`] for the source variants it
//! serves; [`HttpFetcher`] routes a request to the right one.

mod ceps;
mod entsoe;
mod http;
pub mod mock;
mod ote;
mod traits;

pub use ceps::{soap_action, soap_envelope, CepsSoapClient, CEPS_NAMESPACE};
pub use entsoe::{query_params, EntsoeClient};
pub use http::HttpFetcher;
pub use mock::MockFetcher;
pub use ote::{workbook_file, workbook_url, OteClient};
pub use traits::*;
