//! # Source Parsers
//!
//! One closed variant per (provider, dataset). Each variant walks a fetched
//! document and yields [`RawSample`]s for the fields it declares.
//!
//! Points lacking a timestamp or carrying a non-numeric value are collected
//! as [`InvalidSample`]s and never abort the parse. An empty result means
//! "no usable data", not failure.
//!
//! [`RawSample`]: crate::schema::RawSample
//! [`InvalidSample`]: crate::schema::InvalidSample

mod ceps;
mod entsoe;
mod ote;
mod xml;


pub use ote::{read_workbook, SheetCell, OTE_SHEET};

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use grid_common::error::{ErrorCategory, ErrorClassification};

use crate::calendar::{CalendarError, PeriodCalendar};
use crate::reference::Neighbor;
use crate::schema::ParsedDocument;

/// Parser errors. Sample-level problems never surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("Unknown dataset identifier '{0}'")]
    UnknownDataset(String),

    #[error("Malformed timestamp '{input}': {reason}")]
    MalformedTimestamp { input: String, reason: String },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),
}

impl ErrorClassification for ParseError {
    fn category(&self) -> ErrorCategory {
        match self {
            ParseError::UnknownDataset(_) | ParseError::MalformedTimestamp { .. } => {
                ErrorCategory::Configuration
            }
            ParseError::MalformedDocument(_) => ErrorCategory::Permanent,
        }
    }
}

impl From<CalendarError> for ParseError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::MalformedTimestamp { input, reason } => {
                ParseError::MalformedTimestamp { input, reason }
            }
            other => ParseError::MalformedDocument(other.to_string()),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Entsoe,
    Ceps,
    Ote,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::Entsoe => "entsoe",
            Provider::Ceps => "ceps",
            Provider::Ote => "ote",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a cross-border physical flow as seen from the home area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowDirection {
    Import,
    Export,
}

/// CEPS SOAP datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CepsDataset {
    Imbalance,
    RePrice,
    SvrActivation,
    ExportImportSvr,
}

impl CepsDataset {
    pub const ALL: [CepsDataset; 4] = [
        CepsDataset::Imbalance,
        CepsDataset::RePrice,
        CepsDataset::SvrActivation,
        CepsDataset::ExportImportSvr,
    ];

    /// Identifier used in table names
    pub fn id(self) -> &'static str {
        match self {
            CepsDataset::Imbalance => "imbalance",
            CepsDataset::RePrice => "re_price",
            CepsDataset::SvrActivation => "svr_activation",
            CepsDataset::ExportImportSvr => "export_import_svr",
        }
    }

    /// SOAP operation name
    pub fn operation(self) -> &'static str {
        match self {
            CepsDataset::Imbalance => "AktualniSystemovaOdchylkaCR",
            CepsDataset::RePrice => "AktualniCenaRE",
            CepsDataset::SvrActivation => "AktivaceSVRvCR",
            CepsDataset::ExportImportSvr => "ExportImportSVR",
        }
    }

    /// Slot table: `(value attribute, fields it populates)`.
    ///
    /// More than one field per slot is a duplication rule.
    pub fn slots(self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            CepsDataset::Imbalance => &[("value1", &["load_mw"])],
            CepsDataset::RePrice => &[
                ("value1", &["price_afrr_plus_eur_mwh", "price_afrr_minus_eur_mwh"]),
                ("value2", &["price_mfrr_plus_eur_mwh"]),
                ("value3", &["price_mfrr_minus_eur_mwh"]),
                ("value4", &["price_mfrr_5_eur_mwh"]),
            ],
            CepsDataset::SvrActivation => &[
                ("value1", &["afrr_plus_mw"]),
                ("value2", &["afrr_minus_mw"]),
                ("value3", &["mfrr_plus_mw"]),
                ("value4", &["mfrr_minus_mw"]),
                ("value5", &["mfrr_5_mw"]),
            ],
            CepsDataset::ExportImportSvr => &[
                ("value2", &["imbalance_netting_mw"]),
                ("value3", &["mari_mfrr_mw"]),
                ("value4", &["picasso_afrr_mw"]),
                ("value5", &["sum_exchange_european_platforms_mw"]),
            ],
        }
    }

    pub fn fields(self) -> &'static [&'static str] {
        match self {
            CepsDataset::Imbalance => &["load_mw"],
            CepsDataset::RePrice => &[
                "price_afrr_plus_eur_mwh",
                "price_afrr_minus_eur_mwh",
                "price_mfrr_plus_eur_mwh",
                "price_mfrr_minus_eur_mwh",
                "price_mfrr_5_eur_mwh",
            ],
            CepsDataset::SvrActivation => &[
                "afrr_plus_mw",
                "afrr_minus_mw",
                "mfrr_plus_mw",
                "mfrr_minus_mw",
                "mfrr_5_mw",
            ],
            CepsDataset::ExportImportSvr => &[
                "imbalance_netting_mw",
                "mari_mfrr_mw",
                "picasso_afrr_mw",
                "sum_exchange_european_platforms_mw",
            ],
        }
    }
}

impl fmt::Display for CepsDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for CepsDataset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CepsDataset::ALL
            .into_iter()
            .find(|d| d.id() == s || d.operation() == s)
            .ok_or_else(|| ParseError::UnknownDataset(s.to_string()))
    }
}

pub const IMBALANCE_PRICE_FIELDS: &[&str] = &[
    "pos_imb_price_czk_mwh",
    "pos_imb_scarcity_czk_mwh",
    "pos_imb_incentive_czk_mwh",
    "pos_imb_financial_neutrality_czk_mwh",
    "neg_imb_price_czk_mwh",
    "neg_imb_scarcity_czk_mwh",
    "neg_imb_incentive_czk_mwh",
    "neg_imb_financial_neutrality_czk_mwh",
    "status",
];

pub const IMBALANCE_VOLUME_FIELDS: &[&str] = &["imbalance_mwh", "difference_mwh", "situation"];

pub const GENERATION_FIELDS: &[&str] = &[
    "gen_nuclear_mw",
    "gen_coal_mw",
    "gen_gas_mw",
    "gen_solar_mw",
    "gen_wind_mw",
    "gen_wind_offshore_mw",
    "gen_hydro_pumped_mw",
    "gen_biomass_mw",
    "gen_hydro_other_mw",
];

pub const BALANCING_FIELDS: &[&str] = &[
    "afrr_up_price_eur",
    "afrr_down_price_eur",
    "mfrr_up_price_eur",
    "mfrr_down_price_eur",
];

pub const OTE_DAY_AHEAD_FIELDS: &[&str] = &[
    "price_15min_eur_mwh",
    "volume_mwh",
    "purchase_15min_products_mwh",
    "purchase_60min_products_mwh",
    "sale_15min_products_mwh",
    "sale_60min_products_mwh",
    "saldo_dm_mwh",
    "export_mwh",
    "import_mwh",
    "price_60min_ref_eur_mwh",
    "is_15min",
];

/// Closed set of parser variants, one per (provider, dataset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceVariant {
    /// A85 imbalance prices
    EntsoeImbalancePrices,
    /// A86 imbalance volumes
    EntsoeImbalanceVolumes,
    /// A65 realised load (processType A16)
    EntsoeActualLoad,
    /// A65 day-ahead load forecast (processType A01)
    EntsoeLoadForecast,
    /// A75 actual generation per production type
    EntsoeGeneration,
    /// A84 activated balancing energy prices
    EntsoeBalancingEnergy,
    /// A11 physical flow on one border
    EntsoePhysicalFlow {
        neighbor: Neighbor,
        direction: FlowDirection,
    },
    Ceps(CepsDataset),
    OteDayAhead,
}

impl SourceVariant {
    pub fn provider(&self) -> Provider {
        match self {
            SourceVariant::Ceps(_) => Provider::Ceps,
            SourceVariant::OteDayAhead => Provider::Ote,
            _ => Provider::Entsoe,
        }
    }

    /// Fields this variant knows how to populate
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            SourceVariant::EntsoeImbalancePrices => IMBALANCE_PRICE_FIELDS,
            SourceVariant::EntsoeImbalanceVolumes => IMBALANCE_VOLUME_FIELDS,
            SourceVariant::EntsoeActualLoad => &["actual_load_mw"],
            SourceVariant::EntsoeLoadForecast => &["forecast_load_mw"],
            SourceVariant::EntsoeGeneration => GENERATION_FIELDS,
            SourceVariant::EntsoeBalancingEnergy => BALANCING_FIELDS,
            SourceVariant::EntsoePhysicalFlow { neighbor, .. } => match neighbor {
                Neighbor::De => &["flow_de_mw"],
                Neighbor::At => &["flow_at_mw"],
                Neighbor::Pl => &["flow_pl_mw"],
                Neighbor::Sk => &["flow_sk_mw"],
            },
            SourceVariant::Ceps(dataset) => dataset.fields(),
            SourceVariant::OteDayAhead => OTE_DAY_AHEAD_FIELDS,
        }
    }

    /// Parse one fetched document
    pub fn parse(&self, body: &[u8], ctx: &ParseContext<'_>) -> ParseResult<ParsedDocument> {
        match self {
            SourceVariant::OteDayAhead => ote::parse(*self, body, ctx),
            SourceVariant::Ceps(dataset) => ceps::parse(*self, *dataset, xml::text(body)?, ctx),
            _ => entsoe::parse(*self, xml::text(body)?, ctx),
        }
    }
}

impl fmt::Display for SourceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceVariant::EntsoeImbalancePrices => write!(f, "entsoe:A85"),
            SourceVariant::EntsoeImbalanceVolumes => write!(f, "entsoe:A86"),
            SourceVariant::EntsoeActualLoad => write!(f, "entsoe:A65-actual"),
            SourceVariant::EntsoeLoadForecast => write!(f, "entsoe:A65-forecast"),
            SourceVariant::EntsoeGeneration => write!(f, "entsoe:A75"),
            SourceVariant::EntsoeBalancingEnergy => write!(f, "entsoe:A84"),
            SourceVariant::EntsoePhysicalFlow {
                neighbor,
                direction,
            } => {
                let dir = match direction {
                    FlowDirection::Import => "import",
                    FlowDirection::Export => "export",
                };
                write!(f, "entsoe:A11:{}:{}", neighbor, dir)
            }
            SourceVariant::Ceps(dataset) => write!(f, "ceps:{}", dataset),
            SourceVariant::OteDayAhead => write!(f, "ote:day-ahead"),
        }
    }
}

impl FromStr for SourceVariant {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ParseError::UnknownDataset(s.to_string());

        let variant = match s {
            "entsoe:A85" => SourceVariant::EntsoeImbalancePrices,
            "entsoe:A86" => SourceVariant::EntsoeImbalanceVolumes,
            "entsoe:A65-actual" => SourceVariant::EntsoeActualLoad,
            "entsoe:A65-forecast" => SourceVariant::EntsoeLoadForecast,
            "entsoe:A75" => SourceVariant::EntsoeGeneration,
            "entsoe:A84" => SourceVariant::EntsoeBalancingEnergy,
            "ote:day-ahead" => SourceVariant::OteDayAhead,
            other => {
                if let Some(dataset) = other.strip_prefix("ceps:") {
                    return Ok(SourceVariant::Ceps(dataset.parse().map_err(|_| unknown())?));
                }

                let parts: Vec<&str> = other.split(':').collect();
                match parts.as_slice() {
                    ["entsoe", "A11", neighbor, direction] => {
                        let neighbor = Neighbor::ALL
                            .into_iter()
                            .find(|n| n.to_string() == *neighbor)
                            .ok_or_else(unknown)?;
                        let direction = match *direction {
                            "import" => FlowDirection::Import,
                            "export" => FlowDirection::Export,
                            _ => return Err(unknown()),
                        };
                        SourceVariant::EntsoePhysicalFlow {
                            neighbor,
                            direction,
                        }
                    }
                    _ => return Err(unknown()),
                }
            }
        };
        Ok(variant)
    }
}

/// Request-side facts a parser may need
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub calendar: &'a PeriodCalendar,
    /// Trade date of the request, for documents that only carry period numbers
    pub trade_date: Option<NaiveDate>,
}

impl<'a> ParseContext<'a> {
    pub fn new(calendar: &'a PeriodCalendar) -> Self {
        Self {
            calendar,
            trade_date: None,
        }
    }

    pub fn with_trade_date(mut self, trade_date: NaiveDate) -> Self {
        self.trade_date = Some(trade_date);
        self
    }
}
