//! ENTSO-E Transparency Platform documents
//!
//! All variants share the `TimeSeries / Period / Point` layout: a Period
//! carries an offset-qualified `timeInterval` and a `resolution`, and each
//! Point's instant is `start + (position - 1) * resolution`.

use chrono::{DateTime, Duration, Utc};
use roxmltree::Node;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::xml::{self, parse_decimal};
use super::{FlowDirection, ParseContext, ParseError, ParseResult, SourceVariant};
use crate::calendar::parse_offset_instant;
use crate::schema::{ParsedDocument, RawSample, Value};

const ACKNOWLEDGEMENT: &str = "Acknowledgement_MarketDocument";

/// Production type to generation column
fn psr_field(psr_type: &str) -> Option<&'static str> {
    let field = match psr_type {
        "B14" => "gen_nuclear_mw",
        "B02" | "B05" => "gen_coal_mw",
        "B04" => "gen_gas_mw",
        "B16" => "gen_solar_mw",
        "B19" => "gen_wind_mw",
        "B18" => "gen_wind_offshore_mw",
        "B10" => "gen_hydro_pumped_mw",
        "B01" => "gen_biomass_mw",
        "B11" | "B12" => "gen_hydro_other_mw",
        _ => return None,
    };
    Some(field)
}

fn balancing_field(business_type: &str, direction: &str) -> Option<&'static str> {
    let field = match (business_type, direction) {
        ("A96", "A01") => "afrr_up_price_eur",
        ("A96", "A02") => "afrr_down_price_eur",
        ("A97", "A01") => "mfrr_up_price_eur",
        ("A97", "A02") => "mfrr_down_price_eur",
        _ => return None,
    };
    Some(field)
}

fn situation_label(direction: &str) -> Option<&'static str> {
    match direction {
        "A01" => Some("surplus"),
        "A02" => Some("deficit"),
        "A03" => Some("balanced"),
        _ => None,
    }
}

pub(super) fn parse(
    variant: SourceVariant,
    text: &str,
    _ctx: &ParseContext<'_>,
) -> ParseResult<ParsedDocument> {
    let doc = xml::parse_tree(text)?;
    let root = doc.root_element();
    let mut out = ParsedDocument::default();

    if xml::is(&root, ACKNOWLEDGEMENT) {
        let reason = xml::path_text(root, &["Reason", "text"]).unwrap_or("no reason given");
        debug!("{} returned no data: {}", variant, reason);
        return Ok(out);
    }

    let doc_status = xml::path_text(root, &["docStatus", "value"]);
    let mut generation = GenerationAccumulator::default();

    for series in xml::descendants(root, "TimeSeries") {
        match variant {
            SourceVariant::EntsoeImbalancePrices => {
                for_each_period(variant, series, &mut out, |period, window, out| {
                    imbalance_prices(variant, period, window, doc_status, out)
                })?;
            }
            SourceVariant::EntsoeImbalanceVolumes => {
                let situation =
                    xml::child_text(series, "flowDirection.direction").and_then(situation_label);
                for_each_period(variant, series, &mut out, |period, window, out| {
                    imbalance_volumes(variant, period, window, situation, out);
                    Ok(())
                })?;
            }
            SourceVariant::EntsoeGeneration => {
                let Some(psr) = xml::path_text(series, &["MktPSRType", "psrType"]) else {
                    out.reject(variant, None, "TimeSeries without psrType", "TimeSeries");
                    continue;
                };
                let Some(field) = psr_field(psr) else {
                    debug!("Skipping unmapped production type {}", psr);
                    continue;
                };
                if xml::child(series, "outBiddingZone_Domain.mRID").is_some() {
                    // Consumption series (pumped storage pumping)
                    continue;
                }
                let fill = is_step_curve(series);
                for_each_period(variant, series, &mut out, |period, window, out| {
                    for (instant, value) in numeric_points(variant, field, period, window, "quantity", fill, out) {
                        generation.add(instant, field, window.minutes, value);
                    }
                    Ok(())
                })?;
            }
            _ => {
                let Some((field, sign)) = series_field(variant, series) else {
                    debug!("Skipping TimeSeries not mapped for {}", variant);
                    continue;
                };
                let element = match variant {
                    SourceVariant::EntsoeBalancingEnergy => "activation_Price.amount",
                    _ => "quantity",
                };
                let fill = is_step_curve(series);
                for_each_period(variant, series, &mut out, |period, window, out| {
                    for (instant, value) in numeric_points(variant, field, period, window, element, fill, out) {
                        out.push(RawSample::new(variant, field, instant, value * sign));
                    }
                    Ok(())
                })?;
            }
        }
    }

    generation.emit(variant, &mut out);
    Ok(out)
}

/// Field and sign of a non-generation series
fn series_field(variant: SourceVariant, series: Node<'_, '_>) -> Option<(&'static str, Decimal)> {
    match variant {
        SourceVariant::EntsoeActualLoad => Some(("actual_load_mw", Decimal::ONE)),
        SourceVariant::EntsoeLoadForecast => Some(("forecast_load_mw", Decimal::ONE)),
        SourceVariant::EntsoeBalancingEnergy => {
            let business = xml::child_text(series, "businessType")?;
            let direction = xml::child_text(series, "flowDirection.direction")?;
            balancing_field(business, direction).map(|f| (f, Decimal::ONE))
        }
        SourceVariant::EntsoePhysicalFlow {
            neighbor,
            direction,
        } => {
            let sign = match direction {
                FlowDirection::Import => Decimal::ONE,
                FlowDirection::Export => Decimal::NEGATIVE_ONE,
            };
            Some((neighbor.flow_field(), sign))
        }
        _ => None,
    }
}

fn is_step_curve(series: Node<'_, '_>) -> bool {
    xml::child_text(series, "curveType") == Some("A03")
}

/// Time window of one `Period` element
#[derive(Debug, Clone, Copy)]
struct PeriodWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    minutes: i64,
}

impl PeriodWindow {
    /// Read the window; `Ok(None)` when a bound is missing
    fn read(period: Node<'_, '_>) -> ParseResult<Option<Self>> {
        let (Some(start), Some(end)) = (
            xml::path_text(period, &["timeInterval", "start"]),
            xml::path_text(period, &["timeInterval", "end"]),
        ) else {
            return Ok(None);
        };

        let minutes = match xml::child_text(period, "resolution") {
            Some(res) => resolution_minutes(res)?,
            None => 15,
        };

        Ok(Some(Self {
            start: parse_offset_instant(start)?,
            end: parse_offset_instant(end)?,
            minutes,
        }))
    }

    fn instant(&self, position: u32) -> DateTime<Utc> {
        self.start + Duration::minutes((position as i64 - 1) * self.minutes)
    }

    fn positions(&self) -> u32 {
        ((self.end - self.start).num_minutes() / self.minutes).max(0) as u32
    }
}

/// ISO-8601 duration (`PT15M`, `PT60M`, `PT1H`) in minutes
fn resolution_minutes(text: &str) -> ParseResult<i64> {
    let bad = || ParseError::MalformedDocument(format!("unsupported resolution '{}'", text));
    let body = text.strip_prefix("PT").ok_or_else(bad)?;

    let minutes = if let Some(m) = body.strip_suffix('M') {
        m.parse::<i64>().map_err(|_| bad())?
    } else if let Some(h) = body.strip_suffix('H') {
        h.parse::<i64>().map_err(|_| bad())? * 60
    } else {
        return Err(bad());
    };

    if minutes <= 0 {
        return Err(bad());
    }
    Ok(minutes)
}

fn for_each_period<'a, 'input, F>(
    variant: SourceVariant,
    series: Node<'a, 'input>,
    out: &mut ParsedDocument,
    mut handle: F,
) -> ParseResult<()>
where
    F: FnMut(Node<'a, 'input>, &PeriodWindow, &mut ParsedDocument) -> ParseResult<()>,
{
    for period in xml::children(series, "Period") {
        match PeriodWindow::read(period)? {
            Some(window) => handle(period, &window, out)?,
            None => out.reject(variant, None, "Period without timeInterval", "Period"),
        }
    }
    Ok(())
}

/// Points of a period keyed by position; points without a usable position are rejected
fn points<'a, 'input>(
    variant: SourceVariant,
    period: Node<'a, 'input>,
    out: &mut ParsedDocument,
) -> BTreeMap<u32, Node<'a, 'input>> {
    let mut points = BTreeMap::new();
    for point in xml::children(period, "Point") {
        match xml::child_text(point, "position").map(str::parse::<u32>) {
            Some(Ok(position)) if position > 0 => {
                points.insert(position, point);
            }
            Some(_) => out.reject(variant, None, "invalid position", point_raw(point)),
            None => out.reject(variant, None, "missing position", "Point"),
        }
    }
    points
}

fn point_raw(point: Node<'_, '_>) -> String {
    xml::child_text(point, "position").unwrap_or("Point").to_string()
}

/// Numeric value of one element of every point, forward-filled when `fill`
fn numeric_points(
    variant: SourceVariant,
    field: &'static str,
    period: Node<'_, '_>,
    window: &PeriodWindow,
    element: &str,
    fill: bool,
    out: &mut ParsedDocument,
) -> Vec<(DateTime<Utc>, Decimal)> {
    let mut values = BTreeMap::new();
    for (position, point) in points(variant, period, out) {
        match xml::child_text(point, element) {
            Some(raw) => match parse_decimal(raw) {
                Some(value) => {
                    values.insert(position, value);
                }
                None => out.reject(variant, Some(field), "non-numeric value", raw),
            },
            None => out.reject(variant, Some(field), "missing value", point_raw(point)),
        }
    }

    if !fill {
        return values
            .into_iter()
            .map(|(position, value)| (window.instant(position), value))
            .collect();
    }

    let mut filled = Vec::new();
    let mut current = None;
    for position in 1..=window.positions() {
        if let Some(value) = values.get(&position) {
            current = Some(*value);
        }
        if let Some(value) = current {
            filled.push((window.instant(position), value));
        }
    }
    filled
}

#[derive(Debug, Clone, Default)]
struct PriceState {
    amount: Decimal,
    components: HashMap<String, Decimal>,
}

/// A85: one price per interval, preferring category A04 over A05
fn imbalance_prices(
    variant: SourceVariant,
    period: Node<'_, '_>,
    window: &PeriodWindow,
    doc_status: Option<&str>,
    out: &mut ParsedDocument,
) -> ParseResult<()> {
    let mut parsed: BTreeMap<u32, (String, PriceState)> = BTreeMap::new();
    for (position, point) in points(variant, period, out) {
        let category = xml::child_text(point, "imbalance_Price.category").unwrap_or("A04");
        let Some(raw) = xml::child_text(point, "imbalance_Price.amount") else {
            out.reject(variant, Some("pos_imb_price_czk_mwh"), "missing price", point_raw(point));
            continue;
        };
        let Some(amount) = parse_decimal(raw) else {
            out.reject(variant, Some("pos_imb_price_czk_mwh"), "non-numeric value", raw);
            continue;
        };

        let mut components = HashMap::new();
        for component in xml::children(point, "Financial_Price") {
            let kind = xml::child_text(component, "priceDescriptor.type");
            let value = xml::child_text(component, "amount");
            match (kind, value.and_then(parse_decimal)) {
                (Some(kind), Some(value)) => {
                    components.insert(kind.to_string(), value);
                }
                _ => out.reject(
                    variant,
                    None,
                    "unusable Financial_Price",
                    value.unwrap_or("Financial_Price"),
                ),
            }
        }
        parsed.insert(position, (category.to_string(), PriceState { amount, components }));
    }

    let none = PriceState::default();
    let mut a04 = PriceState::default();
    let mut a05 = PriceState::default();
    for position in 1..=window.positions() {
        if let Some((category, state)) = parsed.get(&position) {
            match category.as_str() {
                "A05" => a05 = state.clone(),
                _ => a04 = state.clone(),
            }
        }

        let chosen = if !a04.amount.is_zero() {
            &a04
        } else if !a05.amount.is_zero() {
            &a05
        } else {
            &none
        };
        let component = |kind: &str| chosen.components.get(kind).copied().unwrap_or(Decimal::ZERO);

        let instant = window.instant(position);
        let values = [
            ("price", chosen.amount),
            ("scarcity", component("A01")),
            ("incentive", component("A02")),
            ("financial_neutrality", component("A03")),
        ];
        for (name, value) in values {
            // Both directions share one published price.
            for field in price_fields(name) {
                out.push(RawSample::new(variant, field, instant, value));
            }
        }
        if let Some(status) = doc_status {
            out.push(RawSample::new(variant, "status", instant, status));
        }
    }
    Ok(())
}

fn price_fields(component: &str) -> [&'static str; 2] {
    match component {
        "price" => ["pos_imb_price_czk_mwh", "neg_imb_price_czk_mwh"],
        "scarcity" => ["pos_imb_scarcity_czk_mwh", "neg_imb_scarcity_czk_mwh"],
        "incentive" => ["pos_imb_incentive_czk_mwh", "neg_imb_incentive_czk_mwh"],
        _ => [
            "pos_imb_financial_neutrality_czk_mwh",
            "neg_imb_financial_neutrality_czk_mwh",
        ],
    }
}

/// A86: quantity and secondary quantity, forward-filled together
fn imbalance_volumes(
    variant: SourceVariant,
    period: Node<'_, '_>,
    window: &PeriodWindow,
    situation: Option<&'static str>,
    out: &mut ParsedDocument,
) {
    let mut parsed: BTreeMap<u32, (Decimal, Option<Decimal>)> = BTreeMap::new();
    for (position, point) in points(variant, period, out) {
        let quantity = match xml::child_text(point, "quantity") {
            Some(raw) => match parse_decimal(raw) {
                Some(q) => q,
                None => {
                    out.reject(variant, Some("imbalance_mwh"), "non-numeric value", raw);
                    continue;
                }
            },
            None => Decimal::ZERO,
        };
        let difference = match xml::child_text(point, "secondaryQuantity") {
            Some(raw) => {
                let parsed = parse_decimal(raw);
                if parsed.is_none() {
                    out.reject(variant, Some("difference_mwh"), "non-numeric value", raw);
                }
                parsed
            }
            None => None,
        };
        parsed.insert(position, (quantity, difference));
    }

    let mut current: Option<(Decimal, Option<Decimal>)> = None;
    for position in 1..=window.positions() {
        if let Some(values) = parsed.get(&position) {
            current = Some(*values);
        }
        let Some((quantity, difference)) = current else {
            continue;
        };

        let instant = window.instant(position);
        out.push(RawSample::new(variant, "imbalance_mwh", instant, quantity));
        if let Some(difference) = difference {
            out.push(RawSample::new(variant, "difference_mwh", instant, difference));
        }
        if let Some(situation) = situation {
            out.push(RawSample::new(variant, "situation", instant, Value::from(situation)));
        }
    }
}

/// A75 values keyed by (instant, field).
///
/// Finer resolution replaces coarser; equal resolutions add up, since
/// several production types share one column.
#[derive(Debug, Default)]
struct GenerationAccumulator {
    values: BTreeMap<(DateTime<Utc>, &'static str), (Decimal, i64)>,
}

impl GenerationAccumulator {
    fn add(&mut self, instant: DateTime<Utc>, field: &'static str, minutes: i64, value: Decimal) {
        self.values
            .entry((instant, field))
            .and_modify(|(current, resolution)| {
                if minutes < *resolution {
                    *current = value;
                    *resolution = minutes;
                } else if minutes == *resolution {
                    *current += value;
                }
            })
            .or_insert((value, minutes));
    }

    fn emit(self, variant: SourceVariant, out: &mut ParsedDocument) {
        for ((instant, field), (value, _)) in self.values {
            out.push(RawSample::new(variant, field, instant, value));
        }
    }
}
