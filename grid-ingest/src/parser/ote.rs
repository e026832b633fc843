//! OTE day-ahead market workbook
//!
//! The results sheet has a free-form preamble; the header row is found by
//! its leading cell. From 2025-10-01 the sheet is quarter-hourly (`Period`
//! column), before that hourly (`Hour` column) and each hour is spread
//! over its four quarter-hours.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Cursor;
use std::str::FromStr;

use super::xml::parse_decimal;
use super::{ParseContext, ParseError, ParseResult, SourceVariant};
use crate::calendar::PeriodCalendar;
use crate::schema::{ParsedDocument, RawSample};

/// Worksheet holding the Czech day-ahead results
pub const OTE_SHEET: &str = "Day-Ahead Market CZ Results";

const QUARTER_COLUMNS: &[(&str, &str)] = &[
    ("15 min price (EUR/MWh)", "price_15min_eur_mwh"),
    ("Volume (MWh)", "volume_mwh"),
    ("Purchase 15min products (MWh)", "purchase_15min_products_mwh"),
    ("Purchase 60min products (MWh)", "purchase_60min_products_mwh"),
    ("Sale 15min products (MWh)", "sale_15min_products_mwh"),
    ("Sale 60min products (MWh)", "sale_60min_products_mwh"),
    ("Saldo DM (MWh)", "saldo_dm_mwh"),
    ("Export (MWh)", "export_mwh"),
    ("Import (MWh)", "import_mwh"),
    ("60 min price reference (EUR/MWh)", "price_60min_ref_eur_mwh"),
];

/// A worksheet cell reduced to what the parser needs
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Number(Decimal),
    Text(String),
}

impl SheetCell {
    fn text(&self) -> Option<String> {
        match self {
            SheetCell::Text(s) => Some(s.split_whitespace().collect::<Vec<_>>().join(" ")),
            SheetCell::Number(n) => Some(n.to_string()),
            SheetCell::Empty => None,
        }
    }

    /// Numeric value; text cells go through the lenient number parser
    fn number(&self) -> Result<Option<Decimal>, String> {
        match self {
            SheetCell::Empty => Ok(None),
            SheetCell::Number(n) => Ok(Some(*n)),
            SheetCell::Text(s) if s.trim().is_empty() => Ok(None),
            SheetCell::Text(s) => parse_decimal(s).map(Some).ok_or_else(|| s.clone()),
        }
    }

    fn index(&self) -> Option<u32> {
        match self.number() {
            Ok(Some(n)) if n.fract().is_zero() => n.to_u32(),
            _ => None,
        }
    }
}

impl From<&Data> for SheetCell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => SheetCell::Empty,
            Data::Int(i) => SheetCell::Number(Decimal::from(*i)),
            Data::Float(f) => Decimal::from_str(&f.to_string())
                .or_else(|_| Decimal::try_from(*f))
                .map(SheetCell::Number)
                .unwrap_or(SheetCell::Empty),
            Data::String(s) => SheetCell::Text(s.clone()),
            other => SheetCell::Text(other.to_string()),
        }
    }
}

/// Read the results sheet of an xlsx workbook
pub fn read_workbook(bytes: &[u8]) -> ParseResult<Vec<Vec<SheetCell>>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::MalformedDocument(format!("unreadable workbook: {}", e)))?;
    let range = workbook
        .worksheet_range(OTE_SHEET)
        .map_err(|e| ParseError::MalformedDocument(format!("sheet '{}': {}", OTE_SHEET, e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(SheetCell::from).collect())
        .collect())
}

pub(super) fn parse(
    variant: SourceVariant,
    body: &[u8],
    ctx: &ParseContext<'_>,
) -> ParseResult<ParsedDocument> {
    let trade_date = ctx.trade_date.ok_or_else(|| {
        ParseError::MalformedDocument("day-ahead workbook parsed without a trade date".into())
    })?;
    let rows = read_workbook(body)?;
    parse_rows(variant, &rows, trade_date, ctx.calendar)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Quarter,
    Hourly,
}

/// Header row index, layout and normalised column names
fn find_header(rows: &[Vec<SheetCell>]) -> Option<(usize, Layout, HashMap<String, usize>)> {
    rows.iter().enumerate().find_map(|(index, row)| {
        let first = row.iter().find_map(SheetCell::text)?;
        let layout = match first.as_str() {
            "Period" => Layout::Quarter,
            "Hour" => Layout::Hourly,
            _ => return None,
        };
        let columns = row
            .iter()
            .enumerate()
            .filter_map(|(col, cell)| cell.text().map(|name| (name, col)))
            .collect();
        Some((index, layout, columns))
    })
}

/// Parse the cells of the results sheet for one trade date
pub(crate) fn parse_rows(
    variant: SourceVariant,
    rows: &[Vec<SheetCell>],
    trade_date: NaiveDate,
    calendar: &PeriodCalendar,
) -> ParseResult<ParsedDocument> {
    let (header, layout, columns) = find_header(rows).ok_or_else(|| {
        ParseError::MalformedDocument("no 'Period' or 'Hour' header row in results sheet".into())
    })?;

    let mut out = ParsedDocument::default();
    let body = &rows[header + 1..];
    match layout {
        Layout::Quarter => quarter_rows(variant, body, &columns, trade_date, calendar, &mut out),
        Layout::Hourly => hourly_rows(variant, body, &columns, trade_date, calendar, &mut out),
    }
    Ok(out)
}

static EMPTY: SheetCell = SheetCell::Empty;

fn cell<'a>(row: &'a [SheetCell], columns: &HashMap<String, usize>, names: &[&str]) -> &'a SheetCell {
    names
        .iter()
        .find_map(|name| columns.get(*name))
        .and_then(|&col| row.get(col))
        .unwrap_or(&EMPTY)
}

fn period_instant(
    variant: SourceVariant,
    calendar: &PeriodCalendar,
    trade_date: NaiveDate,
    period: u32,
    out: &mut ParsedDocument,
) -> Option<DateTime<Utc>> {
    match calendar.period_start(trade_date, period) {
        Ok(instant) => Some(instant),
        Err(e) => {
            out.reject(variant, None, e.to_string(), period.to_string());
            None
        }
    }
}

fn quarter_rows(
    variant: SourceVariant,
    rows: &[Vec<SheetCell>],
    columns: &HashMap<String, usize>,
    trade_date: NaiveDate,
    calendar: &PeriodCalendar,
    out: &mut ParsedDocument,
) {
    for row in rows {
        // Blank spacer rows and footnotes carry no period number.
        let Some(period) = cell(row, columns, &["Period"]).index() else {
            continue;
        };
        let Some(instant) = period_instant(variant, calendar, trade_date, period, out) else {
            continue;
        };

        for &(column, field) in QUARTER_COLUMNS {
            match cell(row, columns, &[column]).number() {
                Ok(Some(value)) => out.push(RawSample::new(variant, field, instant, value)),
                Ok(None) => {}
                Err(raw) => out.reject(variant, Some(field), "non-numeric value", raw),
            }
        }
        out.push(RawSample::new(variant, "is_15min", instant, true));
    }
}

fn hourly_rows(
    variant: SourceVariant,
    rows: &[Vec<SheetCell>],
    columns: &HashMap<String, usize>,
    trade_date: NaiveDate,
    calendar: &PeriodCalendar,
    out: &mut ParsedDocument,
) {
    let quarter = Decimal::from(4);

    for row in rows {
        let volume_cell = cell(row, columns, &["Volume (MWh)", "Volume"]);
        if volume_cell.text().as_deref() == Some("Sale") {
            continue;
        }
        let Some(hour) = cell(row, columns, &["Hour"]).index().filter(|h| *h > 0) else {
            continue;
        };

        let mut read = |names: &[&str], field: &'static str| match cell(row, columns, names).number() {
            Ok(value) => value,
            Err(raw) => {
                out.reject(variant, Some(field), "non-numeric value", raw);
                None
            }
        };
        let price = read(&["Price (EUR/MWh)"], "price_15min_eur_mwh");
        let volume = read(&["Volume (MWh)", "Volume"], "volume_mwh").map(|v| v / quarter);
        let saldo = read(&["Saldo DM", "Saldo DM (MWh)"], "saldo_dm_mwh").map(|v| v / quarter);
        let export = read(&["Export", "Export (MWh)"], "export_mwh").map(|v| v / quarter);
        let import = read(&["Import", "Import (MWh)"], "import_mwh").map(|v| v / quarter);

        let values: [(&'static str, Option<Decimal>); 10] = [
            ("price_15min_eur_mwh", price),
            ("price_60min_ref_eur_mwh", price),
            ("volume_mwh", volume),
            ("purchase_15min_products_mwh", Some(Decimal::ZERO)),
            ("purchase_60min_products_mwh", volume),
            ("sale_15min_products_mwh", Some(Decimal::ZERO)),
            ("sale_60min_products_mwh", volume),
            ("saldo_dm_mwh", saldo),
            ("export_mwh", export),
            ("import_mwh", import),
        ];

        for q in 0..4 {
            let period = (hour - 1) * 4 + q + 1;
            let Some(instant) = period_instant(variant, calendar, trade_date, period, out) else {
                continue;
            };
            for (field, value) in values {
                if let Some(value) = value {
                    out.push(RawSample::new(variant, field, instant, value));
                }
            }
            out.push(RawSample::new(variant, "is_15min", instant, false));
        }
    }
}
