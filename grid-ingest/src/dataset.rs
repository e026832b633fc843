//! Catalog of ingestible datasets
//!
//! A [`Dataset`] knows which documents to request for a chunk, which tables
//! its rows land in and how parsed samples become rows. Everything here is
//! a pure function of its inputs; fetching and writing happen elsewhere.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::aggregate::IntervalAggregator;
use crate::calendar::{PeriodCalendar, PeriodKey};
use crate::combine::{Combiner, FieldSpec};
use crate::parser::{
    CepsDataset, FlowDirection, ParseError, Provider, SourceVariant, BALANCING_FIELDS,
    GENERATION_FIELDS, IMBALANCE_PRICE_FIELDS, OTE_DAY_AHEAD_FIELDS,
};
use crate::provider::DocumentRequest;
use crate::reference::{AreaReference, AreaTable, Neighbor};
use crate::schema::{NormalizedRecord, ParsedDocument, RawSample, Value};
use crate::storage::{Batch, Cell, Column, ColumnType, Partitioning, Row, StoreResult, TableTarget};

/// Net of all border flows, derived after the merge
pub const FLOW_TOTAL_FIELD: &str = "flow_total_net_mw";

/// A dataset that can be run or backfilled on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dataset {
    EntsoeImbalance,
    EntsoeLoad,
    EntsoeGeneration,
    EntsoeBalancing,
    EntsoeFlows,
    Ceps(CepsDataset),
    OteDayAhead,
}

/// A fetched document together with the request that produced it
#[derive(Debug, Clone)]
pub struct ParsedPart {
    pub request: DocumentRequest,
    pub parsed: ParsedDocument,
}

impl Dataset {
    pub const ALL: [Dataset; 10] = [
        Dataset::EntsoeImbalance,
        Dataset::EntsoeLoad,
        Dataset::EntsoeGeneration,
        Dataset::EntsoeBalancing,
        Dataset::EntsoeFlows,
        Dataset::Ceps(CepsDataset::Imbalance),
        Dataset::Ceps(CepsDataset::RePrice),
        Dataset::Ceps(CepsDataset::SvrActivation),
        Dataset::Ceps(CepsDataset::ExportImportSvr),
        Dataset::OteDayAhead,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dataset::EntsoeImbalance => "entsoe-imbalance",
            Dataset::EntsoeLoad => "entsoe-load",
            Dataset::EntsoeGeneration => "entsoe-generation",
            Dataset::EntsoeBalancing => "entsoe-balancing",
            Dataset::EntsoeFlows => "entsoe-flows",
            Dataset::Ceps(CepsDataset::Imbalance) => "ceps-imbalance",
            Dataset::Ceps(CepsDataset::RePrice) => "ceps-re-price",
            Dataset::Ceps(CepsDataset::SvrActivation) => "ceps-svr-activation",
            Dataset::Ceps(CepsDataset::ExportImportSvr) => "ceps-export-import-svr",
            Dataset::OteDayAhead => "ote-day-ahead",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Dataset::EntsoeImbalance => "Imbalance prices (A85) and volumes (A86) per control area",
            Dataset::EntsoeLoad => "Actual load and day-ahead load forecast (A65)",
            Dataset::EntsoeGeneration => "Actual generation per production type (A75)",
            Dataset::EntsoeBalancing => "Activated balancing energy prices (A84)",
            Dataset::EntsoeFlows => "Cross-border physical flows on Czech borders (A11)",
            Dataset::Ceps(CepsDataset::Imbalance) => "CEPS system imbalance, 1-minute",
            Dataset::Ceps(CepsDataset::RePrice) => "CEPS regulation energy prices",
            Dataset::Ceps(CepsDataset::SvrActivation) => "CEPS activated reserves, 1-minute",
            Dataset::Ceps(CepsDataset::ExportImportSvr) => "CEPS cross-border reserve exchange",
            Dataset::OteDayAhead => "OTE day-ahead market results",
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            Dataset::Ceps(_) => Provider::Ceps,
            Dataset::OteDayAhead => Provider::Ote,
            _ => Provider::Entsoe,
        }
    }

    /// Published per trade date rather than per time range
    pub fn is_daily(self) -> bool {
        matches!(self, Dataset::OteDayAhead)
    }

    /// Merge rules of a combined dataset; empty for aggregated ones.
    pub fn field_specs(self) -> Vec<FieldSpec> {
        match self {
            Dataset::EntsoeImbalance => {
                let mut specs: Vec<FieldSpec> = IMBALANCE_PRICE_FIELDS
                    .iter()
                    .map(|&f| match f {
                        "status" => FieldSpec::nullable(f),
                        _ => FieldSpec::zero(f),
                    })
                    .collect();
                specs.push(FieldSpec::zero("imbalance_mwh"));
                specs.push(FieldSpec::nullable("difference_mwh"));
                specs.push(FieldSpec::nullable("situation"));
                specs
            }
            Dataset::EntsoeLoad => vec![
                FieldSpec::nullable("actual_load_mw"),
                FieldSpec::nullable("forecast_load_mw"),
            ],
            Dataset::EntsoeGeneration => GENERATION_FIELDS.iter().map(|&f| FieldSpec::zero(f)).collect(),
            Dataset::EntsoeBalancing => BALANCING_FIELDS.iter().map(|&f| FieldSpec::nullable(f)).collect(),
            Dataset::EntsoeFlows => Neighbor::ALL
                .iter()
                .map(|n| FieldSpec::summed(n.flow_field()))
                .collect(),
            Dataset::OteDayAhead => OTE_DAY_AHEAD_FIELDS
                .iter()
                .map(|&f| FieldSpec::nullable(f))
                .collect(),
            Dataset::Ceps(_) => Vec::new(),
        }
    }

    /// Table whose latest period tells auto mode where to resume
    pub fn primary_target(self, areas: &AreaTable) -> TableTarget {
        match self {
            Dataset::Ceps(dataset) => ceps_quarter_target(dataset),
            Dataset::OteDayAhead => ote_target(),
            _ => {
                let mut fields: Vec<&'static str> = self.field_specs().iter().map(|s| s.name).collect();
                if self == Dataset::EntsoeFlows {
                    fields.push(FLOW_TOTAL_FIELD);
                }
                entsoe_target(self.entsoe_table(), &fields, areas)
            }
        }
    }

    /// Every table the dataset writes to, primary first
    pub fn targets(self, areas: &AreaTable) -> Vec<TableTarget> {
        match self {
            Dataset::Ceps(dataset) => vec![ceps_quarter_target(dataset), ceps_minute_target(dataset)],
            _ => vec![self.primary_target(areas)],
        }
    }

    fn entsoe_table(self) -> &'static str {
        match self {
            Dataset::EntsoeImbalance => "entsoe_imbalance_prices",
            Dataset::EntsoeLoad => "entsoe_load",
            Dataset::EntsoeGeneration => "entsoe_generation_actual",
            Dataset::EntsoeBalancing => "entsoe_balancing_energy",
            Dataset::EntsoeFlows => "entsoe_cross_border_flows",
            Dataset::Ceps(_) | Dataset::OteDayAhead => "",
        }
    }

    /// Documents to fetch for `[start, end)`
    pub fn requests(
        self,
        calendar: &PeriodCalendar,
        areas: &AreaTable,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<DocumentRequest> {
        let per_area = |sources: &[SourceVariant]| -> Vec<DocumentRequest> {
            areas
                .active()
                .flat_map(|area| {
                    sources
                        .iter()
                        .map(move |&source| DocumentRequest::new(source, *area, start, end))
                })
                .collect()
        };

        match self {
            Dataset::EntsoeImbalance => per_area(&[
                SourceVariant::EntsoeImbalancePrices,
                SourceVariant::EntsoeImbalanceVolumes,
            ]),
            Dataset::EntsoeLoad => per_area(&[SourceVariant::EntsoeActualLoad, SourceVariant::EntsoeLoadForecast]),
            Dataset::EntsoeGeneration => per_area(&[SourceVariant::EntsoeGeneration]),
            Dataset::EntsoeBalancing => per_area(&[SourceVariant::EntsoeBalancingEnergy]),
            Dataset::EntsoeFlows => {
                let home = *areas.home();
                let mut requests = Vec::new();
                for neighbor in Neighbor::ALL {
                    let Some(counterpart) = areas.neighbor(neighbor) else {
                        continue;
                    };
                    for direction in [FlowDirection::Import, FlowDirection::Export] {
                        let source = SourceVariant::EntsoePhysicalFlow { neighbor, direction };
                        requests.push(DocumentRequest::new(source, home, start, end).with_counterpart(*counterpart));
                    }
                }
                requests
            }
            Dataset::Ceps(dataset) => {
                vec![DocumentRequest::new(SourceVariant::Ceps(dataset), *areas.home(), start, end)]
            }
            Dataset::OteDayAhead => {
                let home = *areas.home();
                let mut requests = Vec::new();
                let mut date = calendar.trade_date(start);
                while calendar.day_start(date) < end {
                    let Some(next) = date.succ_opt() else {
                        break;
                    };
                    requests.push(
                        DocumentRequest::new(
                            SourceVariant::OteDayAhead,
                            home,
                            calendar.day_start(date),
                            calendar.day_start(next),
                        )
                        .for_trade_date(date),
                    );
                    date = next;
                }
                requests
            }
        }
    }

    /// Turn parsed documents into batches, one per target table.
    ///
    /// Samples outside `[start, end)` are left for the chunk that owns them.
    pub fn prepare(
        self,
        calendar: &PeriodCalendar,
        areas: &AreaTable,
        parts: &[ParsedPart],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Batch>> {
        let in_window = |s: &&RawSample| s.instant >= start && s.instant < end;

        if let Dataset::Ceps(dataset) = self {
            let samples: Vec<RawSample> = parts
                .iter()
                .flat_map(|p| p.parsed.samples.iter())
                .filter(in_window)
                .cloned()
                .collect();
            let home = areas.home();

            return Ok(vec![
                Batch::new(
                    ceps_quarter_target(dataset),
                    quarter_rows(calendar, dataset, home.id, &samples, start, end),
                )?,
                Batch::new(ceps_minute_target(dataset), minute_rows(calendar, dataset, &samples))?,
            ]);
        }

        let combiner = Combiner::new(self.field_specs());
        let target = self.primary_target(areas);

        let mut by_area: BTreeMap<i32, (AreaReference, Vec<&RawSample>)> = BTreeMap::new();
        for part in parts {
            by_area
                .entry(part.request.area.id)
                .or_insert_with(|| (part.request.area, Vec::new()))
                .1
                .extend(part.parsed.samples.iter().filter(in_window));
        }

        let mut rows = Vec::new();
        for (area, samples) in by_area.values() {
            for mut record in combiner.combine(calendar, area, samples.iter().copied()) {
                if self == Dataset::EntsoeFlows {
                    add_net_total(&mut record);
                }
                rows.push(record_row(&target, &record));
            }
        }

        Ok(vec![Batch::new(target, rows)?])
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dataset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| ParseError::UnknownDataset(s.to_string()))
    }
}

fn column_type(field: &str) -> ColumnType {
    match field {
        "situation" | "status" => ColumnType::Text,
        "is_15min" => ColumnType::Boolean,
        _ => ColumnType::Numeric,
    }
}

fn period_columns() -> Vec<Column> {
    vec![
        Column::new("trade_date", ColumnType::Date),
        Column::new("period", ColumnType::Integer),
        Column::new("time_interval", ColumnType::Text),
    ]
}

fn entsoe_target(table: &str, fields: &[&'static str], areas: &AreaTable) -> TableTarget {
    let mut columns = period_columns();
    columns.push(Column::new("area_id", ColumnType::Integer));
    columns.push(Column::new("country_code", ColumnType::Text));
    columns.extend(fields.iter().map(|&f| Column::new(f, column_type(f))));

    TableTarget::new(table, columns, &["trade_date", "period", "area_id", "country_code"]).partitioned(
        Partitioning::List {
            column: "country_code".to_string(),
            values: areas.countries().into_iter().map(String::from).collect(),
        },
    )
}

fn ceps_quarter_target(dataset: CepsDataset) -> TableTarget {
    let mut columns = period_columns();
    columns.push(Column::new("area_id", ColumnType::Integer));
    for field in dataset.fields() {
        columns.push(Column::new(format!("{}_mean", field), ColumnType::Numeric));
        columns.push(Column::new(format!("{}_median", field), ColumnType::Numeric));
        columns.push(Column::new(format!("{}_last_at_interval", field), ColumnType::Numeric));
    }

    TableTarget::new(
        format!("ceps_{}_15min", dataset.id()),
        columns,
        &["trade_date", "period", "area_id"],
    )
    .partitioned(Partitioning::YearRange {
        column: "trade_date".to_string(),
    })
}

fn ceps_minute_target(dataset: CepsDataset) -> TableTarget {
    let mut columns = period_columns();
    columns.push(Column::new("delivery_timestamp", ColumnType::Timestamp));
    columns.extend(dataset.fields().iter().map(|&f| Column::new(f, ColumnType::Numeric)));

    TableTarget::new(
        format!("ceps_{}_1min", dataset.id()),
        columns,
        &["trade_date", "delivery_timestamp"],
    )
    .partitioned(Partitioning::YearRange {
        column: "trade_date".to_string(),
    })
}

fn ote_target() -> TableTarget {
    let mut columns = period_columns();
    columns.push(Column::new("area_id", ColumnType::Integer));
    columns.extend(OTE_DAY_AHEAD_FIELDS.iter().map(|&f| Column::new(f, column_type(f))));

    TableTarget::new("ote_day_ahead_prices", columns, &["trade_date", "period", "area_id"])
}

fn key_cells(key: &PeriodKey) -> Row {
    vec![
        Cell::Date(key.trade_date),
        Cell::Int(key.period as i32),
        Cell::Text(Some(key.time_interval.clone())),
    ]
}

fn value_cell(ty: ColumnType, value: Option<&Value>) -> Cell {
    match ty {
        ColumnType::Numeric => Cell::Number(value.and_then(Value::as_number)),
        ColumnType::Boolean => Cell::Flag(value.and_then(Value::as_flag)),
        _ => Cell::Text(value.map(ToString::to_string)),
    }
}

fn record_row(target: &TableTarget, record: &NormalizedRecord) -> Row {
    target
        .columns
        .iter()
        .map(|column| match column.name.as_str() {
            "trade_date" => Cell::Date(record.key.trade_date),
            "period" => Cell::Int(record.key.period as i32),
            "time_interval" => Cell::Text(Some(record.key.time_interval.clone())),
            "area_id" => Cell::Int(record.area_id),
            "country_code" => Cell::Text(Some(record.country_code.clone())),
            name => value_cell(column.ty, record.get(name)),
        })
        .collect()
}

/// Sum of the non-null border flows; null when no border reported.
fn add_net_total(record: &mut NormalizedRecord) {
    let flows: Vec<Decimal> = Neighbor::ALL
        .iter()
        .filter_map(|n| record.number(n.flow_field()))
        .collect();
    let total = if flows.is_empty() {
        None
    } else {
        Some(Value::Number(flows.into_iter().sum()))
    };
    record.fields.insert(FLOW_TOTAL_FIELD, total);
}

fn quarter_rows(
    calendar: &PeriodCalendar,
    dataset: CepsDataset,
    area_id: i32,
    samples: &[RawSample],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Row> {
    IntervalAggregator::new(calendar, dataset.fields())
        .aggregate(area_id, samples, start, end)
        .into_iter()
        .map(|record| {
            let mut row = key_cells(&record.key);
            row.push(Cell::Int(record.area_id));
            for field in dataset.fields() {
                let stats = record.stats(field).cloned().unwrap_or_default();
                row.push(Cell::Number(stats.mean));
                row.push(Cell::Number(stats.median));
                row.push(Cell::Number(stats.last));
            }
            row
        })
        .collect()
}

/// One row per distinct minute; a repeated instant keeps its latest values.
fn minute_rows(calendar: &PeriodCalendar, dataset: CepsDataset, samples: &[RawSample]) -> Vec<Row> {
    let mut minutes: BTreeMap<DateTime<Utc>, HashMap<&'static str, Option<Decimal>>> = BTreeMap::new();
    for sample in samples {
        minutes
            .entry(sample.instant)
            .or_default()
            .insert(sample.field, sample.value.as_number());
    }

    minutes
        .into_iter()
        .map(|(instant, values)| {
            let mut row = key_cells(&calendar.period_key(instant));
            row.push(Cell::Timestamp(instant));
            for field in dataset.fields() {
                row.push(Cell::Number(values.get(field).copied().flatten()));
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn part(request: DocumentRequest, samples: Vec<RawSample>) -> ParsedPart {
        ParsedPart {
            request,
            parsed: ParsedDocument {
                samples,
                rejected: Vec::new(),
            },
        }
    }

    fn cell<'a>(batch: &'a Batch, row: usize, column: &str) -> &'a Cell {
        let index = batch.target.column_index(column).unwrap();
        &batch.rows[row][index]
    }

    #[test]
    fn test_names_round_trip() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.name().parse::<Dataset>().unwrap(), dataset);
        }
        assert!(matches!(
            "entsoe-prices".parse::<Dataset>(),
            Err(ParseError::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_targets_declare_their_keys() {
        let areas = AreaTable::standard();
        for dataset in Dataset::ALL {
            for target in dataset.targets(&areas) {
                target.validate().unwrap();
                assert!(target.has_column("trade_date"));
                assert!(target.has_column("period"));
                assert!(target.has_column("time_interval"));
            }
        }

        let flows = Dataset::EntsoeFlows.primary_target(&areas);
        assert_eq!(
            flows.conflict_columns,
            vec!["trade_date", "period", "area_id", "country_code"]
        );
        assert!(flows.has_column(FLOW_TOTAL_FIELD));

        let targets = Dataset::Ceps(CepsDataset::RePrice).targets(&areas);
        assert_eq!(targets[0].table, "ceps_re_price_15min");
        assert!(targets[0].has_column("price_afrr_plus_eur_mwh_last_at_interval"));
        assert_eq!(targets[1].table, "ceps_re_price_1min");
        assert_eq!(targets[1].conflict_columns, vec!["trade_date", "delivery_timestamp"]);

        assert_eq!(Dataset::OteDayAhead.primary_target(&areas).partitioning, Partitioning::None);
    }

    #[test]
    fn test_requests_per_dataset() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard().with_active(&["CZ", "AT"]).unwrap();
        let (start, end) = (utc(2025, 11, 9, 23, 0), utc(2025, 11, 16, 23, 0));

        let requests = Dataset::EntsoeImbalance.requests(&calendar, &areas, start, end);
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].source, SourceVariant::EntsoeImbalancePrices);
        assert_eq!(requests[3].area.label, "AT");

        let requests = Dataset::EntsoeFlows.requests(&calendar, &areas, start, end);
        assert_eq!(requests.len(), 8);
        assert!(requests.iter().all(|r| r.area.id == 1 && r.counterpart.is_some()));

        let requests = Dataset::OteDayAhead.requests(&calendar, &areas, start, end);
        assert_eq!(requests.len(), 7);
        assert_eq!(requests[0].trade_date, NaiveDate::from_ymd_opt(2025, 11, 10));
        assert_eq!(requests[6].end, end);
    }

    #[test]
    fn test_ote_requests_cover_fall_back_day() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard();
        let (start, end) = (utc(2025, 10, 25, 22, 0), utc(2025, 10, 26, 23, 0));

        let requests = Dataset::OteDayAhead.requests(&calendar, &areas, start, end);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].end - requests[0].start, chrono::Duration::hours(25));
    }

    #[test]
    fn test_imbalance_defaults() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard();
        let (start, end) = (utc(2025, 11, 10, 7, 0), utc(2025, 11, 10, 8, 0));
        let home = *areas.home();

        let volumes = part(
            DocumentRequest::new(SourceVariant::EntsoeImbalanceVolumes, home, start, end),
            vec![RawSample::new(
                SourceVariant::EntsoeImbalanceVolumes,
                "imbalance_mwh",
                utc(2025, 11, 10, 7, 15),
                dec!(12.5),
            )],
        );

        let batches = Dataset::EntsoeImbalance
            .prepare(&calendar, &areas, &[volumes], start, end)
            .unwrap();
        let batch = &batches[0];

        assert_eq!(batch.len(), 1);
        assert_eq!(cell(batch, 0, "period"), &Cell::Int(34));
        assert_eq!(cell(batch, 0, "imbalance_mwh"), &Cell::Number(Some(dec!(12.5))));
        assert_eq!(cell(batch, 0, "pos_imb_price_czk_mwh"), &Cell::Number(Some(Decimal::ZERO)));
        assert_eq!(cell(batch, 0, "difference_mwh"), &Cell::Number(None));
        assert_eq!(cell(batch, 0, "status"), &Cell::Text(None));
        assert_eq!(cell(batch, 0, "country_code"), &Cell::Text(Some("CZ".to_string())));
    }

    #[test]
    fn test_flows_sum_directions_and_total() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard();
        let (start, end) = (utc(2025, 11, 10, 7, 0), utc(2025, 11, 10, 7, 15));
        let home = *areas.home();
        let instant = utc(2025, 11, 10, 7, 0);

        let flow = |neighbor: Neighbor, direction: FlowDirection, value: Decimal| {
            let source = SourceVariant::EntsoePhysicalFlow { neighbor, direction };
            part(
                DocumentRequest::new(source, home, start, end),
                vec![RawSample::new(source, neighbor.flow_field(), instant, value)],
            )
        };

        let parts = vec![
            flow(Neighbor::De, FlowDirection::Import, dec!(800)),
            flow(Neighbor::De, FlowDirection::Export, dec!(-300)),
            flow(Neighbor::Sk, FlowDirection::Export, dec!(-150)),
        ];

        let batches = Dataset::EntsoeFlows.prepare(&calendar, &areas, &parts, start, end).unwrap();
        let batch = &batches[0];

        assert_eq!(batch.len(), 1);
        assert_eq!(cell(batch, 0, "flow_de_mw"), &Cell::Number(Some(dec!(500))));
        assert_eq!(cell(batch, 0, "flow_sk_mw"), &Cell::Number(Some(dec!(-150))));
        assert_eq!(cell(batch, 0, "flow_at_mw"), &Cell::Number(None));
        assert_eq!(cell(batch, 0, FLOW_TOTAL_FIELD), &Cell::Number(Some(dec!(350))));
    }

    #[test]
    fn test_ceps_minutes_and_quarters() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard();
        let (start, end) = (utc(2025, 11, 10, 7, 0), utc(2025, 11, 10, 7, 30));
        let source = SourceVariant::Ceps(CepsDataset::Imbalance);

        let samples = vec![
            RawSample::new(source, "load_mw", utc(2025, 11, 10, 7, 0), dec!(10)),
            RawSample::new(source, "load_mw", utc(2025, 11, 10, 7, 1), dec!(20)),
            // repeated minute, later value wins
            RawSample::new(source, "load_mw", utc(2025, 11, 10, 7, 1), dec!(30)),
            // outside the chunk
            RawSample::new(source, "load_mw", utc(2025, 11, 10, 7, 30), dec!(99)),
        ];
        let parts = vec![part(
            DocumentRequest::new(source, *areas.home(), start, end),
            samples,
        )];

        let batches = Dataset::Ceps(CepsDataset::Imbalance)
            .prepare(&calendar, &areas, &parts, start, end)
            .unwrap();
        let (quarter, minute) = (&batches[0], &batches[1]);

        assert_eq!(minute.len(), 2);
        assert_eq!(cell(minute, 1, "load_mw"), &Cell::Number(Some(dec!(30))));
        assert_eq!(cell(minute, 1, "delivery_timestamp"), &Cell::Timestamp(utc(2025, 11, 10, 7, 1)));

        assert_eq!(quarter.len(), 2);
        assert_eq!(cell(quarter, 0, "load_mw_mean"), &Cell::Number(Some(dec!(20))));
        assert_eq!(cell(quarter, 0, "load_mw_last_at_interval"), &Cell::Number(Some(dec!(30))));
        assert_eq!(cell(quarter, 1, "load_mw_mean"), &Cell::Number(None));
        assert_eq!(cell(quarter, 1, "period"), &Cell::Int(34));
    }
}
