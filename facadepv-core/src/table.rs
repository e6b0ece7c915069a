//! Raw provider response handling: CSV with leading metadata rows, followed
//! by a header row and data rows.
//!
//! Providers disagree on how they spell timestamps and irradiance columns,
//! so both are resolved through ordered candidate lists rather than
//! provider-specific branching in the pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::PipelineError;
use crate::series::Channel;

/// Tabular provider response after the metadata prelude has been skipped.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Parse a CSV body, skipping `metadata_rows` records before the header.
    pub fn from_csv(body: &str, metadata_rows: usize) -> Result<Self, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());

        let mut records = reader.records();
        for _ in 0..metadata_rows {
            match records.next() {
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(PipelineError::parse(format!("unreadable CSV metadata: {e}")));
                }
                None => {
                    return Err(PipelineError::parse(format!(
                        "response ended inside the {metadata_rows}-row metadata prelude"
                    )));
                }
            }
        }

        let headers = match records.next() {
            Some(Ok(record)) => record.iter().map(|s| s.trim().to_string()).collect(),
            Some(Err(e)) => return Err(PipelineError::parse(format!("unreadable CSV header: {e}"))),
            None => return Err(PipelineError::parse("response contained no header row")),
        };

        let mut rows = Vec::new();
        for record in records {
            let record =
                record.map_err(|e| PipelineError::parse(format!("unreadable CSV row: {e}")))?;
            rows.push(record.iter().map(|s| s.trim().to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    /// Numeric column at the given index; cells that fail to parse become NaN.
    pub fn numeric_column(&self, col: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.get(col).and_then(|s| s.parse::<f64>().ok()).unwrap_or(f64::NAN))
            .collect()
    }

    /// Resolve a physical quantity against a priority-ordered candidate list.
    /// The first header that matches wins.
    pub fn find_column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|name| self.column_index(name))
    }

    /// Like [`find_column`] but failure is a named missing-column error.
    ///
    /// [`find_column`]: RawTable::find_column
    pub fn require_column(&self, quantity: &str, candidates: &[&str]) -> Result<usize, PipelineError> {
        self.find_column(candidates).ok_or_else(|| {
            PipelineError::parse(format!(
                "no {quantity} column found; tried {}",
                candidates.join(", ")
            ))
        })
    }
}

/// One way of locating and parsing the timestamp of each row.
///
/// Providers are inconsistent: some name the time column, some put it first
/// without a stable name, some split it over Year/Month/Day/Hour columns.
/// Strategies are tried in a fixed order; the first whose columns are present
/// is used.
#[derive(Debug, Clone)]
pub enum TimestampStrategy {
    /// A known header name, with a list of accepted datetime formats.
    FixedName { names: &'static [&'static str], formats: &'static [&'static str] },
    /// The first column, whatever it is called.
    FirstColumn { formats: &'static [&'static str] },
    /// Separate Year/Month/Day/Hour columns, optionally with minutes.
    ComposedParts,
}

impl TimestampStrategy {
    fn describe(&self) -> &'static str {
        match self {
            TimestampStrategy::FixedName { .. } => "named time column",
            TimestampStrategy::FirstColumn { .. } => "first column as time",
            TimestampStrategy::ComposedParts => "Year/Month/Day/Hour columns",
        }
    }

    /// Try to extract a timestamp per row. `None` means the strategy does not
    /// apply to this table; rows whose timestamp fails to parse come back as
    /// `None` entries and are dropped by the caller.
    fn extract(&self, table: &RawTable) -> Option<Vec<Option<DateTime<Utc>>>> {
        match self {
            TimestampStrategy::FixedName { names, formats } => {
                let col = table.find_column(names)?;
                Some(parse_column(table, col, formats))
            }
            TimestampStrategy::FirstColumn { formats } => {
                if table.headers.is_empty() {
                    return None;
                }
                Some(parse_column(table, 0, formats))
            }
            TimestampStrategy::ComposedParts => {
                let year = table.find_column(&["Year", "year"])?;
                let month = table.find_column(&["Month", "month"])?;
                let day = table.find_column(&["Day", "day"])?;
                let hour = table.find_column(&["Hour", "hour"])?;
                let minute = table.find_column(&["Minute", "minute"]);

                let parsed = (0..table.row_count())
                    .map(|row| compose_timestamp(table, row, year, month, day, hour, minute))
                    .collect();
                Some(parsed)
            }
        }
    }
}

fn parse_column(
    table: &RawTable,
    col: usize,
    formats: &[&str],
) -> Vec<Option<DateTime<Utc>>> {
    (0..table.row_count())
        .map(|row| table.cell(row, col).and_then(|s| parse_timestamp(s, formats)))
        .collect()
}

fn parse_timestamp(s: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    for format in formats {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ndt.and_utc());
        }
    }
    None
}

fn compose_timestamp(
    table: &RawTable,
    row: usize,
    year: usize,
    month: usize,
    day: usize,
    hour: usize,
    minute: Option<usize>,
) -> Option<DateTime<Utc>> {
    let int = |col: usize| table.cell(row, col).and_then(|s| s.parse::<u32>().ok());

    let y = table.cell(row, year).and_then(|s| s.parse::<i32>().ok())?;
    let date = NaiveDate::from_ymd_opt(y, int(month)?, int(day)?)?;
    let minute = minute.and_then(int).unwrap_or(0);
    Some(date.and_hms_opt(int(hour)?, minute, 0)?.and_utc())
}

/// Run the strategy list against a table.
///
/// Returns the per-row timestamps (rows that failed to parse removed) plus
/// the indices of the surviving rows, so the caller can subset value columns
/// to match. Errors if no strategy applies, or the applicable strategy parses
/// nothing at all.
pub fn detect_timestamps(
    table: &RawTable,
    strategies: &[TimestampStrategy],
) -> Result<(Vec<DateTime<Utc>>, Vec<usize>), PipelineError> {
    for strategy in strategies {
        let Some(parsed) = strategy.extract(table) else {
            continue;
        };

        let mut timestamps = Vec::new();
        let mut kept_rows = Vec::new();
        for (row, ts) in parsed.into_iter().enumerate() {
            if let Some(ts) = ts {
                timestamps.push(ts);
                kept_rows.push(row);
            }
        }

        if timestamps.is_empty() {
            return Err(PipelineError::time_alignment(format!(
                "{} matched but no row parsed as a timestamp",
                strategy.describe()
            )));
        }
        return Ok((timestamps, kept_rows));
    }

    let tried: Vec<&str> = strategies.iter().map(TimestampStrategy::describe).collect();
    Err(PipelineError::parse(format!(
        "no timestamp column found; tried {}",
        tried.join(", ")
    )))
}

/// Candidate header names per quantity, in priority order.
pub mod candidates {
    pub const GHI: &[&str] = &["GHI", "G(h)", "ghi", "Gh"];
    pub const DNI: &[&str] = &["DNI", "Gb(n)", "dni", "Bn"];
    pub const DHI: &[&str] = &["DHI", "Gd(h)", "dhi", "Dh"];
    pub const POA: &[&str] = &["POA", "G(i)", "poa_global", "gti"];
    pub const TEMP_AIR: &[&str] = &["Temperature", "T2m", "temp_air", "Tamb"];
    pub const WIND_SPEED: &[&str] = &["Wind Speed", "WS10m", "wind_speed", "WS"];
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PVGIS_FORMATS: &[&str] = &["%Y%m%d:%H%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

    #[test]
    fn skips_metadata_prelude() {
        let body = "Source: somewhere\nLat: 48.2\ntime,G(i),T2m\n20200601:0010,100.5,21.0\n";
        let table = RawTable::from_csv(body, 2).unwrap();
        assert_eq!(table.headers(), &["time", "G(i)", "T2m"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn truncated_prelude_is_a_parse_error() {
        let err = RawTable::from_csv("only one line\n", 3).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn fixed_name_strategy_parses_pvgis_timestamps() {
        let body = "time,G(i)\n20200601:0010,100.0\n20200601:0110,200.0\n";
        let table = RawTable::from_csv(body, 0).unwrap();

        let strategies = [TimestampStrategy::FixedName {
            names: &["time", "time(UTC)"],
            formats: PVGIS_FORMATS,
        }];
        let (timestamps, rows) = detect_timestamps(&table, &strategies).unwrap();

        assert_eq!(rows, vec![0, 1]);
        assert_eq!(timestamps[0], Utc.with_ymd_and_hms(2020, 6, 1, 0, 10, 0).unwrap());
    }

    #[test]
    fn unparseable_rows_are_dropped() {
        // Trailing explanatory lines after the data block, as PVGIS emits.
        let body = "time,G(i)\n20200601:0010,100.0\nG(i): global irradiance,\n";
        let table = RawTable::from_csv(body, 0).unwrap();

        let strategies =
            [TimestampStrategy::FixedName { names: &["time"], formats: PVGIS_FORMATS }];
        let (timestamps, rows) = detect_timestamps(&table, &strategies).unwrap();
        assert_eq!(timestamps.len(), 1);
        assert_eq!(rows, vec![0]);
    }

    #[test]
    fn first_column_strategy_applies_when_name_unknown() {
        let body = "stamp,value\n2020-06-01 00:00:00,1.5\n";
        let table = RawTable::from_csv(body, 0).unwrap();

        let strategies = [
            TimestampStrategy::FixedName { names: &["time"], formats: PVGIS_FORMATS },
            TimestampStrategy::FirstColumn { formats: PVGIS_FORMATS },
        ];
        let (timestamps, _) = detect_timestamps(&table, &strategies).unwrap();
        assert_eq!(timestamps[0], Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn composed_parts_strategy_builds_timestamps() {
        let body = "Year,Month,Day,Hour,Minute,GHI\n2020,6,1,12,30,800\n";
        let table = RawTable::from_csv(body, 0).unwrap();

        let strategies = [TimestampStrategy::ComposedParts];
        let (timestamps, _) = detect_timestamps(&table, &strategies).unwrap();
        assert_eq!(timestamps[0], Utc.with_ymd_and_hms(2020, 6, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn no_matching_strategy_names_what_was_tried() {
        let body = "a,b\n1,2\n";
        let table = RawTable::from_csv(body, 0).unwrap();

        let strategies = [
            TimestampStrategy::FixedName { names: &["time"], formats: PVGIS_FORMATS },
            TimestampStrategy::ComposedParts,
        ];
        let err = detect_timestamps(&table, &strategies).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("named time column"));
        assert!(msg.contains("Year/Month/Day/Hour"));
    }

    #[test]
    fn column_candidates_resolve_in_priority_order() {
        let body = "time,G(i),GHI\n20200601:0010,1,2\n";
        let table = RawTable::from_csv(body, 0).unwrap();

        // "GHI" is ahead of "G(i)" in the GHI list.
        assert_eq!(table.find_column(candidates::GHI), Some(2));
        assert_eq!(table.find_column(candidates::POA), Some(1));
    }

    #[test]
    fn missing_required_column_is_named() {
        let body = "time,T2m\n20200601:0010,20\n";
        let table = RawTable::from_csv(body, 0).unwrap();

        let err = table.require_column("plane-of-array irradiance", candidates::POA).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("plane-of-array irradiance"));
        assert!(msg.contains("G(i)"));
    }

    #[test]
    fn numeric_cells_fall_back_to_nan() {
        let body = "time,G(i)\n20200601:0010,100.0\n20200601:0110,n/a\n";
        let table = RawTable::from_csv(body, 0).unwrap();
        let col = table.require_column("POA", candidates::POA).unwrap();
        let values = table.numeric_column(col);
        assert_eq!(values[0], 100.0);
        assert!(values[1].is_nan());
    }
}
