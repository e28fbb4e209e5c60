//! Accumulates per-period extraction results and persists them as
//! range-named CSV tables. Also provides the offline merge mode that
//! rebuilds the same output from previously downloaded per-period files.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::ScraperError;

/// One extracted field, kept in the shape it parsed into.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numeric(f64),
    /// A duration such as "14h 20m", normalized to total minutes.
    Minutes(i64),
    /// Raw text that matched neither form; retained for diagnosis.
    Unparseable(String),
}

impl FieldValue {
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Numeric(value) => value.to_string(),
            FieldValue::Minutes(minutes) => minutes.to_string(),
            FieldValue::Unparseable(raw) => raw.clone(),
        }
    }
}

/// Extracted values by canonical key; `None` marks a field whose label was
/// absent from the page.
pub type DailyRecord = BTreeMap<String, Option<FieldValue>>;

/// Deterministic artifact name from the realized date span.
pub fn table_file_name(kind: &str, min: NaiveDate, max: NaiveDate) -> String {
    format!(
        "{}_{}_{}.csv",
        kind,
        min.format("%Y%m%d"),
        max.format("%Y%m%d")
    )
}

/// Collects daily and hourly rows over a run and writes both tables.
///
/// Daily rows are keyed by date, so re-recording a date replaces it and the
/// saved table is always sorted ascending regardless of visit order.
#[derive(Debug)]
pub struct RunAggregator {
    columns: Vec<String>,
    daily: BTreeMap<NaiveDate, DailyRecord>,
    hourly_columns: Option<Vec<String>>,
    hourly: Vec<(NaiveDate, Vec<String>)>,
}

impl RunAggregator {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            daily: BTreeMap::new(),
            hourly_columns: None,
            hourly: Vec::new(),
        }
    }

    pub fn record_daily(&mut self, date: NaiveDate, record: DailyRecord) {
        self.daily.insert(date, record);
    }

    /// Stores one period's intra-day rows. Column headers are captured from
    /// the first period; later drift is reported but the first set is kept so
    /// the output stays rectangular.
    pub fn record_hourly(&mut self, date: NaiveDate, columns: Vec<String>, rows: Vec<Vec<String>>) {
        match &self.hourly_columns {
            None => self.hourly_columns = Some(columns),
            Some(existing) => {
                if *existing != columns {
                    warn!(
                        "hourly column headers changed on {}: {:?} vs {:?}",
                        date, columns, existing
                    );
                }
            }
        }
        for row in rows {
            self.hourly.push((date, row));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }

    /// Realized `(min, max)` of the recorded daily dates.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.daily.keys().next()?;
        let max = self.daily.keys().next_back()?;
        Some((*min, *max))
    }

    /// Writes the daily table to `dir` and returns the file path.
    pub fn save_daily(&self, dir: &Path) -> Result<PathBuf, ScraperError> {
        let (min, max) = self
            .date_span()
            .ok_or_else(|| ScraperError::EmptyAggregation(dir.to_path_buf()))?;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(table_file_name("daily", min, max));
        let mut writer = csv::Writer::from_path(&path)?;

        let mut header = vec!["date".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (date, record) in &self.daily {
            let mut row = vec![date.format("%Y-%m-%d").to_string()];
            for column in &self.columns {
                let cell = record
                    .get(column)
                    .and_then(|value| value.as_ref())
                    .map(|value| value.to_cell())
                    .unwrap_or_default();
                row.push(cell);
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;

        info!("Saved {} daily rows to {}", self.daily.len(), path.display());
        Ok(path)
    }

    /// Writes the hourly table, if any rows were recorded. The source tables
    /// carry no date of their own, so the owning date is appended as a final
    /// `Date` column.
    pub fn save_hourly(&self, dir: &Path) -> Result<Option<PathBuf>, ScraperError> {
        if self.hourly.is_empty() {
            return Ok(None);
        }

        let mut rows: Vec<&(NaiveDate, Vec<String>)> = self.hourly.iter().collect();
        rows.sort_by_key(|(date, _)| *date);
        let min = rows[0].0;
        let max = rows[rows.len() - 1].0;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(table_file_name("hourly", min, max));
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&path)?;

        if let Some(columns) = &self.hourly_columns {
            let mut header = columns.clone();
            header.push("Date".to_string());
            writer.write_record(&header)?;
        }

        for (date, cells) in rows {
            let mut row = cells.clone();
            row.push(date.format("%Y-%m-%d").to_string());
            writer.write_record(&row)?;
        }
        writer.flush()?;

        info!(
            "Saved {} hourly rows to {}",
            self.hourly.len(),
            path.display()
        );
        Ok(Some(path))
    }
}

/// Output of [`merge_artifacts`]: one table keyed by date, ready to persist
/// under the same naming scheme a live run would have used.
#[derive(Debug)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: BTreeMap<NaiveDate, Vec<String>>,
    pub sources: Vec<PathBuf>,
}

impl MergedTable {
    pub fn save(&self, dir: &Path, kind: &str) -> Result<PathBuf, ScraperError> {
        let min = self.rows.keys().next().copied();
        let max = self.rows.keys().next_back().copied();
        let (min, max) = match (min, max) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(ScraperError::EmptyAggregation(dir.to_path_buf())),
        };

        std::fs::create_dir_all(dir)?;
        let path = dir.join(table_file_name(kind, min, max));
        let mut writer = csv::Writer::from_path(&path)?;

        writer.write_record(&self.columns)?;
        for row in self.rows.values() {
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!("Saved {} merged rows to {}", self.rows.len(), path.display());
        Ok(path)
    }
}

/// Combines every CSV in `dir` into one date-keyed table.
///
/// Files are visited in name order; the first row seen for a date wins.
/// Rows whose first cell does not parse as a date are reported and skipped.
pub fn merge_artifacts(dir: &Path) -> Result<MergedTable, ScraperError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ScraperError::EmptyAggregation(dir.to_path_buf()));
    }
    info!("Merging {} artifact files from {}", files.len(), dir.display());

    let mut columns: Option<Vec<String>> = None;
    let mut rows: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();

    for path in &files {
        debug!("reading {}", path.display());
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        match &columns {
            None => columns = Some(headers),
            Some(existing) => {
                if *existing != headers {
                    warn!(
                        "column headers in {} differ from the first file; keeping the first set",
                        path.display()
                    );
                }
            }
        }

        for result in reader.records() {
            let record = result?;
            let date_text = match record.get(0) {
                Some(text) => text.trim(),
                None => continue,
            };
            let date = match NaiveDate::parse_from_str(date_text, "%Y-%m-%d") {
                Ok(date) => date,
                Err(_) => {
                    warn!(
                        "skipping row with unparseable date {:?} in {}",
                        date_text,
                        path.display()
                    );
                    continue;
                }
            };

            match rows.entry(date) {
                Entry::Vacant(slot) => {
                    slot.insert(record.iter().map(String::from).collect());
                }
                Entry::Occupied(_) => {
                    debug!("duplicate row for {} in {}", date, path.display());
                }
            }
        }
    }

    if rows.is_empty() {
        return Err(ScraperError::EmptyAggregation(dir.to_path_buf()));
    }

    Ok(MergedTable {
        columns: columns.unwrap_or_default(),
        rows,
        sources: files,
    })
}
