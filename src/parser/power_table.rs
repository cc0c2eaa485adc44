//! Streaming parser for exported power/energy tables.
//!
//! The first record is the header (possibly prefixed with a byte-order mark);
//! each following record is one sample row. Rows are read with the `csv`
//! crate as raw byte records, parsed independently and yielded one at a
//! time, so the table is never held in memory as a whole and a cell with
//! bad bytes only loses that cell.

use super::columns::{ColumnRoleMap, ColumnRules, Scope};
use super::wall_clock::WallClockParser;
use crate::utils::error::PowerTableError;
use chrono::{DateTime, Utc};
use csv::{ByteRecord, Reader, ReaderBuilder, Trim};
use log::{debug, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One parsed power table row
///
/// Numeric fields use `f64::NAN` when the cell is missing or unparseable;
/// the row is then only excluded from metrics that need that field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerTableRow {
    /// Cumulative package energy (J)
    pub energy_j: f64,

    /// Instantaneous package power (W)
    pub power_w: f64,

    /// Seconds since the start of the recording
    pub elapsed_s: f64,

    /// Wall-clock instant of the row
    pub wall_clock: Option<DateTime<Utc>>,

    /// Cumulative energy of the scope-selected column (J)
    pub scoped_energy_j: f64,

    /// Power of the scope-selected column (W)
    pub scoped_power_w: f64,
}

impl Default for PowerTableRow {
    fn default() -> Self {
        Self {
            energy_j: f64::NAN,
            power_w: f64::NAN,
            elapsed_s: f64::NAN,
            wall_clock: None,
            scoped_energy_j: f64::NAN,
            scoped_power_w: f64::NAN,
        }
    }
}

/// Counters for locally recovered parse problems
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Data rows yielded
    pub rows: u64,

    /// Numeric cells that failed to parse
    pub unparseable_fields: u64,

    /// Wall-clock cells that failed to parse
    pub unparseable_timestamps: u64,
}

/// CSV reader configured for power tables
///
/// Header is read as an ordinary record; rows may be shorter or longer than
/// the header; cells are trimmed.
pub(crate) fn table_reader<R: Read>(reader: R) -> Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

/// Row-at-a-time power table reader
///
/// **Public** - main entry point for power table parsing
pub struct PowerTableReader<R> {
    records: Reader<R>,
    record: ByteRecord,
    roles: ColumnRoleMap,
    clock: WallClockParser,
    stats: ParseStats,
    finished: bool,
}

impl PowerTableReader<File> {
    /// Open a power table file
    ///
    /// # Errors
    /// * `PowerTableError::Io` - file cannot be opened
    /// * `PowerTableError::Csv` - header cannot be read
    /// * `PowerTableError::EmptyInput` - file has no header line
    /// * `PowerTableError::MissingColumns` - no energy/power column in the header
    pub fn open(
        path: impl AsRef<Path>,
        rules: &ColumnRules,
        scope: Scope,
        clock: WallClockParser,
    ) -> Result<Self, PowerTableError> {
        let path = path.as_ref();
        debug!("Opening power table: {}", path.display());
        let file = File::open(path)?;
        Self::new(file, rules, scope, clock)
    }
}

impl<R: Read> PowerTableReader<R> {
    /// Read the header and resolve column roles
    pub fn new(
        reader: R,
        rules: &ColumnRules,
        scope: Scope,
        clock: WallClockParser,
    ) -> Result<Self, PowerTableError> {
        let mut records = table_reader(reader);
        let mut header = ByteRecord::new();

        if !records.read_byte_record(&mut header)? || is_blank(&header) {
            return Err(PowerTableError::EmptyInput);
        }

        let roles = ColumnRoleMap::from_record(&header, rules, scope)?;

        Ok(Self {
            records,
            record: ByteRecord::new(),
            roles,
            clock,
            stats: ParseStats::default(),
            finished: false,
        })
    }

    /// Resolved column roles for this table
    pub fn roles(&self) -> &ColumnRoleMap {
        &self.roles
    }

    /// Parse problems seen so far
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Parse the current record against the resolved roles
    ///
    /// **Private** - internal helper for the iterator
    fn parse_row(&mut self) -> PowerTableRow {
        let record = &self.record;
        let roles = &self.roles;

        let wall_clock = match cell(record, roles.wall_clock()) {
            Some(bytes) => {
                let parsed = std::str::from_utf8(bytes).ok().and_then(|text| self.clock.parse(text));
                if parsed.is_none() {
                    debug!("Invalid time format: {}", String::from_utf8_lossy(bytes));
                    self.stats.unparseable_timestamps += 1;
                }
                parsed
            }
            None => None,
        };

        let stats = &mut self.stats;
        let mut number = |index: Option<usize>| -> f64 {
            match cell(record, index) {
                Some(bytes) => parse_number(bytes).unwrap_or_else(|| {
                    stats.unparseable_fields += 1;
                    f64::NAN
                }),
                None => f64::NAN,
            }
        };

        PowerTableRow {
            energy_j: number(roles.energy()),
            power_w: number(roles.power()),
            elapsed_s: number(roles.elapsed()),
            wall_clock,
            scoped_energy_j: number(roles.scoped_energy()),
            scoped_power_w: number(roles.scoped_power()),
        }
    }

    /// Log the end-of-table diagnostics once
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let stats = self.stats;
        if stats.unparseable_fields > 0 || stats.unparseable_timestamps > 0 {
            warn!(
                "Power table: {} rows, {} unparseable numeric fields, {} unparseable timestamps",
                stats.rows, stats.unparseable_fields, stats.unparseable_timestamps
            );
        } else {
            debug!("Power table: {} rows, no parse problems", stats.rows);
        }
    }
}

impl<R: Read> Iterator for PowerTableReader<R> {
    type Item = Result<PowerTableRow, PowerTableError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.records.read_byte_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => {
                    self.finish();
                    return None;
                }
                Err(e) => return Some(Err(PowerTableError::Csv(e))),
            }

            if is_blank(&self.record) {
                continue;
            }

            let row = self.parse_row();
            self.stats.rows += 1;
            return Some(Ok(row));
        }
    }
}

/// Parse a whole table held in memory
///
/// **Public** - convenience wrapper for tests and small tables
///
/// # Errors
/// * `PowerTableError::EmptyInput` - no header or no data rows
/// * `PowerTableError::MissingColumns` - no energy/power column in the header
pub fn parse_power_table(
    text: &str,
    rules: &ColumnRules,
    scope: Scope,
    clock: WallClockParser,
) -> Result<(ColumnRoleMap, Vec<PowerTableRow>), PowerTableError> {
    let mut reader = PowerTableReader::new(text.as_bytes(), rules, scope, clock)?;
    let rows = reader.by_ref().collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(PowerTableError::EmptyInput);
    }

    Ok((reader.roles, rows))
}

/// True for a record whose cells are all empty (a whitespace-only line)
fn is_blank(record: &ByteRecord) -> bool {
    record.iter().all(|field| field.is_empty())
}

/// Cell bytes for a column, if the row is long enough
fn cell(record: &ByteRecord, index: Option<usize>) -> Option<&[u8]> {
    index.and_then(|i| record.get(i))
}

/// Parse a numeric cell; `None` when it is not a number
fn parse_number(bytes: &[u8]) -> Option<f64> {
    if bytes.is_empty() {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn clock() -> WallClockParser {
        WallClockParser::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
    }

    fn parse(text: &str, scope: Scope) -> Result<(ColumnRoleMap, Vec<PowerTableRow>), PowerTableError> {
        let rules = ColumnRules::new(scope.core_index()).unwrap();
        parse_power_table(text, &rules, scope, clock())
    }

    #[test]
    fn test_parse_basic_rows() {
        let csv = "System Time,Elapsed Time (sec),Processor Power_0(Watt),Cumulative Processor Energy_0(Joules)\n\
                   12:00:00:000,0.0,10.5,0.0\n\
                   12:00:01:000,1.0,11.0,10.8\n";
        let (roles, rows) = parse(csv, Scope::Package).unwrap();

        assert_eq!(roles.energy(), Some(3));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].elapsed_s, 1.0);
        assert_eq!(rows[1].power_w, 11.0);
        assert_eq!(rows[1].energy_j, 10.8);
        let dt = rows[1].wall_clock.unwrap() - rows[0].wall_clock.unwrap();
        assert_eq!(dt.num_milliseconds(), 1000);
        assert!(rows[0].scoped_energy_j.is_nan());
    }

    #[test]
    fn test_empty_table() {
        assert!(matches!(parse("", Scope::Package), Err(PowerTableError::EmptyInput)));
        assert!(matches!(
            parse("Elapsed Time,Processor Power(Watt)\n", Scope::Package),
            Err(PowerTableError::EmptyInput)
        ));
    }

    #[test]
    fn test_missing_columns() {
        let csv = "System Time,Utilization\n12:00:00:000,5\n";
        assert!(matches!(
            parse(csv, Scope::Package),
            Err(PowerTableError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_short_row_only_loses_missing_fields() {
        let csv = "Elapsed Time (sec),Processor Power(Watt),Cumulative Processor Energy(Joules)\n\
                   1.0,12.0\n";
        let (_, rows) = parse(csv, Scope::Package).unwrap();

        assert_eq!(rows[0].elapsed_s, 1.0);
        assert_eq!(rows[0].power_w, 12.0);
        assert!(rows[0].energy_j.is_nan());
    }

    #[test]
    fn test_unparseable_fields_become_nan() {
        let csv = "System Time,Elapsed Time (sec),Processor Power(Watt)\n\
                   garbage,abc,7.5\n";
        let rules = ColumnRules::new(0).unwrap();
        let mut reader = PowerTableReader::new(csv.as_bytes(), &rules, Scope::Package, clock()).unwrap();
        let row = reader.next().unwrap().unwrap();

        assert!(row.elapsed_s.is_nan());
        assert_eq!(row.power_w, 7.5);
        assert!(row.wall_clock.is_none());
        assert!(reader.next().is_none());

        let stats = reader.stats();
        assert_eq!(stats.rows, 1);
        assert_eq!(stats.unparseable_fields, 1);
        assert_eq!(stats.unparseable_timestamps, 1);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let csv = "Elapsed Time,Processor Power(Watt)\n\n0,1\n   \n1,2\n";
        let (_, rows) = parse(csv, Scope::Package).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_scoped_columns_are_carried() {
        let csv = "Elapsed Time,Processor Power_0(Watt),IA Power_0(Watt)\n0,20,5\n";
        let (_, rows) = parse(csv, Scope::Core(0)).unwrap();

        assert_eq!(rows[0].power_w, 20.0);
        assert_eq!(rows[0].scoped_power_w, 5.0);
    }

    #[test]
    fn test_crlf_and_spaces_around_delimiters() {
        let csv = "Elapsed Time , Processor Power(Watt)\r\n 0.5 , 3.25 \r\n";
        let (_, rows) = parse(csv, Scope::Package).unwrap();
        assert_eq!(rows[0].elapsed_s, 0.5);
        assert_eq!(rows[0].power_w, 3.25);
    }

    #[test]
    fn test_quoted_cells_are_unquoted() {
        let csv = "\"Elapsed Time (sec)\",\"Cumulative Processor Energy_0(Joules)\"\n\
                   \"0\",\"0\"\n\"1\",\"5\"\n\"2\",\"12\"\n";
        let (roles, rows) = parse(csv, Scope::Package).unwrap();

        assert_eq!(roles.energy(), Some(1));
        let energy: Vec<f64> = rows.iter().map(|r| r.energy_j).collect();
        assert_eq!(energy, vec![0.0, 5.0, 12.0]);
    }

    #[test]
    fn test_invalid_utf8_only_loses_its_cell() {
        let bytes: &[u8] = b"Elapsed Time,Cumulative Processor Energy(Joules),Note\n0,0,a\n1,5,caf\xE9\n2,12,b\n";
        let rules = ColumnRules::new(0).unwrap();
        let reader = PowerTableReader::new(bytes, &rules, Scope::Package, clock()).unwrap();
        let rows: Vec<PowerTableRow> = reader.map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].energy_j, 5.0);
        assert_eq!(rows[2].energy_j, 12.0);
    }

    #[test]
    fn test_invalid_utf8_in_role_cell_is_unparseable() {
        let bytes: &[u8] = b"Elapsed Time,Processor Power(Watt)\n0,1\xE9\n1,2\n";
        let rules = ColumnRules::new(0).unwrap();
        let mut reader = PowerTableReader::new(bytes, &rules, Scope::Package, clock()).unwrap();

        assert!(reader.next().unwrap().unwrap().power_w.is_nan());
        assert_eq!(reader.next().unwrap().unwrap().power_w, 2.0);
        assert_eq!(reader.stats().unparseable_fields, 1);
    }
}
