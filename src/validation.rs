//! Database validation for untrusted SxGeo files
//!
//! Opening a database checks only what every lookup depends on: the
//! header, the descriptors and the section layout. This module walks the
//! rest of the file:
//!
//! - Index ordering (byte index, main index, rows within each octet)
//! - Main index entries against the rows they summarise
//! - Every row id against its table, and every record's linkage chain
//!
//! The validator never panics on corrupt input; every problem becomes an
//! entry in the [`ValidationReport`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use sxgeo::validation::validate_database;
//! use std::path::Path;
//!
//! let report = validate_database(Path::new("SxGeoCity.dat"))?;
//!
//! if report.is_valid() {
//!     println!("✓ Database is consistent");
//! } else {
//!     for error in &report.errors {
//!         println!("  - {}", error);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{Result, SxGeoError};
use crate::file_reader;
use crate::records::RecordReader;
use crate::sxgeo::{IndexSearch, Layout};
use std::collections::HashSet;
use std::path::Path;

/// Errors of one kind reported individually before they are summarised
const MAX_REPORTED: usize = 10;

/// Validation report with detailed findings
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Critical errors that make lookups fail or return wrong rows
    pub errors: Vec<String>,
    /// Warnings about potential issues (non-fatal)
    pub warnings: Vec<String>,
    /// Informational messages about database properties
    pub info: Vec<String>,
    /// Database statistics
    pub stats: DatabaseStats,
}

/// Database statistics gathered during validation
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    /// File size in bytes
    pub file_size: usize,
    /// Format version
    pub version: u8,
    /// Number of rows
    pub rows: usize,
    /// Byte index entries
    pub byte_index_entries: usize,
    /// Main index entries
    pub main_index_entries: usize,
    /// Rows storing 0 (unmapped ranges)
    pub unmapped_rows: usize,
    /// Rows pointing straight at a country record
    pub country_rows: usize,
    /// Rows pointing at a city record
    pub city_rows: usize,
    /// Distinct city records reached from rows
    pub distinct_cities: usize,
    /// Distinct region records reached from cities
    pub distinct_regions: usize,
    /// Distinct country records reached from rows and regions
    pub distinct_countries: usize,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
            stats: DatabaseStats::default(),
        }
    }

    /// Check if database passed all validations (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }
}

impl DatabaseStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Version: {}, Rows: {} ({} city, {} country, {} unmapped), Cities: {}, Regions: {}, Countries: {}, Size: {} KB",
            self.version,
            self.rows,
            self.city_rows,
            self.country_rows,
            self.unmapped_rows,
            self.distinct_cities,
            self.distinct_regions,
            self.distinct_countries,
            self.file_size / 1024
        )
    }
}

/// Counts problems of one kind and reports the first few
struct Capped {
    what: &'static str,
    seen: usize,
}

impl Capped {
    fn new(what: &'static str) -> Self {
        Self { what, seen: 0 }
    }

    fn push(&mut self, report: &mut ValidationReport, msg: String) {
        self.seen += 1;
        if self.seen <= MAX_REPORTED {
            report.error(msg);
        }
    }

    fn finish(self, report: &mut ValidationReport) {
        if self.seen > MAX_REPORTED {
            report.error(format!(
                "... and {} more {} errors",
                self.seen - MAX_REPORTED,
                self.what
            ));
        }
    }
}

/// Validate a database file
///
/// `.gz` files are decompressed first. Only failing to read the file is an
/// `Err`; everything wrong with its contents goes into the report.
pub fn validate_database(path: &Path) -> Result<ValidationReport> {
    let data = file_reader::read_all(path)
        .map_err(|e| SxGeoError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(validate_bytes(&data))
}

/// Validate a database held in memory
pub fn validate_bytes(data: &[u8]) -> ValidationReport {
    match Layout::from_bytes(data) {
        Ok(layout) => validate_layout(data, &layout),
        Err(e) => {
            let mut report = ValidationReport::new();
            report.stats.file_size = data.len();
            report.error(format!("Failed to parse layout: {}", e));
            report
        }
    }
}

/// Validate the parts of a database the layout parser does not check
pub(crate) fn validate_layout(data: &[u8], layout: &Layout) -> ValidationReport {
    let mut report = ValidationReport::new();
    let header = &layout.header;

    report.stats.file_size = data.len();
    report.stats.version = header.version;
    report.stats.rows = layout.row_count();
    report.stats.byte_index_entries = layout.byte_index.len();
    report.stats.main_index_entries = layout.main_index.len();

    report.info(format!(
        "File size: {} bytes ({} KB)",
        data.len(),
        data.len() / 1024
    ));
    report.info(format!(
        "Format version {}, built {}, charset {:?}",
        header.version, header.build_time, layout.charset
    ));
    report.info(format!(
        "{} rows, {} byte index entries, {} main index entries (range {})",
        header.db_items, header.byte_index_len, header.main_index_len, header.range
    ));

    let search = IndexSearch::new(data, layout);
    validate_main_index(layout, &search, &mut report);
    validate_row_order(layout, &search, &mut report);
    validate_row_targets(data, layout, &search, &mut report);

    report
}

fn validate_main_index(layout: &Layout, search: &IndexSearch<'_>, report: &mut ValidationReport) {
    let main = &layout.main_index;
    let range = layout.header.range as usize;

    for (i, pair) in main.windows(2).enumerate() {
        if pair[0] >= pair[1] {
            report.error(format!(
                "Main index not strictly ascending at entry {} ({:#010x} >= {:#010x})",
                i + 1,
                pair[0],
                pair[1]
            ));
            return;
        }
    }

    // Entry k holds the range-start of the first row of block k + 1
    let mut mismatches = 0usize;
    for (k, &entry) in main.iter().enumerate() {
        let row = (k + 1) * range;
        if row >= layout.row_count() {
            report.warning(format!(
                "Main index entry {} refers to row {} past the last row",
                k, row
            ));
            break;
        }
        match search.range_start(row) {
            Ok(start) if start == entry & 0x00FF_FFFF => {}
            _ => mismatches += 1,
        }
    }
    if mismatches > 0 {
        report.warning(format!(
            "{} main index entries do not match the row they summarise",
            mismatches
        ));
    }
}

fn validate_row_order(layout: &Layout, search: &IndexSearch<'_>, report: &mut ValidationReport) {
    let mut disorder = Capped::new("row order");

    for (octet, bounds) in layout.byte_index.windows(2).enumerate() {
        let (min, max) = (bounds[0] as usize, bounds[1] as usize);
        let mut previous: Option<u32> = None;

        for row in min..max {
            let start = match search.range_start(row) {
                Ok(start) => start,
                Err(e) => {
                    disorder.push(report, format!("Row {}: {}", row, e));
                    break;
                }
            };
            if let Some(prev) = previous {
                if start <= prev {
                    disorder.push(
                        report,
                        format!(
                            "Rows out of order in octet {} at row {} ({:#08x} <= {:#08x})",
                            octet + 1,
                            row,
                            start,
                            prev
                        ),
                    );
                }
            }
            previous = Some(start);
        }
    }

    disorder.finish(report);
}

fn validate_row_targets(
    data: &[u8],
    layout: &Layout,
    search: &IndexSearch<'_>,
    report: &mut ValidationReport,
) {
    let country_size = layout.header.country_size;
    let records = RecordReader::new(data, layout);
    let check_records = !layout.cities.is_empty() || !layout.countries.is_empty();

    if !check_records {
        report.info("No record tables: rows carry plain ids");
    }

    let mut cities = HashSet::new();
    let mut regions = HashSet::new();
    let mut countries = HashSet::new();
    let mut broken = Capped::new("record");

    for row in 0..layout.row_count() {
        let seek = match search.row_id(row) {
            Ok(seek) => seek,
            Err(e) => {
                broken.push(report, format!("Row {}: {}", row, e));
                break;
            }
        };

        if seek == 0 {
            report.stats.unmapped_rows += 1;
            continue;
        }
        if seek < country_size {
            report.stats.country_rows += 1;
        } else {
            report.stats.city_rows += 1;
        }
        if !check_records {
            continue;
        }

        if seek < country_size {
            if countries.insert(seek) {
                if let Err(e) = records.country(seek) {
                    broken.push(report, format!("Row {} country at {}: {}", row, seek, e));
                }
            }
            continue;
        }

        if !cities.insert(seek) {
            continue;
        }
        let city = match records.city(seek) {
            Ok(city) => city,
            Err(e) => {
                broken.push(report, format!("Row {} city at {}: {}", row, seek, e));
                continue;
            }
        };

        if !regions.insert(city.region_seek) {
            continue;
        }
        let region = match records.region(city.region_seek) {
            Ok(region) => region,
            Err(e) => {
                broken.push(
                    report,
                    format!("City at {} region at {}: {}", seek, city.region_seek, e),
                );
                continue;
            }
        };

        if countries.insert(region.country_seek) {
            if let Err(e) = records.country(region.country_seek) {
                broken.push(
                    report,
                    format!(
                        "Region at {} country at {}: {}",
                        city.region_seek, region.country_seek, e
                    ),
                );
            }
        }
    }

    broken.finish(report);

    report.stats.distinct_cities = cities.len();
    report.stats.distinct_regions = regions.len();
    report.stats.distinct_countries = countries.len();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sxgeo::testutil::rows_only_database;
    use tempfile::NamedTempFile;

    #[test]
    fn test_valid_rows_only() {
        let rows: Vec<(u32, u32)> = (0..50u32).map(|i| (0x0500_0000 + i * 0x100, i + 1)).collect();
        let report = validate_bytes(&rows_only_database(&rows, 8));

        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.stats.rows, 50);
        assert_eq!(report.stats.city_rows, 50);
        assert_eq!(report.stats.main_index_entries, 6);
    }

    #[test]
    fn test_rows_out_of_order() {
        let rows = [(0x0500_0200, 1), (0x0500_0100, 2), (0x0500_0300, 3)];
        let report = validate_bytes(&rows_only_database(&rows, 8));

        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("out of order in octet 5")));
    }

    #[test]
    fn test_unmapped_rows_counted() {
        let rows = [(0x0100_0000, 0), (0x0100_8000, 4), (0x0200_0000, 0)];
        let report = validate_bytes(&rows_only_database(&rows, 8));

        assert!(report.is_valid());
        assert_eq!(report.stats.unmapped_rows, 2);
    }

    #[test]
    fn test_unparseable_file() {
        let report = validate_bytes(b"definitely not a database, but longer than forty bytes");
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("layout"));
    }

    #[test]
    fn test_validate_database_file() {
        let rows = [(0x0100_0000, 1)];
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), rows_only_database(&rows, 8)).unwrap();

        let report = validate_database(temp.path()).unwrap();
        assert!(report.is_valid());
        assert!(report.stats.summary().contains("Rows: 1"));
    }

    #[test]
    fn test_capped_errors() {
        let mut report = ValidationReport::new();
        let mut capped = Capped::new("test");
        for i in 0..(MAX_REPORTED + 5) {
            capped.push(&mut report, format!("problem {}", i));
        }
        capped.finish(&mut report);

        assert_eq!(report.errors.len(), MAX_REPORTED + 1);
        assert!(report.errors.last().unwrap().contains("5 more test errors"));
    }
}
