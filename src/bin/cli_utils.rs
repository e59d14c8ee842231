use clap::ValueEnum;
use std::io;
use sxgeo::{GeoResult, Granularity, Location};

/// Lookup mode flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    City,
    Region,
    Country,
    Full,
}

impl From<ModeArg> for Granularity {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::City => Granularity::City,
            ModeArg::Region => Granularity::Region,
            ModeArg::Country => Granularity::Country,
            ModeArg::Full => Granularity::Full,
        }
    }
}

/// Batch output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchFormat {
    /// One JSON object per line
    Json,
    /// Flat CSV with the common fields
    Csv,
}

/// Zero-copy line scanner using memchr for SIMD-accelerated scanning.
/// Reuses a provided buffer to avoid allocations. Handles partial lines at buffer boundaries.
pub struct LineScanner<R: io::BufRead> {
    reader: R,
    partial: Vec<u8>,
    eof: bool,
}

impl<R: io::BufRead> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            partial: Vec::new(),
            eof: false,
        }
    }

    /// Read the next non-blank line, trimmed, into `line_buf`.
    /// Returns Ok(false) on EOF.
    pub fn read_line(&mut self, line_buf: &mut Vec<u8>) -> io::Result<bool> {
        line_buf.clear();

        loop {
            if self.eof {
                let trimmed = self.partial.trim_ascii();
                let found = !trimmed.is_empty();
                line_buf.extend_from_slice(trimmed);
                self.partial.clear();
                return Ok(found);
            }

            let buffer = self.reader.fill_buf()?;
            if buffer.is_empty() {
                self.eof = true;
                continue;
            }

            match memchr::memchr(b'\n', buffer) {
                Some(newline_pos) => {
                    self.partial.extend_from_slice(&buffer[..newline_pos]);
                    self.reader.consume(newline_pos + 1);

                    let trimmed = self.partial.trim_ascii();
                    if !trimmed.is_empty() {
                        line_buf.extend_from_slice(trimmed);
                        self.partial.clear();
                        return Ok(true);
                    }
                    self.partial.clear();
                }
                None => {
                    self.partial.extend_from_slice(buffer);
                    let consumed = buffer.len();
                    self.reader.consume(consumed);
                }
            }
        }
    }
}

/// Column headers for CSV batch output
pub const CSV_HEADER: [&str; 8] = [
    "ip",
    "country_iso",
    "country",
    "region_iso",
    "region",
    "city",
    "latitude",
    "longitude",
];

/// Flatten a lookup result into [`CSV_HEADER`] columns
pub fn csv_row(ip: &str, result: Option<&GeoResult>) -> [String; 8] {
    let text = |s: Option<&str>| s.unwrap_or_default().to_string();
    let number = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();

    let mut row: [String; 8] = Default::default();
    row[0] = ip.to_string();

    match result {
        Some(GeoResult::City(city)) => {
            row[5] = text(city.name_en());
            row[6] = number(city.latitude());
            row[7] = number(city.longitude());
        }
        Some(GeoResult::Region(region)) => {
            row[3] = text(region.iso());
            row[4] = text(region.name_en());
        }
        Some(GeoResult::Country(country)) => {
            row[1] = text(country.iso());
            row[2] = text(country.name_en());
            row[6] = number(country.latitude());
            row[7] = number(country.longitude());
        }
        Some(GeoResult::Full(Location {
            city,
            region,
            country,
        })) => {
            row[1] = text(country.iso());
            row[2] = text(country.name_en());
            if let Some(region) = region {
                row[3] = text(region.iso());
                row[4] = text(region.name_en());
            }
            match city {
                Some(city) => {
                    row[5] = text(city.name_en());
                    row[6] = number(city.latitude());
                    row[7] = number(city.longitude());
                }
                None => {
                    row[6] = number(country.latitude());
                    row[7] = number(country.longitude());
                }
            }
        }
        None => {}
    }

    row
}

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn format_qps(qps: f64) -> String {
    if qps >= 1_000_000.0 {
        format!("{:.2}M", qps / 1_000_000.0)
    } else if qps >= 1_000.0 {
        format!("{:.2}K", qps / 1_000.0)
    } else {
        format!("{:.2}", qps)
    }
}

/// Format Unix seconds as `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_unix_timestamp(timestamp: u64) -> String {
    let days = timestamp / 86400;
    let remaining = timestamp % 86400;
    let (year, month, day) = days_to_ymd(days);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year,
        month,
        day,
        remaining / 3600,
        remaining % 3600 / 60,
        remaining % 60
    )
}

// Convert days since Unix epoch to year/month/day
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    let mut remaining_days = days;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for &days_in_month in &days_in_months {
        if remaining_days < days_in_month {
            break;
        }
        remaining_days -= days_in_month;
        month += 1;
    }

    (year, month, remaining_days + 1)
}

fn is_leap_year(year: u64) -> bool {
    (year.is_multiple_of(4) && !year.is_multiple_of(100)) || year.is_multiple_of(400)
}
