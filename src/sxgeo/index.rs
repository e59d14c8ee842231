//! Two-level index search
//!
//! Maps a 32-bit address to the row that covers it:
//!
//! 1. The **byte index** narrows the search to the rows whose range-start
//!    shares the address's first octet.
//! 2. When that bucket is wider than `range` rows, the **main index** (one
//!    full address per `range` rows) narrows it to a single block.
//! 3. The rows of that block are searched on their 3-byte range-starts.
//!
//! Steps 2 and 3 bisect only while the interval is wider than
//! [`SCAN_THRESHOLD`] and finish with a linear scan.

use super::format::Layout;
use super::types::{RANGE_START_LEN, RESERVED_OCTETS};
use crate::endian::read_uint_be;
use crate::error::{Result, SxGeoError};

/// Interval width below which bisection gives way to a linear scan
///
/// Affects speed only; any value ≥ 1 returns the same rows.
pub const SCAN_THRESHOLD: usize = 8;

/// Index search over one database buffer
pub struct IndexSearch<'a> {
    /// The raw file data containing the row table
    data: &'a [u8],
    /// Parsed layout
    layout: &'a Layout,
}

impl<'a> IndexSearch<'a> {
    /// Create a search over `data` described by `layout`
    pub fn new(data: &'a [u8], layout: &'a Layout) -> Self {
        Self { data, layout }
    }

    /// Find the record offset stored for `ip`
    ///
    /// `Ok(None)` for reserved first octets (0, 10, 127), octets past the
    /// byte index, and empty buckets.
    pub fn locate(&self, ip: u32) -> Result<Option<u32>> {
        match self.locate_row(ip)? {
            Some(row) => self.row_id(row).map(Some),
            None => Ok(None),
        }
    }

    /// Find the row number covering `ip`
    pub fn locate_row(&self, ip: u32) -> Result<Option<usize>> {
        let octet = (ip >> 24) as u8;
        let byte_index = &self.layout.byte_index;

        if RESERVED_OCTETS.contains(&octet) || octet as usize >= byte_index.len() {
            return Ok(None);
        }

        let octet = octet as usize;
        let mut min = byte_index[octet - 1] as usize;
        let mut max = byte_index[octet] as usize;
        let range = self.layout.header.range as usize;

        if max.saturating_sub(min) > range {
            let part = self.search_main_index(ip, min / range, max / range - 1);
            let left = if part > 0 { part * range } else { 0 };
            let right = if part > self.layout.main_index.len() {
                self.layout.row_count()
            } else {
                (part + 1) * range
            };
            // The block's upper bound row is included: an address equal to
            // the next block's first range-start belongs to that row.
            min = min.max(left);
            max = max.min(right + 1);
        }

        self.search_rows(ip & 0x00FF_FFFF, min, max)
    }

    /// Bisect then scan the main index over `[lo, hi]`
    ///
    /// Returns the first position whose entry is ≥ `ip`, or `hi + 1` when
    /// every entry is smaller. Entries past the end of the array count as
    /// larger than any address.
    fn search_main_index(&self, ip: u32, mut lo: usize, mut hi: usize) -> usize {
        let main = &self.layout.main_index;
        let entry = |i: usize| main.get(i).copied().unwrap_or(u32::MAX);

        while hi - lo > SCAN_THRESHOLD {
            let mid = (lo + hi) >> 1;
            if ip > entry(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        while ip > entry(lo) {
            lo += 1;
            if lo > hi {
                break;
            }
        }

        lo
    }

    /// Find the last row in `[min - 1, max)` whose range-start ≤ `ip24`
    ///
    /// The row just before `min` is the answer when `min` itself already
    /// starts past the address (the main index can cut a bucket between
    /// two rows of the same range).
    fn search_rows(&self, ip24: u32, min: usize, max: usize) -> Result<Option<usize>> {
        if max <= min {
            return Ok(None);
        }
        if max - min == 1 {
            return Ok(Some(min));
        }

        let (mut lo, mut hi) = (min, max);
        while hi - lo > SCAN_THRESHOLD {
            let mid = (lo + hi) >> 1;
            if ip24 >= self.range_start(mid)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let mut cursor = lo;
        while cursor < hi && ip24 >= self.range_start(cursor)? {
            cursor += 1;
        }

        Ok(cursor.checked_sub(1))
    }

    /// Truncated (low 24 bits) range-start of a row
    pub fn range_start(&self, row: usize) -> Result<u32> {
        let offset = self.row_offset(row)?;
        read_uint_be(self.data, offset, RANGE_START_LEN).ok_or_else(|| self.row_error(row))
    }

    /// Stored id (record offset) of a row
    pub fn row_id(&self, row: usize) -> Result<u32> {
        let offset = self.row_offset(row)? + RANGE_START_LEN;
        read_uint_be(self.data, offset, self.layout.id_len()).ok_or_else(|| self.row_error(row))
    }

    fn row_offset(&self, row: usize) -> Result<usize> {
        if row >= self.layout.row_count() {
            return Err(self.row_error(row));
        }
        Ok(self.layout.rows_begin + row * self.layout.block_len())
    }

    fn row_error(&self, row: usize) -> SxGeoError {
        SxGeoError::OutOfBounds {
            section: "rows",
            offset: row as u64,
            limit: self.layout.row_count() as u64,
        }
    }
}
