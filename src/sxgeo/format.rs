//! SxGeo Binary Format Parsing
//!
//! Parses the fixed header, the embedded record descriptors and both index
//! arrays into a [`Layout`]. Everything else (rows, region and city records)
//! stays in the caller's buffer and is addressed through offsets computed
//! here.
//!
//! ```text
//! ┌──────────────────────────────┐ 0
//! │ header (40 bytes)            │
//! ├──────────────────────────────┤ 40
//! │ descriptors, NUL separated   │ packSize
//! ├──────────────────────────────┤
//! │ byte index  (u32 BE × n ≤ 256)│
//! ├──────────────────────────────┤
//! │ main index  (u32 BE × m)     │
//! ├──────────────────────────────┤ rows_begin
//! │ rows: 3-byte start + id      │ dbItems × blockLength
//! ├──────────────────────────────┤ regions_begin
//! │ region records               │ regionSize
//! ├──────────────────────────────┤ cities_begin
//! │ country records │ city recs  │ citySize (countries first)
//! └──────────────────────────────┘
//! ```

use super::types::{Table, HEADER_LEN, MAGIC, RANGE_START_LEN};
use crate::endian::{read_u16_be, read_u32_be, read_u8};
use crate::error::{Result, SxGeoError};
use crate::pack::{Charset, Descriptor, FieldKind};
use std::borrow::Cow;

/// Linkage field every city descriptor must carry
pub const REGION_LINK: &str = "region_seek";
/// Linkage field every region descriptor must carry
pub const COUNTRY_LINK: &str = "country_seek";

/// Fixed 40-byte header, decoded as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SxGeoHeader {
    /// Format version
    pub version: u8,
    /// Build time, Unix seconds
    pub build_time: u32,
    /// Database type id
    pub db_type: u8,
    /// Charset id of record strings
    pub charset: u8,
    /// Entries in the first-octet index
    pub byte_index_len: u8,
    /// Entries in the main index
    pub main_index_len: u16,
    /// Rows per main-index bucket
    pub range: u16,
    /// Total rows
    pub db_items: u32,
    /// Bytes per row id
    pub id_len: u8,
    /// Region record stride
    pub max_region: u16,
    /// City record stride
    pub max_city: u16,
    /// Region section size in bytes
    pub region_size: u32,
    /// City section size in bytes (countries included)
    pub city_size: u32,
    /// Country record stride
    pub max_country: u16,
    /// Country part of the city section, in bytes
    pub country_size: u32,
    /// Length of the descriptor block
    pub pack_size: u16,
}

impl SxGeoHeader {
    /// Parse the fixed header at the start of `data`
    ///
    /// A buffer shorter than the header is an I/O-class error (the file was
    /// truncated); a wrong marker is a format error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(SxGeoError::FileTooSmall {
                size: data.len(),
                required: HEADER_LEN,
            });
        }

        if &data[0..3] != MAGIC {
            return Err(SxGeoError::InvalidFormat(format!(
                "bad marker {:02x?}, not a Sypex Geo database",
                &data[0..3]
            )));
        }

        // All reads below are inside the checked 40 bytes
        let u8_at = |o| read_u8(data, o).unwrap_or_default();
        let u16_at = |o| read_u16_be(data, o).unwrap_or_default();
        let u32_at = |o| read_u32_be(data, o).unwrap_or_default();

        Ok(SxGeoHeader {
            version: u8_at(3),
            build_time: u32_at(4),
            db_type: u8_at(8),
            charset: u8_at(9),
            byte_index_len: u8_at(10),
            main_index_len: u16_at(11),
            range: u16_at(13),
            db_items: u32_at(15),
            id_len: u8_at(19),
            max_region: u16_at(20),
            max_city: u16_at(22),
            region_size: u32_at(24),
            city_size: u32_at(28),
            max_country: u16_at(32),
            country_size: u32_at(34),
            pack_size: u16_at(38),
        })
    }

    /// Bytes per row: truncated range-start plus id
    pub fn block_len(&self) -> usize {
        RANGE_START_LEN + self.id_len as usize
    }
}

/// Immutable layout of an opened database
///
/// Built once by [`Layout::from_bytes`]; lookups only read from it.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Raw header fields
    pub header: SxGeoHeader,
    /// Decoded charset (unknown ids fall back to UTF-8)
    pub charset: Charset,
    /// Country descriptor
    pub countries: Descriptor,
    /// Region descriptor
    pub regions: Descriptor,
    /// City descriptor
    pub cities: Descriptor,
    /// First-octet index: row number where each octet's rows end
    pub byte_index: Vec<u32>,
    /// Main index: subdivides large octet buckets every `range` rows
    pub main_index: Vec<u32>,
    /// Offset of the byte index
    pub byte_index_offset: usize,
    /// Offset of the main index
    pub main_index_offset: usize,
    /// Offset of the row table
    pub rows_begin: usize,
    /// Offset of the region section
    pub regions_begin: usize,
    /// Offset of the city section
    pub cities_begin: usize,
}

impl Layout {
    /// Parse the header, descriptors and indexes and check the layout fits
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = SxGeoHeader::parse(data)?;

        if !(1..=4).contains(&header.id_len) {
            return Err(SxGeoError::InvalidFormat(format!(
                "row id length {} not in 1..=4",
                header.id_len
            )));
        }
        if header.range == 0 && (header.db_items > 0 || header.main_index_len > 0) {
            return Err(SxGeoError::InvalidFormat(
                "main index range is zero".to_string(),
            ));
        }
        if header.country_size > header.city_size {
            return Err(SxGeoError::InvalidFormat(format!(
                "country section ({} bytes) larger than city section ({} bytes)",
                header.country_size, header.city_size
            )));
        }

        let charset = Charset::from_u8(header.charset).unwrap_or_else(|| {
            log::warn!(
                "unknown charset id {}, decoding strings as UTF-8",
                header.charset
            );
            Charset::Utf8
        });

        // Section offsets as prefix sums, in u64 so nothing can wrap
        let byte_index_offset = HEADER_LEN as u64 + header.pack_size as u64;
        let main_index_offset = byte_index_offset + header.byte_index_len as u64 * 4;
        let rows_begin = main_index_offset + header.main_index_len as u64 * 4;
        let regions_begin = rows_begin + header.db_items as u64 * header.block_len() as u64;
        let cities_begin = regions_begin + header.region_size as u64;
        let end = cities_begin + header.city_size as u64;

        if end > data.len() as u64 {
            return Err(SxGeoError::InvalidFormat(format!(
                "layout needs {} bytes but the file has {}",
                end,
                data.len()
            )));
        }

        let byte_index_offset = byte_index_offset as usize;
        let main_index_offset = main_index_offset as usize;

        let (country_pack, region_pack, city_pack) =
            split_descriptors(&data[HEADER_LEN..byte_index_offset])?;
        let countries = Descriptor::parse(country_pack)?;
        let regions = Descriptor::parse(region_pack)?;
        let cities = Descriptor::parse(city_pack)?;

        if !countries.is_empty() {
            countries.check_stride(Table::Countries.name(), header.max_country as usize)?;
        }
        if !regions.is_empty() {
            regions.check_stride(Table::Regions.name(), header.max_region as usize)?;
            check_link(&regions, "region", COUNTRY_LINK)?;
        }
        if !cities.is_empty() {
            cities.check_stride(Table::Cities.name(), header.max_city as usize)?;
            check_link(&cities, "city", REGION_LINK)?;
        }

        let byte_index = read_u32_array(data, byte_index_offset, header.byte_index_len as usize)?;
        let main_index = read_u32_array(data, main_index_offset, header.main_index_len as usize)?;

        for (i, pair) in byte_index.windows(2).enumerate() {
            if pair[0] > pair[1] {
                return Err(SxGeoError::InvalidFormat(format!(
                    "byte index decreases at octet {} ({} > {})",
                    i + 1,
                    pair[0],
                    pair[1]
                )));
            }
        }
        if let Some(&last) = byte_index.last() {
            if last > header.db_items {
                return Err(SxGeoError::InvalidFormat(format!(
                    "byte index points at row {} but there are only {} rows",
                    last, header.db_items
                )));
            }
        }

        let layout = Layout {
            header,
            charset,
            countries,
            regions,
            cities,
            byte_index,
            main_index,
            byte_index_offset,
            main_index_offset,
            rows_begin: rows_begin as usize,
            regions_begin: regions_begin as usize,
            cities_begin: cities_begin as usize,
        };

        log::debug!(
            "sxgeo v{} type {} built {}: {} rows, {} byte-index / {} main-index entries, range {}",
            header.version,
            header.db_type,
            header.build_time,
            header.db_items,
            header.byte_index_len,
            header.main_index_len,
            header.range
        );

        Ok(layout)
    }

    /// Bytes per row
    pub fn block_len(&self) -> usize {
        self.header.block_len()
    }

    /// Bytes per row id
    pub fn id_len(&self) -> usize {
        self.header.id_len as usize
    }

    /// Number of rows in the row table
    pub fn row_count(&self) -> usize {
        self.header.db_items as usize
    }

    /// Descriptor for a table
    pub fn descriptor(&self, table: Table) -> &Descriptor {
        match table {
            Table::Countries => &self.countries,
            Table::Regions => &self.regions,
            Table::Cities => &self.cities,
        }
    }

    /// Section start, section length and record stride for a table
    pub fn section(&self, table: Table) -> (usize, usize, usize) {
        let h = &self.header;
        match table {
            Table::Countries => (
                self.cities_begin,
                h.country_size as usize,
                h.max_country as usize,
            ),
            Table::Regions => (
                self.regions_begin,
                h.region_size as usize,
                h.max_region as usize,
            ),
            Table::Cities => (
                self.cities_begin,
                h.city_size as usize,
                h.max_city as usize,
            ),
        }
    }

    /// The `stride`-byte window holding the record at `seek`
    ///
    /// The window is clamped to the end of the section and zero-padded, so
    /// the last record of a table can be shorter than the stride.
    pub fn record_window<'a>(
        &self,
        data: &'a [u8],
        table: Table,
        seek: u32,
    ) -> Result<Cow<'a, [u8]>> {
        let (begin, len, stride) = self.section(table);
        let seek = seek as usize;

        if seek >= len {
            return Err(SxGeoError::OutOfBounds {
                section: table.name(),
                offset: seek as u64,
                limit: len as u64,
            });
        }

        let start = begin + seek;
        let end = (start + stride).min(begin + len);
        let raw = data.get(start..end).ok_or(SxGeoError::OutOfBounds {
            section: table.name(),
            offset: seek as u64,
            limit: len as u64,
        })?;

        if raw.len() == stride {
            Ok(Cow::Borrowed(raw))
        } else {
            let mut padded = raw.to_vec();
            padded.resize(stride, 0);
            Ok(Cow::Owned(padded))
        }
    }
}

/// A linkage field must exist and be an unsigned integer
fn check_link(descriptor: &Descriptor, table: &str, link: &str) -> Result<()> {
    match descriptor.field(link).map(|f| f.kind) {
        Some(FieldKind::Int { signed: false, .. }) => Ok(()),
        Some(kind) => Err(SxGeoError::InvalidFormat(format!(
            "{} descriptor field '{}' is {:?}, not an unsigned integer",
            table, link, kind
        ))),
        None => Err(SxGeoError::InvalidFormat(format!(
            "{} descriptor has no '{}' field",
            table, link
        ))),
    }
}

/// Split the descriptor block into (country, region, city)
fn split_descriptors(pack: &[u8]) -> Result<(&str, &str, &str)> {
    let text = std::str::from_utf8(pack).map_err(|e| {
        SxGeoError::InvalidFormat(format!("descriptor block is not valid text: {}", e))
    })?;
    let mut parts = text.split('\0');
    let country = parts.next().unwrap_or_default();
    let region = parts.next().unwrap_or_default();
    let city = parts.next().unwrap_or_default();
    Ok((country, region, city))
}

fn read_u32_array(data: &[u8], offset: usize, count: usize) -> Result<Vec<u32>> {
    (0..count)
        .map(|i| {
            read_u32_be(data, offset + i * 4).ok_or_else(|| {
                SxGeoError::InvalidFormat(format!("index entry {} at {} is truncated", i, offset))
            })
        })
        .collect()
}
