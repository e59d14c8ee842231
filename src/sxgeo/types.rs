//! SxGeo-specific constants and small types

/// File marker: the first three bytes of every database
pub const MAGIC: &[u8; 3] = b"SxG";

/// Size of the fixed header (format 2.2)
pub const HEADER_LEN: usize = 40;

/// Bytes of truncated range-start at the front of every row
pub const RANGE_START_LEN: usize = 3;

/// First octets that are never looked up (unspecified, private, loopback)
pub const RESERVED_OCTETS: [u8; 3] = [0, 10, 127];

/// Record tables addressed by linkage offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// Country records (head of the city section)
    Countries,
    /// Region records
    Regions,
    /// City records
    Cities,
}

impl Table {
    /// Section name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Table::Countries => "countries",
            Table::Regions => "regions",
            Table::Cities => "cities",
        }
    }
}
