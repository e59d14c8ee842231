//! Geolocation Database API
//!
//! [`Database`] owns the file bytes and the parsed [`Layout`] and answers
//! the four lookup modes:
//!
//! - [`Database::city_of`]: the city record
//! - [`Database::region_of`]: the city's region
//! - [`Database::country_of`]: the region's country
//! - [`Database::full_of`]: all three as a [`Location`]
//!
//! Every lookup takes a dotted-quad string. Malformed addresses, reserved
//! ranges and unmapped ranges come back as `Ok(None)`; only a damaged
//! database produces an error.

use crate::error::{Result, SxGeoError};
use crate::file_reader;
use crate::ip;
use crate::pack::Charset;
use crate::records::{City, Country, Location, RecordReader, Region};
use crate::sxgeo::{IndexSearch, Layout};
use crate::validation::{self, ValidationReport};
use memmap2::Mmap;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// How much of the city → region → country chain a lookup resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// City record only
    City,
    /// Region record
    Region,
    /// Country record
    Country,
    /// City, region and country
    #[default]
    Full,
}

/// Result of [`Database::lookup`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeoResult {
    /// City lookup result
    City(City),
    /// Region lookup result
    Region(Region),
    /// Country lookup result
    Country(Country),
    /// Full lookup result
    Full(Location),
}

/// How the file bytes are brought into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Memory-map the file (default)
    #[default]
    Mmap,
    /// Read the whole file into an owned buffer
    Memory,
}

/// Options for opening a database
#[derive(Debug, Clone, Default)]
pub struct DatabaseOptions {
    /// Path to the database file (ignored when `bytes` is set)
    pub path: PathBuf,

    /// Mapping or reading; `.gz` files are always read and decompressed
    pub load_mode: LoadMode,

    /// Run the structural validator at open and refuse a database with errors
    pub strict: bool,

    /// Optional in-memory bytes (for from_bytes_builder)
    pub bytes: Option<Vec<u8>>,
}

/// Builder for opening databases with custom configuration
///
/// Created via `Database::from(path)`.
///
/// # Examples
///
/// ```no_run
/// use sxgeo::Database;
///
/// // Simple case with defaults (memory-mapped)
/// let db = Database::from("SxGeoCity.dat").open()?;
///
/// // Read into memory and check every row and linkage first
/// let db = Database::from("SxGeoCity.dat")
///     .in_memory()
///     .strict()
///     .open()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DatabaseOpener {
    options: DatabaseOptions,
}

impl DatabaseOpener {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            options: DatabaseOptions {
                path: path.into(),
                ..Default::default()
            },
        }
    }

    /// Read the file into memory instead of mapping it
    pub fn in_memory(mut self) -> Self {
        self.options.load_mode = LoadMode::Memory;
        self
    }

    /// Memory-map the file (the default)
    pub fn mmap(mut self) -> Self {
        self.options.load_mode = LoadMode::Mmap;
        self
    }

    /// Validate every row and linkage at open
    ///
    /// Slower to open, but lookups on the result can only fail on I/O of a
    /// mapped file that changed underneath.
    pub fn strict(mut self) -> Self {
        self.options.strict = true;
        self
    }

    /// Open the database with configured options
    pub fn open(self) -> Result<Database> {
        Database::open_with_options(self.options)
    }

    /// Create a database opener from bytes
    pub fn from_bytes_builder(bytes: Vec<u8>) -> DatabaseOpener {
        DatabaseOpener {
            options: DatabaseOptions {
                bytes: Some(bytes),
                ..Default::default()
            },
        }
    }
}

/// Storage for database data - either owned or memory-mapped
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// Summary of an opened database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    /// Format version from the header
    pub version: u8,
    /// Build time, Unix seconds
    pub build_time: u32,
    /// Database type id
    pub db_type: u8,
    /// String charset
    pub charset: Charset,
    /// File size in bytes (after decompression)
    pub file_size: usize,
    /// Number of rows
    pub rows: u32,
    /// Byte index entries
    pub byte_index_len: u8,
    /// Main index entries
    pub main_index_len: u16,
    /// Rows per main-index block
    pub range: u16,
    /// Bytes per row id
    pub id_len: u8,
    /// Country section size in bytes
    pub country_size: u32,
    /// Region section size in bytes
    pub region_size: u32,
    /// City section size in bytes (countries included)
    pub city_size: u32,
    /// Country descriptor text
    pub country_fields: String,
    /// Region descriptor text
    pub region_fields: String,
    /// City descriptor text
    pub city_fields: String,
}

/// Read-only Sypex Geo database
///
/// `Database` is `Send + Sync`; wrap it in an `Arc` to share it between
/// threads. All lookups are pure reads.
///
/// # Examples
///
/// ```no_run
/// use sxgeo::Database;
///
/// let db = Database::open("SxGeoCity.dat")?;
///
/// if let Some(location) = db.full_of("8.8.8.8")? {
///     println!("{:?} / {:?}", location.city.as_ref().and_then(|c| c.name_en()), location.country.iso());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Database {
    data: DatabaseStorage,
    layout: Layout,
}

impl Database {
    /// Open a database file using memory mapping
    ///
    /// Files ending in `.gz` are decompressed into memory instead.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from(path.as_ref()).open()
    }

    /// Create a database opener for the given path
    pub fn from(path: impl Into<PathBuf>) -> DatabaseOpener {
        DatabaseOpener::new(path)
    }

    /// Create a database opener from raw bytes
    pub fn from_bytes_builder(bytes: Vec<u8>) -> DatabaseOpener {
        DatabaseOpener::from_bytes_builder(bytes)
    }

    /// Create database from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(DatabaseStorage::Owned(data), false)
    }

    /// Open a database with explicit options
    pub fn open_with_options(options: DatabaseOptions) -> Result<Self> {
        let storage = match options.bytes {
            Some(bytes) => DatabaseStorage::Owned(bytes),
            None => Self::load(&options.path, options.load_mode)?,
        };
        Self::from_storage(storage, options.strict)
    }

    fn load(path: &Path, mode: LoadMode) -> Result<DatabaseStorage> {
        if mode == LoadMode::Memory || file_reader::is_gzip(path) {
            let data = file_reader::read_all(path).map_err(|e| {
                SxGeoError::Io(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Ok(DatabaseStorage::Owned(data))
        } else {
            let mmap = file_reader::map(path).map_err(|e| {
                SxGeoError::Io(format!("Failed to mmap {}: {}", path.display(), e))
            })?;
            Ok(DatabaseStorage::Mmap(mmap))
        }
    }

    fn from_storage(storage: DatabaseStorage, strict: bool) -> Result<Self> {
        let layout = Layout::from_bytes(storage.as_slice())?;

        if strict {
            let report = validation::validate_layout(storage.as_slice(), &layout);
            for warning in &report.warnings {
                log::warn!("{}", warning);
            }
            if !report.is_valid() {
                for error in &report.errors {
                    log::warn!("validation error: {}", error);
                }
                return Err(SxGeoError::InvalidFormat(format!(
                    "validation failed with {} error(s): {}",
                    report.errors.len(),
                    report.errors[0]
                )));
            }
        }

        Ok(Self {
            data: storage,
            layout,
        })
    }

    /// City record for an address
    pub fn city_of(&self, ip: &str) -> Result<Option<City>> {
        Ok(match self.lookup(ip, Granularity::City)? {
            Some(GeoResult::City(city)) => Some(city),
            _ => None,
        })
    }

    /// Region record for an address
    pub fn region_of(&self, ip: &str) -> Result<Option<Region>> {
        Ok(match self.lookup(ip, Granularity::Region)? {
            Some(GeoResult::Region(region)) => Some(region),
            _ => None,
        })
    }

    /// Country record for an address
    pub fn country_of(&self, ip: &str) -> Result<Option<Country>> {
        Ok(match self.lookup(ip, Granularity::Country)? {
            Some(GeoResult::Country(country)) => Some(country),
            _ => None,
        })
    }

    /// City, region and country for an address
    pub fn full_of(&self, ip: &str) -> Result<Option<Location>> {
        Ok(match self.lookup(ip, Granularity::Full)? {
            Some(GeoResult::Full(location)) => Some(location),
            _ => None,
        })
    }

    /// Look up a dotted-quad address at the given granularity
    ///
    /// Returns `Ok(None)` when the text is not an IPv4 address, when the
    /// first octet is reserved or past the index, and when the range is
    /// unmapped.
    pub fn lookup(&self, ip: &str, granularity: Granularity) -> Result<Option<GeoResult>> {
        match Self::parse_query(ip) {
            Some(addr) => self.lookup_ip(addr, granularity),
            None => Ok(None),
        }
    }

    /// Look up an already-parsed address
    pub fn lookup_ip(&self, addr: Ipv4Addr, granularity: Granularity) -> Result<Option<GeoResult>> {
        let seek = match self.locate(addr)? {
            Some(seek) => seek,
            None => return Ok(None),
        };
        let reader = RecordReader::new(self.data.as_slice(), &self.layout);

        // Offsets inside the country part map straight to a country
        if seek < self.layout.header.country_size {
            return Ok(match granularity {
                Granularity::City | Granularity::Region => None,
                Granularity::Country => Some(GeoResult::Country(reader.country(seek)?)),
                Granularity::Full => Some(GeoResult::Full(Location {
                    city: None,
                    region: None,
                    country: reader.country(seek)?,
                })),
            });
        }

        let city = reader.city(seek)?;
        if granularity == Granularity::City {
            return Ok(Some(GeoResult::City(city)));
        }

        let region = reader.region(city.region_seek)?;
        if granularity == Granularity::Region {
            return Ok(Some(GeoResult::Region(region)));
        }

        let country = reader.country(region.country_seek)?;
        Ok(Some(match granularity {
            Granularity::Country => GeoResult::Country(country),
            _ => GeoResult::Full(Location {
                city: Some(city),
                region: Some(region),
                country,
            }),
        }))
    }

    /// Raw record offset stored for an address
    ///
    /// Country-only databases store a country id here rather than an
    /// offset. `None` under the same conditions as [`Database::lookup`],
    /// including a stored 0.
    pub fn seek_of(&self, ip: &str) -> Result<Option<u32>> {
        match Self::parse_query(ip) {
            Some(addr) => self.locate(addr),
            None => Ok(None),
        }
    }

    fn parse_query(ip: &str) -> Option<Ipv4Addr> {
        // Cheap octet check first; most junk input stops here
        ip::first_octet(ip)?;
        ip::parse_ipv4(ip).map(Ipv4Addr::from)
    }

    fn locate(&self, addr: Ipv4Addr) -> Result<Option<u32>> {
        let search = IndexSearch::new(self.data.as_slice(), &self.layout);
        Ok(search.locate(u32::from(addr))?.filter(|&seek| seek != 0))
    }

    /// Header and table summary
    pub fn info(&self) -> DatabaseInfo {
        let h = &self.layout.header;
        DatabaseInfo {
            version: h.version,
            build_time: h.build_time,
            db_type: h.db_type,
            charset: self.layout.charset,
            file_size: self.data.as_slice().len(),
            rows: h.db_items,
            byte_index_len: h.byte_index_len,
            main_index_len: h.main_index_len,
            range: h.range,
            id_len: h.id_len,
            country_size: h.country_size,
            region_size: h.region_size,
            city_size: h.city_size,
            country_fields: self.layout.countries.to_string(),
            region_fields: self.layout.regions.to_string(),
            city_fields: self.layout.cities.to_string(),
        }
    }

    /// Parsed layout
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Run the structural validator over this database
    pub fn validate(&self) -> ValidationReport {
        validation::validate_layout(self.data.as_slice(), &self.layout)
    }
}
