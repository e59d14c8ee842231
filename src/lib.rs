//! SxGeo - Read-only Sypex Geo Database Reader
//!
//! Resolves IPv4 addresses to city, region and country records stored in a
//! Sypex Geo (`SxG` format 2.2) database file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sxgeo::Database;
//!
//! let db = Database::open("SxGeoCity.dat")?;
//!
//! if let Some(city) = db.city_of("8.8.8.8")? {
//!     println!("City: {:?}", city.name_en());
//! }
//!
//! if let Some(location) = db.full_of("8.8.8.8")? {
//!     println!("Country: {:?}", location.country.iso());
//!     println!("{}", serde_json::to_string_pretty(&location)?);
//! }
//!
//! // Reserved ranges and junk input are misses, not errors
//! assert!(db.country_of("127.0.0.1")?.is_none());
//! assert!(db.country_of("999.1.1.1")?.is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  "8.8.8.8"                           │
//! └──────────────────────────────────────┘
//!          ↓ first octet check, parse
//! ┌──────────────────────────────────────┐
//! │  Byte index → main index → rows      │
//! └──────────────────────────────────────┘
//!          ↓ record offset
//! ┌──────────────────────────────────────┐
//! │  City → region → country records     │
//! │  (decoded by per-table descriptors)  │
//! └──────────────────────────────────────┘
//! ```
//!
//! The file is memory-mapped (or read, for `.gz` files and
//! [`DatabaseOpener::in_memory`]) once at open. Lookups only read.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Geolocation database API
pub mod database;
mod endian;
/// Error types for database operations
pub mod error;
pub mod file_reader;
pub mod ip;
/// Descriptor-driven record codec
pub mod pack;
pub mod records;
/// SxGeo format implementation (internal)
mod sxgeo;
pub mod validation;

// Re-exports for Rust consumers

/// Database handle and its configuration
pub use crate::database::{
    Database, DatabaseInfo, DatabaseOpener, DatabaseOptions, GeoResult, Granularity, LoadMode,
};
pub use crate::error::{ErrorKind, Result, SxGeoError};
pub use crate::pack::{Charset, Descriptor, FieldKind, FieldSpec, Record, Value};
pub use crate::records::{City, Country, Location, Region};
pub use crate::sxgeo::{Layout, SxGeoHeader, Table, SCAN_THRESHOLD};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library major version
pub const VERSION_MAJOR: u32 = 0;

/// Library minor version
pub const VERSION_MINOR: u32 = 3;

/// Library patch version
pub const VERSION_PATCH: u32 = 1;
