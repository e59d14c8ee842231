//! Sypex Geo (SxGeo) Reader
//!
//! Reads version 2.2 `SxGeo` city databases: a fixed header, three embedded
//! record descriptors, a two-level address index and packed record tables.
//!
//! ## Architecture
//!
//! - **types**: format constants and the [`Table`] enum
//! - **format**: header, descriptor and index parsing into a [`Layout`]
//! - **index**: two-level search from an address to a record offset
//!
//! Record decoding lives in `crate::pack`, driven by the descriptors parsed
//! here.

pub mod format;
pub mod index;
pub mod types;

pub use format::{Layout, SxGeoHeader, COUNTRY_LINK, REGION_LINK};
pub use index::{IndexSearch, SCAN_THRESHOLD};
pub use types::Table;
