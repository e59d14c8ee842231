//! Typed views over decoded records
//!
//! A [`Record`] is a plain name → value map. The views here add accessors
//! for the fields every Sypex Geo database carries and keep the linkage
//! offsets (`region_seek`, `country_seek`) out of the caller-visible map.

use crate::error::{Result, SxGeoError};
use crate::pack::{Record, Value};
use crate::sxgeo::{Layout, Table, COUNTRY_LINK, REGION_LINK};
use serde::Serialize;

/// Decodes records out of a database buffer
///
/// Every offset is relative to its table: cities and countries to the
/// city section, regions to the region section.
pub(crate) struct RecordReader<'a> {
    data: &'a [u8],
    layout: &'a Layout,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(data: &'a [u8], layout: &'a Layout) -> Self {
        Self { data, layout }
    }

    fn decode(&self, table: Table, seek: u32) -> Result<Record> {
        let descriptor = self.layout.descriptor(table);
        if descriptor.is_empty() {
            return Err(SxGeoError::InvalidFormat(format!(
                "database has no {} table",
                table.name()
            )));
        }
        let window = self.layout.record_window(self.data, table, seek)?;
        descriptor.decode(&window, self.layout.charset)
    }

    pub(crate) fn city(&self, seek: u32) -> Result<City> {
        self.decode(Table::Cities, seek).and_then(City::new)
    }

    pub(crate) fn region(&self, seek: u32) -> Result<Region> {
        self.decode(Table::Regions, seek).and_then(Region::new)
    }

    pub(crate) fn country(&self, seek: u32) -> Result<Country> {
        self.decode(Table::Countries, seek).map(Country::new)
    }
}

macro_rules! common_accessors {
    () => {
        /// Numeric `id` field
        pub fn id(&self) -> Option<u64> {
            self.record.get("id").and_then(Value::as_u64)
        }

        /// English name (`name_en`)
        pub fn name_en(&self) -> Option<&str> {
            self.record.get("name_en").and_then(Value::as_str)
        }

        /// Russian name (`name_ru`)
        pub fn name_ru(&self) -> Option<&str> {
            self.record.get("name_ru").and_then(Value::as_str)
        }

        /// Any field by name
        pub fn get(&self, name: &str) -> Option<&Value> {
            self.record.get(name)
        }

        /// All caller-visible fields
        pub fn record(&self) -> &Record {
            &self.record
        }

        /// Consume the view, keeping the field map
        pub fn into_record(self) -> Record {
            self.record
        }
    };
}

fn take_seek(record: &mut Record, name: &str) -> Result<u32> {
    let value = record.remove(name);
    match value.as_ref().and_then(Value::as_u64) {
        Some(seek) => u32::try_from(seek).map_err(|_| SxGeoError::OutOfBounds {
            section: "linkage",
            offset: seek,
            limit: u32::MAX as u64,
        }),
        None => Err(SxGeoError::InvalidFormat(format!(
            "record linkage '{}' is {:?}, not an offset",
            name, value
        ))),
    }
}

/// A city record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct City {
    record: Record,
    #[serde(skip)]
    pub(crate) region_seek: u32,
}

impl City {
    pub(crate) fn new(mut record: Record) -> Result<Self> {
        let region_seek = take_seek(&mut record, REGION_LINK)?;
        Ok(Self {
            record,
            region_seek,
        })
    }

    common_accessors!();

    /// Latitude in degrees
    pub fn latitude(&self) -> Option<f64> {
        self.record.get("lat").and_then(Value::as_f64)
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> Option<f64> {
        self.record.get("lon").and_then(Value::as_f64)
    }
}

/// A region record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Region {
    record: Record,
    #[serde(skip)]
    pub(crate) country_seek: u32,
}

impl Region {
    pub(crate) fn new(mut record: Record) -> Result<Self> {
        let country_seek = take_seek(&mut record, COUNTRY_LINK)?;
        Ok(Self {
            record,
            country_seek,
        })
    }

    common_accessors!();

    /// Region ISO 3166-2 code
    pub fn iso(&self) -> Option<&str> {
        self.record.get("iso").and_then(Value::as_str)
    }
}

/// A country record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Country {
    record: Record,
}

impl Country {
    pub(crate) fn new(record: Record) -> Self {
        Self { record }
    }

    common_accessors!();

    /// Two-letter ISO 3166-1 code
    pub fn iso(&self) -> Option<&str> {
        self.record.get("iso").and_then(Value::as_str)
    }

    /// Latitude in degrees
    pub fn latitude(&self) -> Option<f64> {
        self.record.get("lat").and_then(Value::as_f64)
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> Option<f64> {
        self.record.get("lon").and_then(Value::as_f64)
    }
}

/// City, region and country for one address
///
/// `city` and `region` are absent when the address maps straight to a
/// country record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    /// City record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,
    /// Region record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    /// Country record
    pub country: Country,
}
