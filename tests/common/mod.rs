//! Fixture database writer shared by the integration tests
//!
//! Builds complete SxGeo 2.2 files in memory: header, descriptors, byte
//! and main indexes, rows, and packed region/country/city tables.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use sxgeo::{Charset, Descriptor, Record, Value};

pub const COUNTRY_PACK: &str = "T:id/c2:iso/n2:lat/n2:lon/b:name_ru/b:name_en";
pub const REGION_PACK: &str = "S:country_seek/M:id/c7:iso/b:name_ru/b:name_en";
pub const CITY_PACK: &str = "M:region_seek/T:country_id/M:id/N5:lat/N5:lon/b:name_ru/b:name_en";

pub const BYTE_INDEX_LEN: usize = 224;
pub const BUILD_TIME: u32 = 1_700_000_000;

/// What a row points at
#[derive(Debug, Clone, Copy)]
pub enum Target {
    /// Stored 0
    Unmapped,
    /// Country record by index
    Country(usize),
    /// City record by index
    City(usize),
    /// A literal id, for corrupt-database tests
    Raw(u32),
}

pub struct Fixture {
    charset: Charset,
    range: u16,
    countries: Vec<Record>,
    regions: Vec<(Record, usize)>,
    cities: Vec<(Record, usize)>,
    rows: Vec<(u32, Target)>,
}

fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn ip(s: &str) -> u32 {
    u32::from(s.parse::<Ipv4Addr>().unwrap())
}

impl Fixture {
    /// Empty fixture; country 0 is the blank record at offset 0
    pub fn new() -> Self {
        let mut fixture = Fixture {
            charset: Charset::Utf8,
            range: 16,
            countries: Vec::new(),
            regions: Vec::new(),
            cities: Vec::new(),
            rows: Vec::new(),
        };
        fixture.country(0, "", 0.0, 0.0, "", "");
        fixture
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn range(mut self, range: u16) -> Self {
        self.range = range;
        self
    }

    pub fn country(&mut self, id: u64, iso: &str, lat: f64, lon: f64, ru: &str, en: &str) -> usize {
        let mut r = Record::new();
        r.insert("id", Value::Uint(id));
        r.insert("iso", text(iso));
        r.insert("lat", Value::Double(lat));
        r.insert("lon", Value::Double(lon));
        r.insert("name_ru", text(ru));
        r.insert("name_en", text(en));
        self.countries.push(r);
        self.countries.len() - 1
    }

    pub fn region(&mut self, country: usize, id: u64, iso: &str, ru: &str, en: &str) -> usize {
        let mut r = Record::new();
        r.insert("id", Value::Uint(id));
        r.insert("iso", text(iso));
        r.insert("name_ru", text(ru));
        r.insert("name_en", text(en));
        self.regions.push((r, country));
        self.regions.len() - 1
    }

    pub fn city(&mut self, region: usize, id: u64, lat: f64, lon: f64, ru: &str, en: &str) -> usize {
        let country = self.regions[region].1;
        let country_id = self.countries[country].get("id").cloned().unwrap();
        let mut r = Record::new();
        r.insert("country_id", country_id);
        r.insert("id", Value::Uint(id));
        r.insert("lat", Value::Double(lat));
        r.insert("lon", Value::Double(lon));
        r.insert("name_ru", text(ru));
        r.insert("name_en", text(en));
        self.cities.push((r, region));
        self.cities.len() - 1
    }

    pub fn row(&mut self, start: &str, target: Target) -> &mut Self {
        self.rows.push((ip(start), target));
        self
    }

    pub fn row_at(&mut self, start: u32, target: Target) -> &mut Self {
        self.rows.push((start, target));
        self
    }

    /// Serialize the whole database
    pub fn build(&self) -> Vec<u8> {
        let country_desc = Descriptor::parse(COUNTRY_PACK).unwrap();
        let region_desc = Descriptor::parse(REGION_PACK).unwrap();
        let city_desc = Descriptor::parse(CITY_PACK).unwrap();

        let (country_bytes, country_offsets, max_country) =
            pack_table(&country_desc, self.countries.iter().cloned(), self.charset);

        let regions = self.regions.iter().map(|(r, country)| {
            let mut r = r.clone();
            r.insert("country_seek", Value::Uint(country_offsets[*country] as u64));
            r
        });
        let (region_bytes, region_offsets, max_region) =
            pack_table(&region_desc, regions, self.charset);

        let cities = self.cities.iter().map(|(r, region)| {
            let mut r = r.clone();
            r.insert("region_seek", Value::Uint(region_offsets[*region] as u64));
            r
        });
        let (city_bytes, city_offsets, max_city) = pack_table(&city_desc, cities, self.charset);

        let mut rows = self.rows.clone();
        rows.sort_by_key(|(start, _)| *start);
        let ids: Vec<u32> = rows
            .iter()
            .map(|(_, target)| match *target {
                Target::Unmapped => 0,
                Target::Country(i) => country_offsets[i],
                Target::City(i) => country_bytes.len() as u32 + city_offsets[i],
                Target::Raw(id) => id,
            })
            .collect();

        let range = self.range as usize;
        let byte_index: Vec<u32> = (0..BYTE_INDEX_LEN)
            .map(|octet| rows.iter().filter(|(s, _)| (s >> 24) as usize <= octet).count() as u32)
            .collect();
        let main_index: Vec<u32> = (1..)
            .map(|k| k * range)
            .take_while(|&row| row < rows.len())
            .map(|row| rows[row].0)
            .collect();

        let pack = format!("{}\0{}\0{}", COUNTRY_PACK, REGION_PACK, CITY_PACK);
        let charset_id: u8 = match self.charset {
            Charset::Utf8 => 0,
            Charset::Latin1 => 1,
            Charset::Cp1251 => 2,
        };
        let city_size = country_bytes.len() + city_bytes.len();

        let mut data = Vec::new();
        data.extend_from_slice(b"SxG");
        data.push(22);
        data.extend_from_slice(&BUILD_TIME.to_be_bytes());
        data.push(2); // database type
        data.push(charset_id);
        data.push(BYTE_INDEX_LEN as u8);
        data.extend_from_slice(&(main_index.len() as u16).to_be_bytes());
        data.extend_from_slice(&self.range.to_be_bytes());
        data.extend_from_slice(&(rows.len() as u32).to_be_bytes());
        data.push(3); // id length
        data.extend_from_slice(&(max_region as u16).to_be_bytes());
        data.extend_from_slice(&(max_city as u16).to_be_bytes());
        data.extend_from_slice(&(region_bytes.len() as u32).to_be_bytes());
        data.extend_from_slice(&(city_size as u32).to_be_bytes());
        data.extend_from_slice(&(max_country as u16).to_be_bytes());
        data.extend_from_slice(&(country_bytes.len() as u32).to_be_bytes());
        data.extend_from_slice(&(pack.len() as u16).to_be_bytes());
        assert_eq!(data.len(), 40);

        data.extend_from_slice(pack.as_bytes());
        for entry in byte_index.iter().chain(&main_index) {
            data.extend_from_slice(&entry.to_be_bytes());
        }
        for ((start, _), id) in rows.iter().zip(&ids) {
            data.extend_from_slice(&start.to_be_bytes()[1..]);
            data.extend_from_slice(&id.to_be_bytes()[1..]);
        }
        data.extend_from_slice(&region_bytes);
        data.extend_from_slice(&country_bytes);
        data.extend_from_slice(&city_bytes);
        data
    }
}

/// Encode records back to back; returns bytes, offsets and the stride
fn pack_table(
    descriptor: &Descriptor,
    records: impl Iterator<Item = Record>,
    charset: Charset,
) -> (Vec<u8>, Vec<u32>, usize) {
    let minimum: usize = descriptor
        .fields()
        .iter()
        .map(|f| f.kind.width().unwrap_or(1))
        .sum();

    let mut bytes = Vec::new();
    let mut offsets = Vec::new();
    let mut stride = minimum;
    for record in records {
        let encoded = descriptor.encode(&record, charset).unwrap();
        offsets.push(bytes.len() as u32);
        stride = stride.max(encoded.len());
        bytes.extend_from_slice(&encoded);
    }
    (bytes, offsets, stride)
}

/// Indexes into the standard fixture
pub struct Standard {
    pub us: usize,
    pub ru: usize,
    pub de: usize,
    pub california: usize,
    pub moscow_region: usize,
    pub mountain_view: usize,
    pub moscow: usize,
}

/// The fixture most tests use
///
/// - `5.0.0.0/8`: Germany, country-only
/// - `8.8.8.0/24`: Mountain View, California, US
/// - `77.88.0.0/16`: Moscow, Russia; `77.89.0.0+`: Russia, country-only
/// - `95.0.0.0/8`: 100 rows alternating between the two cities
/// - everything else in those octets unmapped; other octets have no rows
pub fn standard(charset: Charset) -> (Vec<u8>, Standard) {
    let mut f = Fixture::new().charset(charset).range(16);

    let us = f.country(225, "US", 38.0, -97.0, "США", "United States");
    let ru = f.country(185, "RU", 60.0, 100.0, "Россия", "Russia");
    let de = f.country(56, "DE", 51.0, 9.0, "Германия", "Germany");
    let california = f.region(us, 5332921, "US-CA", "Калифорния", "California");
    let moscow_region = f.region(ru, 524894, "RU-MOW", "Москва", "Moskva");
    let mountain_view = f.city(california, 5375480, 37.38605, -122.08385, "Маунтин-Вью", "Mountain View");
    let moscow = f.city(moscow_region, 524901, 55.75222, 37.61556, "Москва", "Moscow");

    f.row("1.0.0.0", Target::Unmapped)
        .row("5.0.0.0", Target::Country(de))
        .row("8.0.0.0", Target::Unmapped)
        .row("8.8.8.0", Target::City(mountain_view))
        .row("8.8.9.0", Target::Unmapped)
        .row("77.0.0.0", Target::Unmapped)
        .row("77.88.0.0", Target::City(moscow))
        .row("77.89.0.0", Target::Country(ru));
    for i in 0..100u32 {
        let city = if i % 2 == 0 { mountain_view } else { moscow };
        f.row_at(ip("95.0.0.0") + (i << 16), Target::City(city));
    }

    let ids = Standard {
        us,
        ru,
        de,
        california,
        moscow_region,
        mountain_view,
        moscow,
    };
    (f.build(), ids)
}
