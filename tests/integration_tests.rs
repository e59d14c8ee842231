//! End-to-end lookups against fixture databases
//!
//! Covers the four query modes, the city → region → country chain,
//! country-only rows, lookup misses, and opening from disk.

mod common;

use common::{standard, Fixture, Target};
use std::io::Write;
use std::sync::Arc;
use sxgeo::{Charset, Database, ErrorKind, GeoResult, Granularity, SxGeoError};
use tempfile::NamedTempFile;

fn standard_db() -> Database {
    Database::from_bytes(standard(Charset::Utf8).0).unwrap()
}

#[test]
fn test_loopback_is_miss_in_every_mode() {
    let db = standard_db();
    assert!(db.city_of("127.0.0.1").unwrap().is_none());
    assert!(db.region_of("127.0.0.1").unwrap().is_none());
    assert!(db.country_of("127.0.0.1").unwrap().is_none());
    assert!(db.full_of("127.0.0.1").unwrap().is_none());
}

#[test]
fn test_reserved_and_out_of_index_octets() {
    let db = standard_db();
    for ip in ["0.0.0.0", "0.1.2.3", "10.0.0.1", "10.8.8.8", "127.255.255.255", "224.0.0.1", "255.255.255.255"] {
        assert!(db.full_of(ip).unwrap().is_none(), "{} should miss", ip);
        assert!(db.seek_of(ip).unwrap().is_none(), "{} should have no seek", ip);
    }
}

#[test]
fn test_malformed_input_is_miss_not_error() {
    let db = standard_db();
    for ip in ["999.1.1.1", "256.0.0.1", "8.8.8", "8.8.8.8.8", "8.8.8.x", "abc", "", " 8.8.8.8", "::1"] {
        assert!(db.country_of(ip).unwrap().is_none(), "{:?} should miss", ip);
    }
}

#[test]
fn test_google_dns_chain() {
    let db = standard_db();

    let city = db.city_of("8.8.8.8").unwrap().unwrap();
    assert_eq!(city.name_en(), Some("Mountain View"));
    assert_eq!(city.name_ru(), Some("Маунтин-Вью"));
    assert_eq!(city.id(), Some(5375480));
    assert!((city.latitude().unwrap() - 37.38605).abs() < 1e-9);
    assert!((city.longitude().unwrap() + 122.08385).abs() < 1e-9);
    // Linkage offsets are not part of the visible record
    assert!(city.get("region_seek").is_none());

    let region = db.region_of("8.8.8.8").unwrap().unwrap();
    assert_eq!(region.iso(), Some("US-CA"));
    assert_eq!(region.name_en(), Some("California"));
    assert!(region.get("country_seek").is_none());

    let country = db.country_of("8.8.8.8").unwrap().unwrap();
    let iso = country.iso().unwrap();
    assert_eq!(iso, "US");
    assert!(iso.len() == 2 && iso.chars().all(|c| c.is_ascii_uppercase()));
    assert!((country.latitude().unwrap() - 38.0).abs() < 1e-9);

    let full = db.full_of("8.8.8.8").unwrap().unwrap();
    assert_eq!(full.city, Some(city));
    assert_eq!(full.region, Some(region));
    assert_eq!(full.country, country);
}

#[test]
fn test_range_edges() {
    let db = standard_db();
    let city = |ip: &str| db.city_of(ip).unwrap().and_then(|c| c.name_en().map(String::from));

    assert_eq!(city("8.8.8.0").as_deref(), Some("Mountain View"));
    assert_eq!(city("8.8.8.255").as_deref(), Some("Mountain View"));
    // Neighbouring unmapped rows
    assert_eq!(city("8.8.7.255"), None);
    assert_eq!(city("8.8.9.0"), None);
    assert_eq!(city("8.200.0.0"), None);
    // Octets without rows
    assert_eq!(city("9.9.9.9"), None);
    assert_eq!(city("100.1.1.1"), None);
}

#[test]
fn test_country_only_rows() {
    let db = standard_db();

    assert!(db.city_of("5.1.2.3").unwrap().is_none());
    assert!(db.region_of("5.1.2.3").unwrap().is_none());

    let country = db.country_of("5.1.2.3").unwrap().unwrap();
    assert_eq!(country.iso(), Some("DE"));
    assert_eq!(country.name_en(), Some("Germany"));

    let full = db.full_of("5.255.255.255").unwrap().unwrap();
    assert!(full.city.is_none());
    assert!(full.region.is_none());
    assert_eq!(full.country, country);

    let ru = db.country_of("77.200.0.1").unwrap().unwrap();
    assert_eq!(ru.iso(), Some("RU"));
}

#[test]
fn test_moscow_and_main_index_blocks() {
    let db = standard_db();

    let full = db.full_of("77.88.8.8").unwrap().unwrap();
    assert_eq!(full.city.unwrap().name_ru(), Some("Москва"));
    assert_eq!(full.region.unwrap().iso(), Some("RU-MOW"));
    assert_eq!(full.country.iso(), Some("RU"));

    // 95.x holds 100 rows: even /16s are Mountain View, odd ones Moscow
    for second in 0..100u32 {
        let ip = format!("95.{}.{}.{}", second, second % 7, 255 - second);
        let city = db.city_of(&ip).unwrap().unwrap();
        let expected = if second % 2 == 0 { "Mountain View" } else { "Moscow" };
        assert_eq!(city.name_en(), Some(expected), "{}", ip);
    }
    assert_eq!(
        db.city_of("95.255.0.0").unwrap().unwrap().name_en(),
        Some("Moscow")
    );
}

#[test]
fn test_lookup_granularity() {
    let db = standard_db();

    assert!(matches!(
        db.lookup("8.8.8.8", Granularity::City).unwrap(),
        Some(GeoResult::City(_))
    ));
    assert!(matches!(
        db.lookup("8.8.8.8", Granularity::Region).unwrap(),
        Some(GeoResult::Region(_))
    ));
    assert!(matches!(
        db.lookup("8.8.8.8", Granularity::Country).unwrap(),
        Some(GeoResult::Country(_))
    ));
    assert!(matches!(
        db.lookup("8.8.8.8", Granularity::default()).unwrap(),
        Some(GeoResult::Full(_))
    ));
    assert!(db.lookup("5.0.0.1", Granularity::City).unwrap().is_none());
}

#[test]
fn test_full_json_shape() {
    let db = standard_db();
    let json = serde_json::to_value(db.full_of("8.8.8.8").unwrap().unwrap()).unwrap();

    assert_eq!(json["country"]["iso"], "US");
    assert_eq!(json["region"]["name_en"], "California");
    assert_eq!(json["city"]["name_en"], "Mountain View");
    assert_eq!(json["city"]["country_id"], 225);
    assert!(json["city"].get("region_seek").is_none());

    let country_only = serde_json::to_value(db.full_of("5.5.5.5").unwrap().unwrap()).unwrap();
    assert!(country_only.get("city").is_none());
    assert_eq!(country_only["country"]["iso"], "DE");
}

#[test]
fn test_cp1251_strings() {
    let (data, _) = standard(Charset::Cp1251);
    let db = Database::from_bytes(data).unwrap();

    assert_eq!(db.info().charset, Charset::Cp1251);
    let full = db.full_of("77.88.1.1").unwrap().unwrap();
    assert_eq!(full.city.unwrap().name_ru(), Some("Москва"));
    assert_eq!(full.country.name_ru(), Some("Россия"));
}

#[test]
fn test_info() {
    let db = standard_db();
    let info = db.info();

    assert_eq!(info.version, 22);
    assert_eq!(info.build_time, common::BUILD_TIME);
    assert_eq!(info.rows, 108);
    assert_eq!(info.byte_index_len, 224);
    assert_eq!(info.main_index_len, 6);
    assert_eq!(info.range, 16);
    assert_eq!(info.id_len, 3);
    assert_eq!(info.country_fields, common::COUNTRY_PACK);
    assert_eq!(info.region_fields, common::REGION_PACK);
    assert_eq!(info.city_fields, common::CITY_PACK);
}

#[test]
fn test_bad_magic_is_format_error() {
    let (mut data, _) = standard(Charset::Utf8);
    data[0..3].copy_from_slice(b"XyZ");

    let err = Database::from_bytes(data).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_truncated_file() {
    let (data, _) = standard(Charset::Utf8);

    let err = Database::from_bytes(data[..20].to_vec()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Io);

    // Header intact, sections cut off
    let err = Database::from_bytes(data[..data.len() - 10].to_vec()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_broken_linkage_is_error() {
    let (good, _) = standard(Charset::Utf8);
    let city_size = sxgeo::Database::from_bytes(good).unwrap().info().city_size;

    let mut f = Fixture::new();
    f.row("8.8.8.0", Target::Raw(city_size + 100));
    let db = Database::from_bytes(f.build()).unwrap();

    let err = db.full_of("8.8.8.8").unwrap_err();
    assert!(matches!(err, SxGeoError::OutOfBounds { section: "cities", .. }));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_strict_open() {
    let (data, _) = standard(Charset::Utf8);
    assert!(Database::from_bytes_builder(data).strict().open().is_ok());

    let mut f = Fixture::new();
    f.row("8.8.8.0", Target::Raw(0x00FF_FFFF));
    let err = Database::from_bytes_builder(f.build())
        .strict()
        .open()
        .err()
        .unwrap();
    assert!(matches!(err, SxGeoError::InvalidFormat(ref m) if m.contains("validation failed")));

    // Without strict the same file opens; the damage shows on lookup
    let mut f = Fixture::new();
    f.row("8.8.8.0", Target::Raw(0x00FF_FFFF));
    assert!(Database::from_bytes(f.build()).is_ok());
}

#[test]
fn test_open_from_disk() {
    let (data, _) = standard(Charset::Utf8);
    let mut file = NamedTempFile::with_suffix(".dat").unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let mapped = Database::open(file.path()).unwrap();
    let loaded = Database::from(file.path()).in_memory().open().unwrap();

    assert_eq!(mapped.full_of("8.8.8.8").unwrap(), loaded.full_of("8.8.8.8").unwrap());
    assert_eq!(mapped.info(), loaded.info());
}

#[test]
fn test_open_gzip() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let (data, _) = standard(Charset::Utf8);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&data).unwrap();

    let mut file = NamedTempFile::with_suffix(".dat.gz").unwrap();
    file.write_all(&encoder.finish().unwrap()).unwrap();
    file.flush().unwrap();

    let db = Database::open(file.path()).unwrap();
    assert_eq!(db.info().file_size, data.len());
    assert_eq!(db.country_of("8.8.8.8").unwrap().unwrap().iso(), Some("US"));
}

#[test]
fn test_open_missing_file() {
    let err = Database::open("/nonexistent/dir/SxGeoCity.dat").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_shared_across_threads() {
    let db = Arc::new(standard_db());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || {
                for i in 0..50u32 {
                    let ip = format!("95.{}.0.{}", (i + t) % 100, i);
                    assert!(db.city_of(&ip).unwrap().is_some());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_validation_of_standard_fixture() {
    let db = standard_db();
    let report = db.validate();

    assert!(report.is_valid(), "{:?}", report.errors);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.stats.rows, 108);
    assert_eq!(report.stats.unmapped_rows, 4);
    assert_eq!(report.stats.country_rows, 2);
    assert_eq!(report.stats.city_rows, 102);
    assert_eq!(report.stats.distinct_cities, 2);
    assert_eq!(report.stats.distinct_regions, 2);
    assert_eq!(report.stats.distinct_countries, 3);
}
