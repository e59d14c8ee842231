#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use sxgeo::{Charset, Database, Granularity};

#[path = "../../tests/common/mod.rs"]
mod common;

fn database() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let (data, _) = common::standard(Charset::Utf8);
        Database::from_bytes(data).expect("Failed to load fixture database")
    })
}

fuzz_target!(|data: &[u8]| {
    let db = database();

    // Query text as the caller would pass it
    let text = String::from_utf8_lossy(data);
    let _ = db.full_of(&text);
    let _ = db.seek_of(&text);

    // Every address in the fixture resolves without error
    if data.len() >= 4 {
        let addr = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
        for granularity in [
            Granularity::City,
            Granularity::Region,
            Granularity::Country,
            Granularity::Full,
        ] {
            db.lookup_ip(addr, granularity)
                .expect("lookup on a valid database failed");
        }
        let _ = db.lookup(&addr.to_string(), Granularity::Full);
    }
});
