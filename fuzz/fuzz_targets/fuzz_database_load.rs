#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::Ipv4Addr;
use sxgeo::Granularity;

fuzz_target!(|data: &[u8]| {
    // Garbage must become an error or a report entry, never a panic
    let _ = sxgeo::validation::validate_bytes(data);

    let Ok(db) = sxgeo::Database::from_bytes(data.to_vec()) else {
        return;
    };

    // Lookups on a damaged file may fail but must not panic
    for first in [1u8, 5, 8, 77, 95, 128, 200, 223] {
        for low in [0u32, 0x0001_0203, 0x0080_0000, 0x00FF_FFFF] {
            let addr = Ipv4Addr::from(((first as u32) << 24) | low);
            let _ = db.lookup_ip(addr, Granularity::Full);
            let _ = db.lookup_ip(addr, Granularity::Region);
        }
    }
    let _ = db.info();
});
