use anyhow::{Context, Result};
use std::path::PathBuf;
use sxgeo::Database;

use crate::cli_utils::{format_bytes, format_number, format_unix_timestamp};

pub fn cmd_inspect(database: PathBuf, json_output: bool, verbose: bool) -> Result<()> {
    let db = Database::from(&database)
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let info = db.info();

    if json_output {
        let mut output = serde_json::to_value(&info)?;
        output["file"] = database.display().to_string().into();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let kind = if info.city_fields.is_empty() && info.country_fields.is_empty() {
        "Country id database"
    } else if info.city_fields.is_empty() {
        "Country database"
    } else {
        "City database"
    };

    println!("Database: {}", database.display());
    println!("Format:   SxGeo v{} ({})", info.version, kind);
    println!("Size:     {}", format_bytes(info.file_size));
    println!(
        "Built:    {} ({})",
        format_unix_timestamp(info.build_time as u64),
        info.build_time
    );
    println!("Charset:  {:?}", info.charset);
    println!();
    println!("Index:");
    println!("  Rows:            {}", format_number(info.rows as usize));
    println!("  Byte index:      {} entries", info.byte_index_len);
    println!(
        "  Main index:      {} entries (range {})",
        info.main_index_len, info.range
    );
    println!("  Row id length:   {} bytes", info.id_len);
    println!();
    println!("Tables:");
    println!("  Countries:       {}", format_bytes(info.country_size as usize));
    println!("  Regions:         {}", format_bytes(info.region_size as usize));
    println!(
        "  Cities:          {}",
        format_bytes(info.city_size.saturating_sub(info.country_size) as usize)
    );

    if verbose {
        println!();
        println!("Descriptors:");
        for (name, fields) in [
            ("country", &info.country_fields),
            ("region", &info.region_fields),
            ("city", &info.city_fields),
        ] {
            if fields.is_empty() {
                println!("  {:<8} (none)", name);
            } else {
                println!("  {:<8} {}", name, fields);
            }
        }
    }

    Ok(())
}
