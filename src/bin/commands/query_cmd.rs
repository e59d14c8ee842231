use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use sxgeo::Database;

use crate::cli_utils::ModeArg;

pub fn cmd_query(database: PathBuf, ip: String, mode: ModeArg, quiet: bool) -> Result<()> {
    let db = Database::from(&database)
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let result = db
        .lookup(&ip, mode.into())
        .with_context(|| format!("Query failed for: {}", ip))?;
    let found = result.is_some();

    if !quiet {
        // Always an array: one element on a hit, empty on a miss
        let output = match result {
            Some(geo) => json!([geo]),
            None => json!([]),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    std::process::exit(if found { 0 } else { 1 });
}
