use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use sxgeo::validation::validate_database;

pub fn cmd_validate(database: PathBuf, json_output: bool, verbose: bool) -> Result<()> {
    let start = Instant::now();
    let report = validate_database(&database)
        .with_context(|| format!("Validation failed: {}", database.display()))?;
    let duration = start.elapsed();

    if json_output {
        let output = json!({
            "database": database.display().to_string(),
            "is_valid": report.is_valid(),
            "duration_ms": duration.as_millis(),
            "errors": report.errors,
            "warnings": report.warnings,
            "info": report.info,
            "stats": {
                "file_size": report.stats.file_size,
                "version": report.stats.version,
                "rows": report.stats.rows,
                "byte_index_entries": report.stats.byte_index_entries,
                "main_index_entries": report.stats.main_index_entries,
                "unmapped_rows": report.stats.unmapped_rows,
                "country_rows": report.stats.country_rows,
                "city_rows": report.stats.city_rows,
                "distinct_cities": report.stats.distinct_cities,
                "distinct_regions": report.stats.distinct_regions,
                "distinct_countries": report.stats.distinct_countries,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Validating: {}", database.display());
        println!();

        println!("Statistics:");
        println!("  {}", report.stats.summary());
        println!("  Validation time: {}ms", duration.as_millis());
        println!();

        if !report.errors.is_empty() {
            println!("❌ ERRORS ({}):", report.errors.len());
            for error in &report.errors {
                println!("  • {}", error);
            }
            println!();
        }

        if !report.warnings.is_empty() && verbose {
            println!("⚠️  WARNINGS ({}):", report.warnings.len());
            for warning in &report.warnings {
                println!("  • {}", warning);
            }
            println!();
        } else if !report.warnings.is_empty() {
            println!(
                "⚠️  {} warning(s) (use --verbose to show)",
                report.warnings.len()
            );
            println!();
        }

        if verbose && !report.info.is_empty() {
            println!("ℹ️  INFORMATION ({}):", report.info.len());
            for info in &report.info {
                println!("  • {}", info);
            }
            println!();
        }

        if report.is_valid() {
            println!("✅ VALIDATION PASSED");
        } else {
            println!("❌ VALIDATION FAILED");
            println!("   Database has {} error(s).", report.errors.len());
        }
    }

    if report.is_valid() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
