use anyhow::{Context, Result};
use serde_json::json;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use sxgeo::{file_reader, Database, Granularity};

use crate::cli_utils::{
    csv_row, format_number, format_qps, BatchFormat, LineScanner, ModeArg, CSV_HEADER,
};

/// Output sink for batch results
enum BatchWriter {
    Json(BufWriter<io::Stdout>),
    Csv(csv::Writer<io::Stdout>),
}

pub fn cmd_batch(
    database: PathBuf,
    inputs: Vec<PathBuf>,
    format: BatchFormat,
    mode: ModeArg,
    in_memory: bool,
    show_stats: bool,
) -> Result<()> {
    let load_start = Instant::now();
    let mut opener = Database::from(&database);
    if in_memory {
        opener = opener.in_memory();
    }
    let db = opener
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let load_time = load_start.elapsed();

    if show_stats {
        eprintln!("[INFO] Loaded database: {}", database.display());
        eprintln!("[INFO] Load time: {:.2}ms", load_time.as_secs_f64() * 1000.0);
    }

    let granularity: Granularity = mode.into();
    let mut out = match format {
        BatchFormat::Json => BatchWriter::Json(BufWriter::new(io::stdout())),
        BatchFormat::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            writer.write_record(CSV_HEADER)?;
            BatchWriter::Csv(writer)
        }
    };

    let start = Instant::now();
    let mut total = 0usize;
    let mut found = 0usize;
    let mut line = Vec::with_capacity(64);

    for input in &inputs {
        let reader = file_reader::open(input)
            .with_context(|| format!("Failed to open input: {}", input.display()))?;
        let mut scanner = LineScanner::new(reader);

        while scanner
            .read_line(&mut line)
            .with_context(|| format!("Failed to read: {}", input.display()))?
        {
            let ip = String::from_utf8_lossy(&line);
            let result = db
                .lookup(&ip, granularity)
                .with_context(|| format!("Lookup failed for: {}", ip))?;

            total += 1;
            if result.is_some() {
                found += 1;
            }

            match &mut out {
                BatchWriter::Json(w) => {
                    serde_json::to_writer(&mut *w, &json!({ "ip": ip, "result": result }))?;
                    w.write_all(b"\n")?;
                }
                BatchWriter::Csv(w) => w.write_record(csv_row(&ip, result.as_ref()))?,
            }
        }
    }

    match out {
        BatchWriter::Json(mut w) => w.flush()?,
        BatchWriter::Csv(mut w) => w.flush()?,
    }

    if show_stats {
        let elapsed = start.elapsed().as_secs_f64();
        let qps = if elapsed > 0.0 {
            total as f64 / elapsed
        } else {
            0.0
        };
        eprintln!(
            "[INFO] Lookups: {} ({} found, {} missed)",
            format_number(total),
            format_number(found),
            format_number(total - found)
        );
        eprintln!("[INFO] Throughput: {} lookups/s", format_qps(qps));
    }

    Ok(())
}
