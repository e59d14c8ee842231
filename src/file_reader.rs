//! File access with automatic gzip decompression
//!
//! Two jobs: bringing a database file into memory (mapped or read), and
//! handing the CLI a buffered line reader for batch input. Both detect
//! gzip by file extension.
//!
//! # Example
//!
//! ```rust,no_run
//! use sxgeo::file_reader;
//! use std::io::BufRead;
//!
//! // Automatically detects .gz and decompresses
//! let reader = file_reader::open("addresses.txt.gz")?;
//!
//! for line in reader.lines() {
//!     let line = line?;
//!     println!("{}", line);
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader, Read};
use std::path::Path;

/// Buffer size for file reading (128KB, matches CLI default)
const BUFFER_SIZE: usize = 128 * 1024;

/// True when the path ends in `.gz` (case-insensitive)
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a file for line-by-line reading
///
/// Files ending in `.gz` are decompressed on the fly. The path "-" reads
/// from stdin.
///
/// # Errors
///
/// Returns an error if:
/// - The file doesn't exist
/// - Permission denied
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)?;
    Ok(from_file(file, is_gzip(path)))
}

/// Create a reader from an already-opened file with explicit gzip flag
pub fn from_file(file: File, is_gzip: bool) -> Box<dyn BufRead + Send> {
    if is_gzip {
        let decoder = GzDecoder::new(file);
        Box::new(BufReader::with_capacity(BUFFER_SIZE, decoder))
    } else {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    }
}

/// Read a whole file into memory, decompressing `.gz` files
pub fn read_all<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    if is_gzip(path) {
        let mut data = Vec::new();
        GzDecoder::new(file).read_to_end(&mut data)?;
        Ok(data)
    } else {
        let mut data = Vec::with_capacity(file.metadata().map(|m| m.len() as usize).unwrap_or(0));
        BufReader::with_capacity(BUFFER_SIZE, file).read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Memory-map a file read-only
pub fn map<P: AsRef<Path>>(path: P) -> io::Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only and the database file is not expected to
    // change while it is open
    unsafe { Mmap::map(&file) }
}
