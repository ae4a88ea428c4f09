use crate::utils::Result;
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

const BUFFER_CAPACITY: usize = 128 * 1024;

/// Opens a plain or gzip-compressed text file, picked by the `.gz` extension.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let is_gzipped = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gzipped {
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_CAPACITY,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_CAPACITY, file)))
    }
}
