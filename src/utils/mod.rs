pub mod readers;

pub use readers::{open_reader, read_catalog, read_cwd_alleles, GlStringRecords};

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

pub type Result<T> = std::result::Result<T, String>;

pub fn handle_error_and_exit(err: String) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}

/// Opens `path` for writing, or standard output when no path is given.
pub fn create_writer(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}
