use super::input::open_reader;
use crate::utils::Result;
use std::{io::BufRead, path::Path};

/// Reads a list of common, well documented alleles, one per line.
/// The first tab-separated field is taken when a line has several.
pub fn read_cwd_alleles(path: &Path) -> Result<Vec<String>> {
    let reader = open_reader(path)?;
    let mut alleles = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| format!("Error reading {}: {}", path.display(), e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(allele) = trimmed.split('\t').next() {
            alleles.push(allele.trim().to_string());
        }
    }
    log::debug!("Loaded {} CWD alleles from {}", alleles.len(), path.display());
    Ok(alleles)
}
