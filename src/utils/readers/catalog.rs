use super::input::open_reader;
use crate::ld::{
    catalog::compute_relative_frequencies, DisequilibriumElement, Locus, RelativeFrequencyByRace,
};
use crate::utils::Result;
use std::{collections::BTreeSet, io::BufRead, path::Path};

/// Loads one locus group of disequilibrium elements from a tab-separated
/// frequency file.
///
/// The header lists the loci followed by optional race codes. Every later
/// line carries one allele set per locus (alternatives separated by `/`)
/// and one frequency per race.
pub fn read_catalog(path: &Path) -> Result<(BTreeSet<Locus>, Vec<DisequilibriumElement>)> {
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_catalog(open_reader(path)?, &source)
        .map_err(|e| format!("Error reading catalog {}: {}", path.display(), e))
}

fn parse_catalog<R: BufRead>(
    reader: R,
    source: &str,
) -> Result<(BTreeSet<Locus>, Vec<DisequilibriumElement>)> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| {
            line.as_ref()
                .map(|l| !l.trim().is_empty() && !l.starts_with('#'))
                .unwrap_or(true)
        });

    let (_, header) = lines.next().ok_or("Catalog is empty")?;
    let header = header.map_err(|e| e.to_string())?;
    let columns: Vec<&str> = header.trim_end().split('\t').map(str::trim).collect();
    let loci: Vec<Locus> = columns
        .iter()
        .map_while(|column| column.parse::<Locus>().ok())
        .collect();
    if loci.len() < 2 {
        return Err(format!(
            "Header must start with at least two loci: {}",
            header.trim_end()
        ));
    }
    let races = &columns[loci.len()..];
    let group: BTreeSet<Locus> = loci.iter().copied().collect();
    if group.len() != loci.len() {
        return Err(format!("Header repeats a locus: {}", header.trim_end()));
    }

    let mut elements = Vec::new();
    for (line_number, line) in lines {
        let line = line.map_err(|e| e.to_string())?;
        let fields: Vec<&str> = line.trim_end().split('\t').map(str::trim).collect();
        if fields.len() != columns.len() {
            return Err(format!(
                "Line {}: expected {} fields, found {}",
                line_number,
                columns.len(),
                fields.len()
            ));
        }
        let (allele_fields, frequency_fields) = fields.split_at(loci.len());
        let alleles = loci
            .iter()
            .zip(allele_fields)
            .map(|(&locus, field)| parse_allele_set(locus, field).map(|set| (locus, set)))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| format!("Line {}: {}", line_number, e))?;
        let frequencies = races
            .iter()
            .zip(frequency_fields)
            .map(|(race, field)| {
                field
                    .parse::<f64>()
                    .map(|frequency| RelativeFrequencyByRace::new(*race, frequency))
                    .map_err(|_| {
                        format!("Line {}: invalid frequency '{}'", line_number, field)
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        elements.push(
            DisequilibriumElement::new(alleles)
                .with_frequencies(frequencies)
                .with_source(source),
        );
    }

    compute_relative_frequencies(&mut elements);
    log::debug!(
        "Loaded {} elements for {} from {}",
        elements.len(),
        loci.iter().map(|l| l.short_name()).collect::<Vec<_>>().join("~"),
        source
    );
    Ok((group, elements))
}

/// Qualifies bare allele names such as `07:01` with the column's locus. A
/// family column has no single locus to qualify with, so its alleles must
/// carry their member locus.
fn parse_allele_set(locus: Locus, field: &str) -> Result<Vec<String>> {
    let alleles = field
        .split('/')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            if name.contains('*') {
                Ok(name.to_string())
            } else if locus.is_family() {
                Err(format!(
                    "allele '{}' under {} must name its locus (e.g. HLA-DRB3*{})",
                    name, locus, name
                ))
            } else {
                Ok(format!("{}*{}", locus, name))
            }
        })
        .collect::<Result<Vec<String>>>()?;
    if alleles.is_empty() {
        return Err(format!("empty allele set for {}", locus));
    }
    Ok(alleles)
}
