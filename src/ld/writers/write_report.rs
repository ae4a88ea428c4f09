//! Defines the `ReportWriter` struct for writing detected linkages as TSV.

use crate::ld::findings::DetectedLinkageFindings;
use crate::utils::Result;
use std::{collections::HashSet, io::Write};

const HEADER: [&str; 5] = ["id", "linkage", "haplotype1", "haplotype2", "hladb"];
const NON_CWD_LABEL: &str = "NON_CWD";
const MISSING: &str = "-";

/// Writes one row per linked pair and one row per non-CWD allele.
///
/// Rows name catalog elements, so distinct candidate pairs that matched the
/// same two elements share one row.
pub struct ReportWriter<W: Write> {
    writer: W,
    /// Skip genotypes whose every searched locus group produced a pair.
    warnings_only: bool,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(mut writer: W, warnings_only: bool) -> Result<Self> {
        writeln!(writer, "{}", HEADER.join("\t"))
            .map_err(|e| format!("Failed to write report header: {}", e))?;
        Ok(ReportWriter {
            writer,
            warnings_only,
        })
    }

    pub fn write(&mut self, findings: &DetectedLinkageFindings) -> Result<()> {
        if self.warnings_only && !findings.has_anomalies() {
            return Ok(());
        }
        let id = findings.genotype().id();
        let hladb = findings.hladb();
        let io_err = |e: std::io::Error| format!("Failed to write findings for {}: {}", id, e);

        for linkage_findings in findings.linked_pairs() {
            let mut written = HashSet::new();
            for pair in &linkage_findings.pairs {
                let first = pair.first().element().to_string();
                let second = pair.second().element().to_string();
                let key = if first <= second {
                    (first.clone(), second.clone())
                } else {
                    (second.clone(), first.clone())
                };
                if !written.insert(key) {
                    continue;
                }
                writeln!(
                    self.writer,
                    "{}\t{}\t{}\t{}\t{}",
                    id, linkage_findings.linkage, first, second, hladb
                )
                .map_err(io_err)?;
            }
        }
        for alleles in findings.non_cwd_alleles().values() {
            for allele in alleles {
                writeln!(
                    self.writer,
                    "{}\t{}\t{}\t{}\t{}",
                    id, NON_CWD_LABEL, allele, MISSING, hladb
                )
                .map_err(io_err)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer
            .flush()
            .map_err(|e| format!("Failed to flush report: {}", e))?;
        Ok(self.writer)
    }
}
