use crate::ld::locus::Locus;
use crate::utils::Result;
use itertools::Itertools;
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Loci known to exhibit linkage disequilibrium together and searched as one
/// group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Linkage {
    name: String,
    loci: BTreeSet<Locus>,
}

/// Locus groups searched when none are configured explicitly.
pub const DEFAULT_LINKAGES: [&str; 6] = [
    "C~B",
    "DRB1~DQB1",
    "DRB1~DRB345",
    "DQA1~DQB1",
    "DPA1~DPB1",
    "A~C~B~DRB1~DQB1",
];

impl Linkage {
    pub fn new(loci: BTreeSet<Locus>) -> Result<Self> {
        if loci.len() < 2 {
            return Err(format!(
                "A linkage needs at least two loci, got {}",
                loci.len()
            ));
        }
        let name = loci.iter().map(|locus| locus.short_name()).join("~");
        Ok(Linkage { name, loci })
    }

    pub fn defaults() -> Vec<Linkage> {
        DEFAULT_LINKAGES
            .iter()
            .filter_map(|encoding| encoding.parse().ok())
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn loci(&self) -> &BTreeSet<Locus> {
        &self.loci
    }
}

impl FromStr for Linkage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self> {
        let loci = s
            .split('~')
            .map(|locus| locus.parse::<Locus>())
            .collect::<Result<BTreeSet<_>>>()
            .map_err(|e| format!("Invalid linkage '{}': {}", s, e))?;
        Linkage::new(loci)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
