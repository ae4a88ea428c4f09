pub mod catalog;
pub mod findings;
pub mod genotype;
pub mod haplotype;
pub mod linkage;
pub mod locus;
pub mod matcher;
pub mod pairs;
#[cfg(test)]
mod test_utils;
pub mod writers;

pub use catalog::{DisequilibriumElement, ReferenceCatalog, RelativeFrequencyByRace};
pub use findings::{detect_linkages, detect_linkages_with_params, DetectedLinkageFindings, Params};
pub use genotype::{ChromosomeCopy, Genotype, GenotypeList};
pub use haplotype::Haplotype;
pub use linkage::Linkage;
pub use locus::Locus;
pub use pairs::HaplotypePair;
