use crate::ld::genotype::{Genotype, GenotypeList};
use std::collections::BTreeSet;

/// Parses a GL String without `|` alternatives into its single genotype.
pub fn genotype(gl_string: &str) -> Genotype {
    let list = GenotypeList::parse("s1", gl_string).unwrap();
    let loci: BTreeSet<_> = list.loci().collect();
    let mut genotypes = list.genotypes(&loci);
    assert_eq!(genotypes.len(), 1, "expected one genotype in {}", gl_string);
    genotypes.remove(0)
}
