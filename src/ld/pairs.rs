use crate::ld::{genotype::Genotype, locus::Locus, matcher::LinkedHaplotype};
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    hash::{Hash, Hasher},
};

/// Two linked haplotypes that together explain the genotype at a locus group.
///
/// The pair is unordered: equality and hashing only look at the allele
/// content of the two haplotypes, so `(h1, h2)` and `(h2, h1)` are the same
/// pair, as are pairs differing only in the copies their alleles came from.
#[derive(Debug, Clone)]
pub struct HaplotypePair {
    first: LinkedHaplotype,
    second: LinkedHaplotype,
}

impl HaplotypePair {
    pub fn new(first: LinkedHaplotype, second: LinkedHaplotype) -> Self {
        HaplotypePair { first, second }
    }

    pub fn first(&self) -> &LinkedHaplotype {
        &self.first
    }

    pub fn second(&self) -> &LinkedHaplotype {
        &self.second
    }

    fn key(&self) -> (&BTreeMap<Locus, Vec<String>>, &BTreeMap<Locus, Vec<String>>) {
        let a = self.first.haplotype().alleles();
        let b = self.second.haplotype().alleles();
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl PartialEq for HaplotypePair {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for HaplotypePair {}

impl Hash for HaplotypePair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Pairs up linked haplotypes that can sit on opposite chromosome copies.
///
/// At every locus of the group the two haplotypes must come from different
/// copies, unless the genotype is homozygous there. Each unordered pair of
/// distinct entries is visited once and the result is deduplicated in
/// first-seen order.
pub fn resolve_pairs(
    linked: &[LinkedHaplotype],
    loci: &BTreeSet<Locus>,
    genotype: &Genotype,
) -> Vec<HaplotypePair> {
    let homozygous: BTreeSet<Locus> = loci
        .iter()
        .copied()
        .filter(|&locus| genotype.is_homozygous(locus))
        .collect();

    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for (h1, h2) in linked.iter().tuple_combinations() {
        let opposite = loci.iter().all(|locus| {
            homozygous.contains(locus)
                || h1.haplotype().instance(*locus) != h2.haplotype().instance(*locus)
        });
        if !opposite {
            continue;
        }
        let pair = HaplotypePair::new(h1.clone(), h2.clone());
        if seen.insert(pair.clone()) {
            pairs.push(pair);
        }
    }
    pairs
}
