//! Candidate multi-locus haplotypes and their enumeration from a genotype.
//!
//! Loci that share a phase block always come from the same chromosome copy.
//! Loci in different blocks are unphased relative to each other, so every
//! block picks its copy independently. For each copy assignment the
//! candidates are the Cartesian product of the per-locus ambiguity sets, which
//! gives a total of
//!
//! ```text
//! Σ over copy assignments of Π |alleles(locus, copy)|
//! ```
//!
//! candidates. A fully phased group has two assignments (one per copy). A
//! group of `k` unphased loci has `2^k`. The product grows quickly with
//! ambiguity, so enumeration is capped and fails loudly instead of truncating.

use crate::ld::{
    genotype::{ChromosomeCopy, Genotype},
    locus::Locus,
};
use crate::utils::Result;
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

pub const DEFAULT_MAX_CANDIDATES: usize = 1_000_000;

/// One hypothesised haplotype, plus the copy each locus was drawn from.
///
/// A plain locus carries exactly one allele. A locus family such as DRB345
/// carries one allele per member present on the chosen copy, in member order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Haplotype {
    alleles: BTreeMap<Locus, Vec<String>>,
    instances: BTreeMap<Locus, ChromosomeCopy>,
    sequence: usize,
}

impl Haplotype {
    /// Repeated calls for the same locus append to its allele list.
    pub fn new<I, S>(sequence: usize, calls: I) -> Self
    where
        I: IntoIterator<Item = (Locus, S, ChromosomeCopy)>,
        S: Into<String>,
    {
        let mut alleles: BTreeMap<Locus, Vec<String>> = BTreeMap::new();
        let mut instances = BTreeMap::new();
        for (locus, allele, copy) in calls {
            alleles.entry(locus).or_default().push(allele.into());
            instances.insert(locus, copy);
        }
        Haplotype {
            alleles,
            instances,
            sequence,
        }
    }

    pub fn loci(&self) -> impl Iterator<Item = Locus> + '_ {
        self.alleles.keys().copied()
    }

    /// Alleles at `locus`, empty when the locus is not part of the haplotype.
    pub fn alleles_at(&self, locus: Locus) -> &[String] {
        self.alleles.get(&locus).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn alleles(&self) -> &BTreeMap<Locus, Vec<String>> {
        &self.alleles
    }

    pub fn instance(&self, locus: Locus) -> Option<ChromosomeCopy> {
        self.instances.get(&locus).copied()
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.alleles.values().map(|list| list.join("/")).join("~");
        write!(f, "{}", rendered)
    }
}

/// Enumerates every candidate haplotype over `loci` that is consistent with
/// the genotype's phase and ambiguity.
pub fn enumerate_haplotypes(
    genotype: &Genotype,
    loci: &BTreeSet<Locus>,
    max_candidates: usize,
) -> Result<Vec<Haplotype>> {
    // Distinct phase blocks in first-seen order, and each locus' slot in it
    let mut blocks: Vec<usize> = Vec::new();
    let mut slots: Vec<(Locus, usize)> = Vec::with_capacity(loci.len());
    for &locus in loci {
        let Some(block) = genotype.phase_block(locus) else {
            log::trace!("{}: {} not typed, no candidates", genotype.id(), locus);
            return Ok(Vec::new());
        };
        let slot = match blocks.iter().position(|&b| b == block) {
            Some(slot) => slot,
            None => {
                blocks.push(block);
                blocks.len() - 1
            }
        };
        slots.push((locus, slot));
    }
    if slots.is_empty() {
        return Ok(Vec::new());
    }

    // One dimension per ambiguity set; a family locus spans one per member
    let mut plans: Vec<Vec<(Locus, ChromosomeCopy, Vec<&str>)>> = Vec::new();
    let mut total: usize = 0;
    for assignment in blocks
        .iter()
        .map(|_| ChromosomeCopy::BOTH.into_iter())
        .multi_cartesian_product()
    {
        let mut plan = Vec::with_capacity(slots.len());
        let mut complete = true;
        for &(locus, slot) in &slots {
            let copy = assignment[slot];
            let sets = genotype.allele_sets(locus, copy);
            if sets.is_empty() {
                complete = false;
                break;
            }
            plan.extend(sets.into_iter().map(|set| (locus, copy, set)));
        }
        if !complete {
            continue;
        }
        let count = plan
            .iter()
            .try_fold(1usize, |acc, (_, _, alleles)| acc.checked_mul(alleles.len()))
            .unwrap_or(usize::MAX);
        total = total.saturating_add(count);
        if total > max_candidates {
            return Err(format!(
                "{}: more than {} candidate haplotypes over {}, refusing to enumerate",
                genotype.id(),
                max_candidates,
                loci.iter().join("~")
            ));
        }
        plans.push(plan);
    }

    let mut haplotypes = Vec::with_capacity(total);
    for plan in &plans {
        for combination in plan
            .iter()
            .map(|(_, _, alleles)| alleles.iter().copied())
            .multi_cartesian_product()
        {
            let sequence = haplotypes.len();
            let calls = plan
                .iter()
                .zip(combination)
                .map(|((locus, copy, _), allele)| (*locus, allele, *copy));
            haplotypes.push(Haplotype::new(sequence, calls));
        }
    }

    log::trace!(
        "{}: {} candidate haplotypes over {}",
        genotype.id(),
        haplotypes.len(),
        loci.iter().join("~")
    );
    Ok(haplotypes)
}
