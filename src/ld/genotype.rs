//! Parsed representation of a subject's GL String.
//!
//! Delimiters, from loosest to tightest binding:
//! `^` separates gene blocks, `|` separates genotype alternatives, `+`
//! separates the two chromosome copies, `~` links loci in phase and `/`
//! separates ambiguous alleles at one locus.
//!
//! A [`GenotypeList`] keeps every `|` alternative of every gene block. Picking
//! one alternative per block gives a [`Genotype`], which is what haplotypes
//! are enumerated and paired against.

use crate::ld::locus::Locus;
use crate::utils::Result;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

/// One of the two physical chromosome copies of a diploid genotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChromosomeCopy {
    First,
    Second,
}

impl ChromosomeCopy {
    pub const BOTH: [ChromosomeCopy; 2] = [ChromosomeCopy::First, ChromosomeCopy::Second];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            ChromosomeCopy::First => 0,
            ChromosomeCopy::Second => 1,
        }
    }
}

/// Per-locus alleles of both copies within one `|` alternative.
type Alternative = BTreeMap<Locus, [Vec<String>; 2]>;

#[derive(Debug, Clone, PartialEq)]
struct GeneBlock {
    loci: BTreeSet<Locus>,
    alternatives: Vec<Alternative>,
}

impl GeneBlock {
    /// True when the block types `locus`, a member of it or its family.
    fn covers(&self, locus: Locus) -> bool {
        self.loci.contains(&locus)
            || locus
                .expand_family()
                .iter()
                .any(|member| self.loci.contains(member))
            || locus
                .family_of()
                .is_some_and(|family| self.loci.contains(&family))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeList {
    id: String,
    gl_string: String,
    blocks: Vec<GeneBlock>,
}

impl GenotypeList {
    pub fn parse(id: impl Into<String>, gl_string: &str) -> Result<Self> {
        let gl_string = gl_string.trim();
        if gl_string.is_empty() {
            return Err("GL String is empty".to_string());
        }

        let mut blocks: Vec<GeneBlock> = Vec::new();
        for encoding in gl_string.split('^') {
            let block = parse_gene_block(encoding)?;
            if let Some(locus) = blocks
                .iter()
                .find_map(|other| other.loci.intersection(&block.loci).next())
            {
                return Err(format!(
                    "Locus {} appears in more than one gene block of '{}'",
                    locus, gl_string
                ));
            }
            blocks.push(block);
        }

        Ok(GenotypeList {
            id: id.into(),
            gl_string: gl_string.to_string(),
            blocks,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gl_string(&self) -> &str {
        &self.gl_string
    }

    /// Every typed locus, in locus order.
    pub fn loci(&self) -> impl Iterator<Item = Locus> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.loci.iter().copied())
            .sorted()
    }

    /// Number of unambiguous genotypes over `loci`: the product of the
    /// alternative counts of the gene blocks involved.
    pub fn genotype_count(&self, loci: &BTreeSet<Locus>) -> usize {
        self.blocks_for(loci)
            .map(|(_, block)| block.alternatives.len())
            .try_fold(1usize, |acc, n| acc.checked_mul(n))
            .unwrap_or(usize::MAX)
    }

    /// Expands the `|` alternatives of the gene blocks that type any of
    /// `loci` into one [`Genotype`] per combination, first alternatives first.
    /// Blocks unrelated to `loci` are left out.
    pub fn genotypes(&self, loci: &BTreeSet<Locus>) -> Vec<Genotype> {
        let blocks = self.blocks_for(loci).collect_vec();
        if blocks.is_empty() {
            return Vec::new();
        }
        blocks
            .iter()
            .map(|(_, block)| block.alternatives.iter())
            .multi_cartesian_product()
            .map(|choice| {
                let mut calls = BTreeMap::new();
                for ((block_index, _), alternative) in blocks.iter().zip(choice) {
                    for (locus, copies) in alternative {
                        calls.insert(
                            *locus,
                            LocusCalls {
                                copies: copies.clone(),
                                phase_block: *block_index,
                            },
                        );
                    }
                }
                Genotype {
                    id: self.id.clone(),
                    loci: calls,
                    n_blocks: self.blocks.len(),
                }
            })
            .collect()
    }

    /// Every allele of every alternative, with its locus, in locus order.
    pub fn all_alleles(&self) -> impl Iterator<Item = (Locus, &str)> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.alternatives.iter())
            .flat_map(|alternative| {
                alternative.iter().flat_map(|(locus, copies)| {
                    copies
                        .iter()
                        .flatten()
                        .map(move |allele| (*locus, allele.as_str()))
                })
            })
            .sorted_by_key(|(locus, _)| *locus)
    }

    /// Same genotype list with chromosome copy 1 and copy 2 relabelled.
    pub fn with_swapped_copies(&self) -> GenotypeList {
        let mut swapped = self.clone();
        for copies in swapped
            .blocks
            .iter_mut()
            .flat_map(|block| block.alternatives.iter_mut())
            .flat_map(|alternative| alternative.values_mut())
        {
            copies.swap(0, 1);
        }
        swapped
    }

    fn blocks_for<'a>(
        &'a self,
        loci: &'a BTreeSet<Locus>,
    ) -> impl Iterator<Item = (usize, &'a GeneBlock)> + 'a {
        self.blocks
            .iter()
            .enumerate()
            .filter(move |(_, block)| loci.iter().any(|&locus| block.covers(locus)))
    }
}

/// Alleles called at one locus for both copies.
#[derive(Debug, Clone, PartialEq)]
pub struct LocusCalls {
    copies: [Vec<String>; 2],
    phase_block: usize,
}

impl LocusCalls {
    pub fn alleles(&self, copy: ChromosomeCopy) -> &[String] {
        &self.copies[copy.index()]
    }

    pub fn phase_block(&self) -> usize {
        self.phase_block
    }
}

/// One unambiguous genotype: a single `|` alternative from each gene block.
#[derive(Debug, Clone, PartialEq)]
pub struct Genotype {
    id: String,
    loci: BTreeMap<Locus, LocusCalls>,
    n_blocks: usize,
}

impl Genotype {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn loci(&self) -> impl Iterator<Item = Locus> + '_ {
        self.loci.keys().copied()
    }

    pub fn calls(&self, locus: Locus) -> Option<&LocusCalls> {
        self.loci.get(&locus)
    }

    /// Alleles for `locus` on one copy. A locus family without an explicit
    /// entry resolves to the concatenated alleles of its members.
    pub fn alleles(&self, locus: Locus, copy: ChromosomeCopy) -> Vec<&str> {
        self.allele_sets(locus, copy).into_iter().flatten().collect()
    }

    /// Ambiguity sets making up `locus` on one copy. A plain locus has at most
    /// one set. A locus family without an explicit entry has one set per
    /// member typed on that copy, in member order. Empty sets are omitted.
    pub fn allele_sets(&self, locus: Locus, copy: ChromosomeCopy) -> Vec<Vec<&str>> {
        let members: &[Locus] = if self.loci.contains_key(&locus) {
            std::slice::from_ref(&locus)
        } else {
            locus.expand_family()
        };
        members
            .iter()
            .filter_map(|member| self.loci.get(member))
            .map(|calls| {
                calls
                    .alleles(copy)
                    .iter()
                    .map(String::as_str)
                    .collect_vec()
            })
            .filter(|set| !set.is_empty())
            .collect()
    }

    /// Phase block of `locus`. Family members split across gene blocks have
    /// no shared phase, so the family gets a block of its own.
    pub fn phase_block(&self, locus: Locus) -> Option<usize> {
        if let Some(calls) = self.loci.get(&locus) {
            return Some(calls.phase_block);
        }
        let blocks: BTreeSet<usize> = locus
            .expand_family()
            .iter()
            .filter_map(|member| self.loci.get(member))
            .map(|calls| calls.phase_block)
            .collect();
        match blocks.len() {
            0 => None,
            1 => blocks.first().copied(),
            _ => Some(self.n_blocks),
        }
    }

    /// Both copies carry the same allele content at `locus`.
    pub fn is_homozygous(&self, locus: Locus) -> bool {
        let first: BTreeSet<&str> = self
            .alleles(locus, ChromosomeCopy::First)
            .into_iter()
            .collect();
        let second: BTreeSet<&str> = self
            .alleles(locus, ChromosomeCopy::Second)
            .into_iter()
            .collect();
        !first.is_empty() && first == second
    }
}

fn parse_gene_block(encoding: &str) -> Result<GeneBlock> {
    if encoding.trim().is_empty() {
        return Err("Empty gene block in GL String".to_string());
    }

    let mut loci = BTreeSet::new();
    let mut alternatives = Vec::new();
    for genotype in encoding.split('|') {
        let copies: Vec<&str> = genotype.split('+').collect();
        if copies.len() > 2 {
            return Err(format!(
                "Expected at most 2 chromosome copies, found {}: '{}'",
                copies.len(),
                genotype
            ));
        }
        let mut alternative = Alternative::new();
        for (copy_index, copy) in copies.iter().enumerate() {
            let mut phased_loci = BTreeSet::new();
            for phased in copy.split('~') {
                let (locus, alleles) = parse_allele_list(phased)?;
                if !phased_loci.insert(locus) {
                    return Err(format!(
                        "Locus {} appears twice in phased haplotype '{}'",
                        locus, copy
                    ));
                }
                alternative.entry(locus).or_default()[copy_index] = alleles;
            }
        }
        loci.extend(alternative.keys().copied());
        alternatives.push(alternative);
    }
    Ok(GeneBlock { loci, alternatives })
}

fn parse_allele_list(encoding: &str) -> Result<(Locus, Vec<String>)> {
    let mut locus = None;
    let mut alleles: Vec<String> = Vec::new();
    for allele in encoding.split('/') {
        let allele = allele.trim();
        if allele.is_empty() {
            return Err(format!("Empty allele in '{}'", encoding));
        }
        let allele_locus = Locus::from_allele(allele)?;
        match locus {
            None => locus = Some(allele_locus),
            Some(l) if l != allele_locus => {
                return Err(format!(
                    "Ambiguous alleles must share a locus, found {} and {} in '{}'",
                    l, allele_locus, encoding
                ));
            }
            Some(_) => {}
        }
        if !alleles.iter().any(|a| a == allele) {
            alleles.push(allele.to_string());
        }
    }
    // split always yields at least one token, so the locus is set here
    let locus = locus.ok_or_else(|| format!("No alleles in '{}'", encoding))?;
    Ok((locus, alleles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ld::test_utils::genotype;
    use ChromosomeCopy::{First, Second};

    fn loci(loci: &[Locus]) -> BTreeSet<Locus> {
        loci.iter().copied().collect()
    }

    #[test]
    fn parse_unphased_genotype() {
        let gl = genotype("HLA-A*01:01+HLA-A*02:01^HLA-B*08:01/HLA-B*08:02+HLA-B*07:02");
        assert_eq!(gl.id(), "s1");
        assert_eq!(gl.loci().collect::<Vec<_>>(), vec![Locus::A, Locus::B]);
        assert_eq!(gl.alleles(Locus::A, First), vec!["HLA-A*01:01"]);
        assert_eq!(gl.alleles(Locus::A, Second), vec!["HLA-A*02:01"]);
        assert_eq!(
            gl.alleles(Locus::B, First),
            vec!["HLA-B*08:01", "HLA-B*08:02"]
        );
        assert_eq!(gl.phase_block(Locus::A), Some(0));
        assert_eq!(gl.phase_block(Locus::B), Some(1));
        assert!(!gl.is_homozygous(Locus::A));
    }

    #[test]
    fn parse_phased_genotype_shares_block() {
        let gl = genotype("HLA-C*07:01~HLA-B*08:01+HLA-C*07:02~HLA-B*07:02");
        assert_eq!(gl.phase_block(Locus::C), gl.phase_block(Locus::B));
        assert_eq!(gl.alleles(Locus::B, Second), vec!["HLA-B*07:02"]);
    }

    #[test]
    fn homozygosity_ignores_allele_order() {
        let gl = genotype(
            "HLA-A*01:01/HLA-A*01:02+HLA-A*01:02/HLA-A*01:01^HLA-B*08:01+HLA-B*08:01",
        );
        assert!(gl.is_homozygous(Locus::A));
        assert!(gl.is_homozygous(Locus::B));
        assert!(!gl.is_homozygous(Locus::C));
    }

    #[test]
    fn genotype_alternatives_stay_separate() {
        let list = GenotypeList::parse(
            "s1",
            "HLA-A*01:01+HLA-A*02:01|HLA-A*02:01+HLA-A*01:01^HLA-B*08:01+HLA-B*07:02",
        )
        .unwrap();
        let group = loci(&[Locus::A, Locus::B]);
        assert_eq!(list.genotype_count(&group), 2);
        let genotypes = list.genotypes(&group);
        assert_eq!(genotypes.len(), 2);
        assert_eq!(genotypes[0].alleles(Locus::A, First), vec!["HLA-A*01:01"]);
        assert_eq!(genotypes[1].alleles(Locus::A, First), vec!["HLA-A*02:01"]);
        for genotype in &genotypes {
            assert!(!genotype.is_homozygous(Locus::A));
            assert_eq!(genotype.alleles(Locus::B, Second), vec!["HLA-B*07:02"]);
        }
    }

    #[test]
    fn alternatives_combine_across_blocks() {
        let list = GenotypeList::parse(
            "s1",
            "HLA-A*01:01+HLA-A*02:01|HLA-A*03:01+HLA-A*04:01\
             ^HLA-B*08:01+HLA-B*07:02|HLA-B*44:02+HLA-B*07:02\
             ^HLA-C*07:01+HLA-C*07:02|HLA-C*05:01+HLA-C*07:02",
        )
        .unwrap();
        let genotypes = list.genotypes(&loci(&[Locus::A, Locus::B]));
        assert_eq!(genotypes.len(), 4);
        assert!(genotypes.iter().all(|g| g.calls(Locus::C).is_none()));
        assert_eq!(genotypes[1].alleles(Locus::A, First), vec!["HLA-A*01:01"]);
        assert_eq!(genotypes[1].alleles(Locus::B, First), vec!["HLA-B*44:02"]);
        assert_eq!(list.genotype_count(&loci(&[Locus::C, Locus::B])), 4);
        assert!(list.genotypes(&loci(&[Locus::Dpb1])).is_empty());
    }

    #[test]
    fn drb345_family_concatenates_members() {
        let gl = genotype("HLA-DRB1*03:01~HLA-DRB3*01:01+HLA-DRB1*04:01~HLA-DRB4*01:03");
        assert_eq!(gl.alleles(Locus::Drb345, First), vec!["HLA-DRB3*01:01"]);
        assert_eq!(gl.alleles(Locus::Drb345, Second), vec!["HLA-DRB4*01:03"]);
        assert_eq!(gl.phase_block(Locus::Drb345), Some(0));
        assert!(!gl.is_homozygous(Locus::Drb345));
    }

    #[test]
    fn drb345_sets_follow_member_order() {
        let gl = genotype(
            "HLA-DRB1*03:01~HLA-DRB4*01:03~HLA-DRB3*01:01/HLA-DRB3*01:02+HLA-DRB1*01:01",
        );
        assert_eq!(
            gl.allele_sets(Locus::Drb345, First),
            vec![
                vec!["HLA-DRB3*01:01", "HLA-DRB3*01:02"],
                vec!["HLA-DRB4*01:03"]
            ]
        );
        assert!(gl.allele_sets(Locus::Drb345, Second).is_empty());
        assert_eq!(gl.allele_sets(Locus::Drb1, Second), vec![vec!["HLA-DRB1*01:01"]]);
    }

    #[test]
    fn drb345_members_in_different_blocks_get_own_block() {
        let gl = genotype(
            "HLA-DRB1*03:01+HLA-DRB1*04:01^HLA-DRB3*01:01+HLA-DRB3*02:02^HLA-DRB4*01:03",
        );
        assert_eq!(gl.phase_block(Locus::Drb345), Some(3));
        assert_eq!(
            gl.alleles(Locus::Drb345, First),
            vec!["HLA-DRB3*01:01", "HLA-DRB4*01:03"]
        );
        assert_eq!(gl.alleles(Locus::Drb345, Second), vec!["HLA-DRB3*02:02"]);
    }

    #[test]
    fn single_copy_leaves_second_empty() {
        let gl = genotype("HLA-DRB4*01:01");
        assert_eq!(gl.alleles(Locus::Drb4, First), vec!["HLA-DRB4*01:01"]);
        assert!(gl.alleles(Locus::Drb4, Second).is_empty());
        assert!(!gl.is_homozygous(Locus::Drb4));
    }

    #[test]
    fn swapping_copies() {
        let list = GenotypeList::parse("s1", "HLA-A*01:01+HLA-A*02:01|HLA-A*03:01+HLA-A*04:01")
            .unwrap();
        let swapped = list.with_swapped_copies();
        let genotypes = swapped.genotypes(&loci(&[Locus::A]));
        assert_eq!(genotypes[0].alleles(Locus::A, First), vec!["HLA-A*02:01"]);
        assert_eq!(genotypes[1].alleles(Locus::A, Second), vec!["HLA-A*03:01"]);
        assert_eq!(swapped.with_swapped_copies(), list);
    }

    #[test]
    fn all_alleles_lists_both_copies_and_alternatives() {
        let list =
            GenotypeList::parse("s1", "HLA-B*08:01+HLA-B*07:02^HLA-A*01:01|HLA-A*02:01").unwrap();
        let all: Vec<_> = list.all_alleles().collect();
        assert_eq!(
            all,
            vec![
                (Locus::A, "HLA-A*01:01"),
                (Locus::A, "HLA-A*02:01"),
                (Locus::B, "HLA-B*08:01"),
                (Locus::B, "HLA-B*07:02"),
            ]
        );
    }

    #[test]
    fn malformed_gl_strings_are_rejected() {
        assert!(GenotypeList::parse("s1", "").is_err());
        assert!(GenotypeList::parse("s1", "   ").is_err());
        assert!(GenotypeList::parse("s1", "HLA-A*01:01+").is_err());
        assert!(GenotypeList::parse("s1", "HLA-A*01:01|").is_err());
        assert!(GenotypeList::parse("s1", "HLA-A*01:01^^HLA-B*08:01").is_err());
        assert!(GenotypeList::parse("s1", "HLA-A*01:01//HLA-A*02:01").is_err());
        assert!(GenotypeList::parse("s1", "HLA-A01:01").is_err());
        assert!(GenotypeList::parse("s1", "HLA-Z*01:01").is_err());
        assert!(GenotypeList::parse("s1", "HLA-A*01:01+HLA-A*02:01+HLA-A*03:01").is_err());
    }

    #[test]
    fn mixed_locus_ambiguity_is_rejected() {
        assert_eq!(
            GenotypeList::parse("s1", "HLA-A*01:01/HLA-B*08:01"),
            Err("Ambiguous alleles must share a locus, found HLA-A and HLA-B in 'HLA-A*01:01/HLA-B*08:01'".to_string())
        );
    }

    #[test]
    fn repeated_locus_across_blocks_is_rejected() {
        assert!(GenotypeList::parse("s1", "HLA-A*01:01+HLA-A*02:01^HLA-A*03:01").is_err());
        assert!(GenotypeList::parse("s1", "HLA-A*01:01^HLA-B*08:01|HLA-A*03:01").is_err());
    }

    #[test]
    fn repeated_locus_within_phased_copy_is_rejected() {
        assert_eq!(
            GenotypeList::parse("s1", "HLA-A*01:01~HLA-A*02:01+HLA-A*03:01"),
            Err("Locus HLA-A appears twice in phased haplotype 'HLA-A*01:01~HLA-A*02:01'"
                .to_string())
        );
        assert!(GenotypeList::parse("s1", "HLA-A*01:01~HLA-B*08:01+HLA-A*02:01~HLA-B*07:02").is_ok());
    }
}
