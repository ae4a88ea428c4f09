//! Reference catalog of known linked haplotypes and common, well documented
//! (CWD) alleles. Built once by a loader and shared read-only between
//! analyses.

use crate::ld::{
    haplotype::Haplotype,
    locus::{allele_matches, Locus},
};
use crate::utils::Result;
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
    sync::Arc,
};

const BROAD_RACES: [&str; 6] = ["AFA", "API", "CAU", "HIS", "NAM", "UNK"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceType {
    Broad,
    Detailed,
}

impl fmt::Display for RaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceType::Broad => write!(f, "Broad"),
            RaceType::Detailed => write!(f, "Detailed"),
        }
    }
}

/// Haplotype frequency observed in one population, with its share (in
/// percent) of the population's total over the same locus group.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeFrequencyByRace {
    pub race: String,
    pub frequency: f64,
    pub relative_frequency: f32,
}

impl RelativeFrequencyByRace {
    pub fn new(race: impl Into<String>, frequency: f64) -> Self {
        RelativeFrequencyByRace {
            race: race.into(),
            frequency,
            relative_frequency: 0.0,
        }
    }

    pub fn race_type(&self) -> RaceType {
        if BROAD_RACES.contains(&self.race.as_str()) {
            RaceType::Broad
        } else {
            RaceType::Detailed
        }
    }
}

impl fmt::Display for RelativeFrequencyByRace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Race: {}, Freq: {}, Relative Freq (%): {:.2}",
            self.race_type(),
            self.race,
            self.frequency,
            self.relative_frequency
        )
    }
}

/// One historically observed linked haplotype.
///
/// Each locus maps to an allele set. Sets hold a single allele except for
/// family keys such as DRB345, where any member allele may appear.
#[derive(Debug, Clone, PartialEq)]
pub struct DisequilibriumElement {
    alleles: BTreeMap<Locus, Vec<String>>,
    frequencies: Vec<RelativeFrequencyByRace>,
    source: Option<String>,
}

impl DisequilibriumElement {
    pub fn new<I>(alleles: I) -> Self
    where
        I: IntoIterator<Item = (Locus, Vec<String>)>,
    {
        DisequilibriumElement {
            alleles: alleles.into_iter().collect(),
            frequencies: Vec::new(),
            source: None,
        }
    }

    /// Builds an element from full allele names, taking each locus from the
    /// allele prefix.
    pub fn from_alleles<S: AsRef<str>>(alleles: &[S]) -> Result<Self> {
        let mut by_locus: BTreeMap<Locus, Vec<String>> = BTreeMap::new();
        for allele in alleles {
            let allele = allele.as_ref().trim();
            let locus = Locus::from_allele(allele)?;
            by_locus.entry(locus).or_default().push(allele.to_string());
        }
        if by_locus.is_empty() {
            return Err("Disequilibrium element has no alleles".to_string());
        }
        Ok(Self::new(by_locus))
    }

    pub fn with_frequencies(mut self, frequencies: Vec<RelativeFrequencyByRace>) -> Self {
        self.frequencies = frequencies;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn loci(&self) -> impl Iterator<Item = Locus> + '_ {
        self.alleles.keys().copied()
    }

    pub fn frequencies(&self) -> &[RelativeFrequencyByRace] {
        &self.frequencies
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Allele set for `locus`. The family key and the ordered union of its
    /// members stand in for each other when one of them is missing.
    pub fn alleles_for(&self, locus: Locus) -> Vec<&str> {
        if let Some(alleles) = self.alleles.get(&locus) {
            return alleles.iter().map(String::as_str).collect();
        }
        if locus.is_family() {
            return locus
                .expand_family()
                .iter()
                .filter_map(|member| self.alleles.get(member))
                .flatten()
                .map(String::as_str)
                .collect();
        }
        locus
            .family_of()
            .and_then(|family| self.alleles.get(&family))
            .map(|alleles| alleles.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// True when the candidate carries this element's alleles at every locus.
    ///
    /// A plain locus matches when its allele falls in the element's set. A
    /// family locus matches only when the candidate carries exactly one allele
    /// for each member the element names, and each falls in that member's set.
    pub fn matches(&self, haplotype: &Haplotype) -> bool {
        haplotype.alleles().iter().all(|(locus, alleles)| {
            let references = self.alleles_for(*locus);
            if locus.is_family() {
                family_matches(alleles, &references)
            } else {
                alleles.iter().all(|allele| {
                    references
                        .iter()
                        .any(|reference| allele_matches(allele, reference))
                })
            }
        })
    }
}

fn family_matches(alleles: &[String], references: &[&str]) -> bool {
    let mut by_member: BTreeMap<Option<Locus>, Vec<&str>> = BTreeMap::new();
    for reference in references {
        by_member
            .entry(Locus::from_allele(reference).ok())
            .or_default()
            .push(*reference);
    }
    let mut seen = BTreeSet::new();
    for allele in alleles {
        let member = Locus::from_allele(allele).ok();
        if !seen.insert(member) {
            return false;
        }
        let Some(sets) = by_member.get(&member) else {
            return false;
        };
        if !sets.iter().any(|reference| allele_matches(allele, reference)) {
            return false;
        }
    }
    seen.len() == by_member.len()
}

impl fmt::Display for DisequilibriumElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.alleles.values().map(|set| set.join("/")).join("~");
        write!(f, "{}", rendered)
    }
}

/// Fills in `relative_frequency` as each element's percentage of the
/// per-race total across `elements`.
pub fn compute_relative_frequencies(elements: &mut [DisequilibriumElement]) {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for freq in elements.iter().flat_map(|e| e.frequencies.iter()) {
        *totals.entry(freq.race.clone()).or_insert(0.0) += freq.frequency;
    }
    for freq in elements.iter_mut().flat_map(|e| e.frequencies.iter_mut()) {
        let total = totals.get(&freq.race).copied().unwrap_or(0.0);
        freq.relative_frequency = if total > 0.0 {
            (freq.frequency / total * 100.0) as f32
        } else {
            0.0
        };
    }
}

#[derive(Debug, Default)]
pub struct ReferenceCatalog {
    groups: BTreeMap<BTreeSet<Locus>, Vec<Arc<DisequilibriumElement>>>,
    cwd_alleles: Option<HashMap<Locus, HashSet<String>>>,
    hladb: String,
}

impl ReferenceCatalog {
    pub fn new(hladb: impl Into<String>) -> Self {
        ReferenceCatalog {
            hladb: hladb.into(),
            ..Default::default()
        }
    }

    /// Adds elements under the locus group `loci`, after any already present.
    pub fn add_elements<I>(&mut self, loci: BTreeSet<Locus>, elements: I)
    where
        I: IntoIterator<Item = DisequilibriumElement>,
    {
        self.groups
            .entry(loci)
            .or_default()
            .extend(elements.into_iter().map(Arc::new));
    }

    pub fn with_cwd_alleles<I, S>(mut self, alleles: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cwd: HashMap<Locus, HashSet<String>> = HashMap::new();
        for allele in alleles {
            let allele = allele.as_ref().trim();
            let locus = Locus::from_allele(allele)?;
            cwd.entry(locus).or_default().insert(allele.to_string());
        }
        self.cwd_alleles = Some(cwd);
        Ok(self)
    }

    pub fn hladb(&self) -> &str {
        &self.hladb
    }

    pub fn groups(&self) -> impl Iterator<Item = &BTreeSet<Locus>> {
        self.groups.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|elements| elements.is_empty())
    }

    pub fn has_cwd_alleles(&self) -> bool {
        self.cwd_alleles.is_some()
    }

    /// Catalog elements for a locus group, in load order.
    pub fn elements_for(&self, loci: &BTreeSet<Locus>) -> &[Arc<DisequilibriumElement>] {
        self.groups.get(loci).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Without a CWD list every allele counts as common.
    pub fn is_common_well_documented(&self, locus: Locus, allele: &str) -> bool {
        let Some(cwd) = &self.cwd_alleles else {
            return true;
        };
        let Some(known) = cwd.get(&locus) else {
            return false;
        };
        known.contains(allele)
            || known
                .iter()
                .any(|reference| allele_matches(allele, reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ld::genotype::ChromosomeCopy::{First, Second};

    fn haplotype(calls: &[(Locus, &str)]) -> Haplotype {
        Haplotype::new(0, calls.iter().map(|&(l, a)| (l, a, First)))
    }

    #[test]
    fn element_from_allele_names() {
        let element = DisequilibriumElement::from_alleles(&["HLA-C*07:01", "HLA-B*08:01"]).unwrap();
        assert_eq!(element.loci().collect::<Vec<_>>(), vec![Locus::C, Locus::B]);
        assert_eq!(element.to_string(), "HLA-C*07:01~HLA-B*08:01");
        assert!(DisequilibriumElement::from_alleles::<&str>(&[]).is_err());
        assert!(DisequilibriumElement::from_alleles(&["C*07:01"]).is_ok());
        assert!(DisequilibriumElement::from_alleles(&["HLA-C07:01"]).is_err());
    }

    #[test]
    fn element_matches_exact_and_refined_alleles() {
        let element = DisequilibriumElement::from_alleles(&["HLA-C*07:01", "HLA-B*08:01"]).unwrap();
        assert!(element.matches(&haplotype(&[
            (Locus::C, "HLA-C*07:01"),
            (Locus::B, "HLA-B*08:01")
        ])));
        assert!(element.matches(&haplotype(&[
            (Locus::C, "HLA-C*07:01:01:01"),
            (Locus::B, "HLA-B*08:01:01")
        ])));
        assert!(!element.matches(&haplotype(&[
            (Locus::C, "HLA-C*07:02"),
            (Locus::B, "HLA-B*08:01")
        ])));
        assert!(!element.matches(&haplotype(&[
            (Locus::C, "HLA-C*07:01"),
            (Locus::A, "HLA-A*01:01")
        ])));
    }

    #[test]
    fn family_key_falls_back_to_members() {
        let by_members =
            DisequilibriumElement::from_alleles(&["HLA-DRB1*03:01", "HLA-DRB3*01:01"]).unwrap();
        let candidate = Haplotype::new(
            0,
            [
                (Locus::Drb1, "HLA-DRB1*03:01", First),
                (Locus::Drb345, "HLA-DRB3*01:01", Second),
            ],
        );
        assert_eq!(by_members.alleles_for(Locus::Drb345), vec!["HLA-DRB3*01:01"]);
        assert!(by_members.matches(&candidate));

        let by_family = DisequilibriumElement::new([
            (Locus::Drb1, vec!["HLA-DRB1*03:01".to_string()]),
            (Locus::Drb345, vec!["HLA-DRB3*01:01".to_string()]),
        ]);
        assert_eq!(by_family.alleles_for(Locus::Drb3), vec!["HLA-DRB3*01:01"]);
        assert!(by_family.matches(&candidate));

        let other = DisequilibriumElement::new([
            (Locus::Drb1, vec!["HLA-DRB1*03:01".to_string()]),
            (Locus::Drb345, vec!["HLA-DRB4*01:01".to_string()]),
        ]);
        assert!(!other.matches(&candidate));
    }

    #[test]
    fn family_match_requires_every_member() {
        let element = DisequilibriumElement::new([
            (Locus::Drb1, vec!["HLA-DRB1*03:01".to_string()]),
            (
                Locus::Drb345,
                vec!["HLA-DRB3*01:01".to_string(), "HLA-DRB4*01:03".to_string()],
            ),
        ]);
        let candidate = |members: &[&str]| {
            Haplotype::new(
                0,
                std::iter::once((Locus::Drb1, "HLA-DRB1*03:01", First))
                    .chain(members.iter().map(|&a| (Locus::Drb345, a, First))),
            )
        };
        assert!(element.matches(&candidate(&["HLA-DRB3*01:01", "HLA-DRB4*01:03"])));
        assert!(element.matches(&candidate(&["HLA-DRB3*01:01:02", "HLA-DRB4*01:03"])));
        assert!(!element.matches(&candidate(&["HLA-DRB3*01:01"])));
        assert!(!element.matches(&candidate(&["HLA-DRB4*01:03"])));
        assert!(!element.matches(&candidate(&[
            "HLA-DRB3*01:01",
            "HLA-DRB4*01:03",
            "HLA-DRB5*01:01"
        ])));

        let single = DisequilibriumElement::from_alleles(&["HLA-DRB1*03:01", "HLA-DRB3*01:01"])
            .unwrap();
        assert!(!single.matches(&candidate(&["HLA-DRB3*01:01", "HLA-DRB4*01:03"])));
    }

    #[test]
    fn family_set_of_one_member_is_ambiguity() {
        let element = DisequilibriumElement::new([(
            Locus::Drb345,
            vec!["HLA-DRB3*01:01".to_string(), "HLA-DRB3*02:02".to_string()],
        )]);
        let candidate = |allele: &str| Haplotype::new(0, [(Locus::Drb345, allele, First)]);
        assert!(element.matches(&candidate("HLA-DRB3*02:02")));
        assert!(!element.matches(&candidate("HLA-DRB4*01:03")));
    }

    #[test]
    fn relative_frequencies_per_race() {
        let freq = |race: &str, f: f64| RelativeFrequencyByRace::new(race, f);
        let mut elements = vec![
            DisequilibriumElement::from_alleles(&["HLA-C*07:01", "HLA-B*08:01"])
                .unwrap()
                .with_frequencies(vec![freq("CAU", 0.3), freq("AFA", 0.1)]),
            DisequilibriumElement::from_alleles(&["HLA-C*07:02", "HLA-B*07:02"])
                .unwrap()
                .with_frequencies(vec![freq("CAU", 0.1), freq("AFA", 0.0)]),
        ];
        compute_relative_frequencies(&mut elements);
        let rel = |e: usize, r: usize| elements[e].frequencies()[r].relative_frequency;
        assert!((rel(0, 0) - 75.0).abs() < 1e-4);
        assert!((rel(1, 0) - 25.0).abs() < 1e-4);
        assert!((rel(0, 1) - 100.0).abs() < 1e-4);
        assert_eq!(rel(1, 1), 0.0);
        assert_eq!(elements[0].frequencies()[0].race_type(), RaceType::Broad);
        assert_eq!(freq("EURCAU", 0.1).race_type(), RaceType::Detailed);
        assert_eq!(
            elements[0].frequencies()[0].to_string(),
            "Broad Race: CAU, Freq: 0.3, Relative Freq (%): 75.00"
        );
    }

    #[test]
    fn catalog_lookup_by_group() {
        let group: BTreeSet<Locus> = [Locus::C, Locus::B].into_iter().collect();
        let mut catalog = ReferenceCatalog::new("3.25.0");
        assert!(catalog.is_empty());
        catalog.add_elements(
            group.clone(),
            vec![DisequilibriumElement::from_alleles(&["HLA-C*07:01", "HLA-B*08:01"]).unwrap()],
        );
        assert!(!catalog.is_empty());
        assert_eq!(catalog.hladb(), "3.25.0");
        assert_eq!(catalog.elements_for(&group).len(), 1);
        let other: BTreeSet<Locus> = [Locus::Dqa1, Locus::Dqb1].into_iter().collect();
        assert!(catalog.elements_for(&other).is_empty());
    }

    #[test]
    fn cwd_membership() {
        let catalog = ReferenceCatalog::new("3.25.0");
        assert!(!catalog.has_cwd_alleles());
        assert!(catalog.is_common_well_documented(Locus::A, "HLA-A*99:99"));

        let catalog = catalog
            .with_cwd_alleles(["HLA-A*01:01", "HLA-B*08:01:01"])
            .unwrap();
        assert!(catalog.is_common_well_documented(Locus::A, "HLA-A*01:01"));
        assert!(catalog.is_common_well_documented(Locus::A, "HLA-A*01:01:01:01"));
        assert!(!catalog.is_common_well_documented(Locus::A, "HLA-A*01:02"));
        assert!(!catalog.is_common_well_documented(Locus::B, "HLA-B*08:01"));
        assert!(!catalog.is_common_well_documented(Locus::C, "HLA-C*07:01"));
    }
}
