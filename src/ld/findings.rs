use crate::ld::{
    catalog::ReferenceCatalog,
    genotype::GenotypeList,
    haplotype::{enumerate_haplotypes, DEFAULT_MAX_CANDIDATES},
    linkage::Linkage,
    locus::Locus,
    matcher::match_haplotypes,
    pairs::{resolve_pairs, HaplotypePair},
};
use crate::utils::Result;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone)]
pub struct Params {
    pub max_candidates: usize,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// Linked pairs found for one locus group.
#[derive(Debug, Clone)]
pub struct LinkageFindings {
    pub linkage: Linkage,
    pub pairs: Vec<HaplotypePair>,
}

/// Everything detected for one genotype. Built by [`detect_linkages`] and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct DetectedLinkageFindings {
    genotype: GenotypeList,
    findings: Vec<LinkageFindings>,
    non_cwd_alleles: BTreeMap<Locus, BTreeSet<String>>,
    hladb: String,
}

impl DetectedLinkageFindings {
    pub fn genotype(&self) -> &GenotypeList {
        &self.genotype
    }

    /// Locus groups that were searched, in configured order.
    pub fn linkages(&self) -> impl Iterator<Item = &Linkage> {
        self.findings.iter().map(|f| &f.linkage)
    }

    pub fn linked_pairs(&self) -> &[LinkageFindings] {
        &self.findings
    }

    pub fn pairs_for(&self, linkage: &Linkage) -> &[HaplotypePair] {
        self.findings
            .iter()
            .find(|f| &f.linkage == linkage)
            .map(|f| f.pairs.as_slice())
            .unwrap_or(&[])
    }

    pub fn pair_count(&self) -> usize {
        self.findings.iter().map(|f| f.pairs.len()).sum()
    }

    pub fn non_cwd_alleles(&self) -> &BTreeMap<Locus, BTreeSet<String>> {
        &self.non_cwd_alleles
    }

    pub fn hladb(&self) -> &str {
        &self.hladb
    }

    /// A searched locus group without any linked pair.
    pub fn has_anomalies(&self) -> bool {
        self.findings.iter().any(|f| f.pairs.is_empty())
    }
}

pub fn detect_linkages(
    genotype: &GenotypeList,
    catalog: &ReferenceCatalog,
    linkages: &[Linkage],
) -> Result<DetectedLinkageFindings> {
    detect_linkages_with_params(genotype, catalog, linkages, &Params::default())
}

pub fn detect_linkages_with_params(
    genotype: &GenotypeList,
    catalog: &ReferenceCatalog,
    linkages: &[Linkage],
    params: &Params,
) -> Result<DetectedLinkageFindings> {
    if linkages.is_empty() {
        log::debug!("{}: No linkages configured", genotype.id());
    }

    let mut findings = Vec::with_capacity(linkages.len());
    for linkage in linkages {
        let elements = catalog.elements_for(linkage.loci());
        let pairs = if elements.is_empty() {
            log::debug!("{}: No catalog elements for {}", genotype.id(), linkage);
            Vec::new()
        } else {
            detect_pairs(genotype, linkage, catalog, params)?
        };
        log::debug!(
            "{}: {} linked pairs for {}",
            genotype.id(),
            pairs.len(),
            linkage
        );
        findings.push(LinkageFindings {
            linkage: linkage.clone(),
            pairs,
        });
    }

    Ok(DetectedLinkageFindings {
        genotype: genotype.clone(),
        findings,
        non_cwd_alleles: find_non_cwd_alleles(genotype, catalog),
        hladb: catalog.hladb().to_string(),
    })
}

/// Runs one linkage over every combination of `|` alternatives. Each
/// combination is paired on its own and the pairs are united in first-seen
/// order. The candidate cap covers all combinations together.
fn detect_pairs(
    genotype: &GenotypeList,
    linkage: &Linkage,
    catalog: &ReferenceCatalog,
    params: &Params,
) -> Result<Vec<HaplotypePair>> {
    let loci = linkage.loci();
    let n_genotypes = genotype.genotype_count(loci);
    if n_genotypes > params.max_candidates {
        return Err(format!(
            "{}: more than {} genotype alternatives over {}, refusing to enumerate",
            genotype.id(),
            params.max_candidates,
            linkage
        ));
    }
    if n_genotypes > 1 {
        log::trace!(
            "{}: {} genotype alternatives for {}",
            genotype.id(),
            n_genotypes,
            linkage
        );
    }

    let elements = catalog.elements_for(loci);
    let mut budget = params.max_candidates;
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for resolved in genotype.genotypes(loci) {
        let candidates = enumerate_haplotypes(&resolved, loci, budget).map_err(|e| {
            if n_genotypes > 1 {
                format!("{} across {} genotype alternatives", e, n_genotypes)
            } else {
                e
            }
        })?;
        budget -= candidates.len();
        let linked = match_haplotypes(candidates, elements);
        for pair in resolve_pairs(&linked, loci, &resolved) {
            if seen.insert(pair.clone()) {
                pairs.push(pair);
            }
        }
    }
    Ok(pairs)
}

fn find_non_cwd_alleles(
    genotype: &GenotypeList,
    catalog: &ReferenceCatalog,
) -> BTreeMap<Locus, BTreeSet<String>> {
    let mut non_cwd: BTreeMap<Locus, BTreeSet<String>> = BTreeMap::new();
    for (locus, allele) in genotype.all_alleles() {
        if !catalog.is_common_well_documented(locus, allele) {
            non_cwd.entry(locus).or_default().insert(allele.to_string());
        }
    }
    non_cwd
}
