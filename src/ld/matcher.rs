use crate::ld::{catalog::DisequilibriumElement, haplotype::Haplotype};
use std::sync::Arc;

/// A candidate haplotype together with the catalog element it matched.
#[derive(Debug, Clone)]
pub struct LinkedHaplotype {
    haplotype: Haplotype,
    element: Arc<DisequilibriumElement>,
}

impl LinkedHaplotype {
    pub fn new(haplotype: Haplotype, element: Arc<DisequilibriumElement>) -> Self {
        LinkedHaplotype { haplotype, element }
    }

    pub fn haplotype(&self) -> &Haplotype {
        &self.haplotype
    }

    pub fn element(&self) -> &DisequilibriumElement {
        &self.element
    }
}

/// Keeps the candidates that equal some catalog element, annotated with the
/// first such element. Candidates without a match are dropped.
pub fn match_haplotypes(
    candidates: Vec<Haplotype>,
    elements: &[Arc<DisequilibriumElement>],
) -> Vec<LinkedHaplotype> {
    if elements.is_empty() {
        return Vec::new();
    }
    candidates
        .into_iter()
        .filter_map(|candidate| {
            elements
                .iter()
                .find(|element| element.matches(&candidate))
                .map(|element| LinkedHaplotype::new(candidate, Arc::clone(element)))
        })
        .collect()
}
