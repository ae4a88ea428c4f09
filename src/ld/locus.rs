use crate::utils::Result;
use std::{fmt, str::FromStr};

/// HLA loci, ordered as they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Locus {
    A,
    C,
    B,
    Drb1,
    Drb3,
    Drb4,
    Drb5,
    DrbX,
    Drb345,
    Dqa1,
    Dqb1,
    Dpa1,
    Dpb1,
}

const DRB345_MEMBERS: [Locus; 4] = [Locus::Drb3, Locus::Drb4, Locus::Drb5, Locus::DrbX];

impl Locus {
    pub const ALL: [Locus; 13] = [
        Locus::A,
        Locus::C,
        Locus::B,
        Locus::Drb1,
        Locus::Drb3,
        Locus::Drb4,
        Locus::Drb5,
        Locus::DrbX,
        Locus::Drb345,
        Locus::Dqa1,
        Locus::Dqb1,
        Locus::Dpa1,
        Locus::Dpb1,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            Locus::A => "A",
            Locus::C => "C",
            Locus::B => "B",
            Locus::Drb1 => "DRB1",
            Locus::Drb3 => "DRB3",
            Locus::Drb4 => "DRB4",
            Locus::Drb5 => "DRB5",
            Locus::DrbX => "DRBX",
            Locus::Drb345 => "DRB345",
            Locus::Dqa1 => "DQA1",
            Locus::Dqb1 => "DQB1",
            Locus::Dpa1 => "DPA1",
            Locus::Dpb1 => "DPB1",
        }
    }

    /// Returns the constituent loci of a locus family, or the locus itself.
    ///
    /// The family order (DRB3, DRB4, DRB5, DRBX) is the order in which member
    /// alleles are concatenated when the combined key is absent.
    pub fn expand_family(self) -> &'static [Locus] {
        match self {
            Locus::Drb345 => &DRB345_MEMBERS,
            Locus::A => &[Locus::A],
            Locus::C => &[Locus::C],
            Locus::B => &[Locus::B],
            Locus::Drb1 => &[Locus::Drb1],
            Locus::Drb3 => &[Locus::Drb3],
            Locus::Drb4 => &[Locus::Drb4],
            Locus::Drb5 => &[Locus::Drb5],
            Locus::DrbX => &[Locus::DrbX],
            Locus::Dqa1 => &[Locus::Dqa1],
            Locus::Dqb1 => &[Locus::Dqb1],
            Locus::Dpa1 => &[Locus::Dpa1],
            Locus::Dpb1 => &[Locus::Dpb1],
        }
    }

    pub fn is_family(&self) -> bool {
        self.expand_family().len() > 1
    }

    /// The family key a member locus belongs to, if any.
    pub fn family_of(self) -> Option<Locus> {
        if DRB345_MEMBERS.contains(&self) {
            Some(Locus::Drb345)
        } else {
            None
        }
    }

    /// Extracts the locus from an allele name such as `HLA-DRB1*15:01`.
    pub fn from_allele(allele: &str) -> Result<Locus> {
        let (locus, name) = allele
            .split_once('*')
            .ok_or_else(|| format!("Allele '{}' is missing the '*' separator", allele))?;
        if name.is_empty() {
            return Err(format!("Allele '{}' has an empty name", allele));
        }
        locus.parse()
    }
}

impl FromStr for Locus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let name = upper.strip_prefix("HLA-").unwrap_or(&upper);
        Locus::ALL
            .iter()
            .find(|locus| locus.short_name() == name)
            .copied()
            .ok_or_else(|| format!("Unrecognized locus: '{}'", trimmed))
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HLA-{}", self.short_name())
    }
}

/// True when `allele` equals `reference` or refines it with further fields,
/// e.g. `HLA-B*07:02:01` refines `HLA-B*07:02`.
pub fn allele_matches(allele: &str, reference: &str) -> bool {
    match allele.strip_prefix(reference) {
        Some("") => true,
        Some(rest) => rest.starts_with(':'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_locus_names() {
        assert_eq!("HLA-A".parse::<Locus>(), Ok(Locus::A));
        assert_eq!("drb1".parse::<Locus>(), Ok(Locus::Drb1));
        assert_eq!("HLA-DRB345".parse::<Locus>(), Ok(Locus::Drb345));
        assert_eq!(
            "HLA-Q".parse::<Locus>(),
            Err("Unrecognized locus: 'HLA-Q'".to_string())
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for locus in Locus::ALL {
            assert_eq!(locus.to_string().parse::<Locus>(), Ok(locus));
        }
    }

    #[test]
    fn locus_from_allele_name() {
        assert_eq!(Locus::from_allele("HLA-DQB1*06:02"), Ok(Locus::Dqb1));
        assert_eq!(Locus::from_allele("HLA-DRBX*NNNN"), Ok(Locus::DrbX));
        assert!(Locus::from_allele("HLA-DQB1").is_err());
        assert!(Locus::from_allele("HLA-DQB1*").is_err());
        assert!(Locus::from_allele("HLA-FOO*01:01").is_err());
    }

    #[test]
    fn family_expansion() {
        assert_eq!(
            Locus::Drb345.expand_family(),
            &[Locus::Drb3, Locus::Drb4, Locus::Drb5, Locus::DrbX]
        );
        assert_eq!(Locus::B.expand_family(), &[Locus::B]);
        assert!(Locus::Drb345.is_family());
        assert!(!Locus::Drb4.is_family());
        assert_eq!(Locus::Drb4.family_of(), Some(Locus::Drb345));
        assert_eq!(Locus::Drb1.family_of(), None);
    }

    #[test]
    fn loci_are_ordered_by_declaration() {
        assert!(Locus::A < Locus::C);
        assert!(Locus::C < Locus::B);
        assert!(Locus::Drb345 < Locus::Dqb1);
    }

    #[test]
    fn allele_field_prefix_matching() {
        assert!(allele_matches("HLA-B*07:02", "HLA-B*07:02"));
        assert!(allele_matches("HLA-B*07:02:01", "HLA-B*07:02"));
        assert!(!allele_matches("HLA-B*07:021", "HLA-B*07:02"));
        assert!(!allele_matches("HLA-B*07:02", "HLA-B*07:02:01"));
        assert!(!allele_matches("HLA-C*07:02", "HLA-B*07:02"));
    }
}
