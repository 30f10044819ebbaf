//! ClinVar clinical significance and the derived pathogenicity call

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Clinical significance classification from ClinVar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalSignificance {
    Benign,
    LikelyBenign,
    UncertainSignificance,
    LikelyPathogenic,
    Pathogenic,
    /// Conflicting interpretations from different submitters
    Conflicting,
    /// Drug response, risk factor, association and anything else
    Other,
}

impl ClinicalSignificance {
    /// Convert to ClinVar string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Benign => "Benign",
            Self::LikelyBenign => "Likely benign",
            Self::UncertainSignificance => "Uncertain significance",
            Self::LikelyPathogenic => "Likely pathogenic",
            Self::Pathogenic => "Pathogenic",
            Self::Conflicting => "Conflicting interpretations of pathogenicity",
            Self::Other => "other",
        }
    }

    /// The pathogenicity this classification asserts, if it asserts one
    pub fn explicit_pathogenicity(&self) -> Option<Pathogenicity> {
        match self {
            Self::Pathogenic => Some(Pathogenicity::Pathogenic),
            Self::LikelyPathogenic => Some(Pathogenicity::LikelyPathogenic),
            Self::LikelyBenign => Some(Pathogenicity::LikelyBenign),
            Self::Benign => Some(Pathogenicity::Benign),
            Self::UncertainSignificance | Self::Conflicting | Self::Other => None,
        }
    }
}

impl std::fmt::Display for ClinicalSignificance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClinicalSignificance {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s_lower = s.trim().to_lowercase().replace('_', " ");
        Ok(match s_lower.as_str() {
            "benign" => Self::Benign,
            "likely benign" | "benign/likely benign" => Self::LikelyBenign,
            "uncertain significance" | "vus" => Self::UncertainSignificance,
            "likely pathogenic" | "pathogenic/likely pathogenic" => Self::LikelyPathogenic,
            "pathogenic" => Self::Pathogenic,
            "conflicting interpretations of pathogenicity"
            | "conflicting classifications of pathogenicity"
            | "conflicting" => Self::Conflicting,
            _ => Self::Other,
        })
    }
}

/// Derived pathogenicity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pathogenicity {
    Pathogenic,
    LikelyPathogenic,
    UncertainSignificance,
    LikelyBenign,
    Benign,
}

impl Pathogenicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pathogenic => "pathogenic",
            Self::LikelyPathogenic => "likely_pathogenic",
            Self::UncertainSignificance => "uncertain_significance",
            Self::LikelyBenign => "likely_benign",
            Self::Benign => "benign",
        }
    }
}

impl std::fmt::Display for Pathogenicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_significance() {
        let parse = |s: &str| s.parse::<ClinicalSignificance>().unwrap();
        assert_eq!(parse("Pathogenic"), ClinicalSignificance::Pathogenic);
        assert_eq!(parse("likely_benign"), ClinicalSignificance::LikelyBenign);
        assert_eq!(
            parse("Pathogenic/Likely pathogenic"),
            ClinicalSignificance::LikelyPathogenic
        );
        assert_eq!(
            parse("Conflicting classifications of pathogenicity"),
            ClinicalSignificance::Conflicting
        );
        assert_eq!(parse("drug response"), ClinicalSignificance::Other);
    }

    #[test]
    fn test_explicit_pathogenicity() {
        assert_eq!(
            ClinicalSignificance::Benign.explicit_pathogenicity(),
            Some(Pathogenicity::Benign)
        );
        assert_eq!(
            ClinicalSignificance::UncertainSignificance.explicit_pathogenicity(),
            None
        );
        assert_eq!(ClinicalSignificance::Conflicting.explicit_pathogenicity(), None);
    }

    #[test]
    fn test_pathogenicity_serialization() {
        assert_eq!(
            serde_json::to_string(&Pathogenicity::LikelyPathogenic).unwrap(),
            "\"likely_pathogenic\""
        );
        assert_eq!(Pathogenicity::UncertainSignificance.to_string(), "uncertain_significance");
    }
}
