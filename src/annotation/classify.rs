//! Pathogenicity classification
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. an explicit ClinVar call (pathogenic, likely pathogenic, likely benign, benign)
//! 2. CADD phred ≥ 30 → likely pathogenic
//! 3. CADD phred < 10 and gnomAD allele frequency > 1% → likely benign
//! 4. uncertain significance

use super::record::PartialAnnotation;
use super::significance::Pathogenicity;

pub const CADD_PATHOGENIC_THRESHOLD: f64 = 30.0;
pub const CADD_BENIGN_THRESHOLD: f64 = 10.0;
pub const COMMON_VARIANT_FREQUENCY: f64 = 0.01;

pub fn classify(fields: &PartialAnnotation) -> Pathogenicity {
    if let Some(call) = fields
        .clinvar_significance
        .and_then(|s| s.explicit_pathogenicity())
    {
        return call;
    }

    if let Some(cadd) = fields.cadd_phred {
        if cadd >= CADD_PATHOGENIC_THRESHOLD {
            return Pathogenicity::LikelyPathogenic;
        }
        if cadd < CADD_BENIGN_THRESHOLD
            && fields
                .gnomad_af
                .is_some_and(|af| af > COMMON_VARIANT_FREQUENCY)
        {
            return Pathogenicity::LikelyBenign;
        }
    }

    Pathogenicity::UncertainSignificance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::significance::ClinicalSignificance;
    use rstest::rstest;

    fn fields(
        clinvar: Option<ClinicalSignificance>,
        cadd: Option<f64>,
        af: Option<f64>,
    ) -> PartialAnnotation {
        PartialAnnotation {
            clinvar_significance: clinvar,
            cadd_phred: cadd,
            gnomad_af: af,
            ..Default::default()
        }
    }

    #[rstest]
    #[case::high_cadd(None, Some(35.0), Some(0.0001), Pathogenicity::LikelyPathogenic)]
    #[case::low_cadd_common(None, Some(5.0), Some(0.02), Pathogenicity::LikelyBenign)]
    #[case::clinvar_wins(Some(ClinicalSignificance::Benign), Some(40.0), None, Pathogenicity::Benign)]
    #[case::nothing(None, None, None, Pathogenicity::UncertainSignificance)]
    #[case::cadd_boundary(None, Some(30.0), None, Pathogenicity::LikelyPathogenic)]
    #[case::cadd_just_below(None, Some(29.9), None, Pathogenicity::UncertainSignificance)]
    #[case::frequency_boundary(None, Some(5.0), Some(0.01), Pathogenicity::UncertainSignificance)]
    #[case::low_cadd_without_frequency(None, Some(5.0), None, Pathogenicity::UncertainSignificance)]
    #[case::frequency_without_cadd(None, None, Some(0.5), Pathogenicity::UncertainSignificance)]
    #[case::vus_falls_through(
        Some(ClinicalSignificance::UncertainSignificance),
        Some(31.0),
        None,
        Pathogenicity::LikelyPathogenic
    )]
    #[case::conflicting_falls_through(
        Some(ClinicalSignificance::Conflicting),
        Some(3.0),
        Some(0.2),
        Pathogenicity::LikelyBenign
    )]
    #[case::clinvar_pathogenic(
        Some(ClinicalSignificance::Pathogenic),
        Some(1.0),
        Some(0.3),
        Pathogenicity::Pathogenic
    )]
    fn test_classify(
        #[case] clinvar: Option<ClinicalSignificance>,
        #[case] cadd: Option<f64>,
        #[case] af: Option<f64>,
        #[case] expected: Pathogenicity,
    ) {
        assert_eq!(classify(&fields(clinvar, cadd, af)), expected);
    }
}
