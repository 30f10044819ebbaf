//! Parallel variant mapping with rayon
//!
//! Enable with the `parallel` feature (on by default).
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "parallel")]
//! # fn main() {
//! use varviz::mapper::MappingOptions;
//! use varviz::parallel::map_variants_parallel;
//! use varviz::sources::mock::tp53_context;
//! use varviz::variant::GenomicVariant;
//!
//! let ctx = tp53_context();
//! let variants = vec![
//!     GenomicVariant::new("17", 7577120, "C", "T"),
//!     GenomicVariant::new("17", 7577121, "G", "A"),
//! ];
//! let mapped = map_variants_parallel(&ctx, MappingOptions::default(), &variants, 0);
//! assert_eq!(mapped[1].index, 1);
//! # }
//! # #[cfg(not(feature = "parallel"))]
//! # fn main() {}
//! ```

use rayon::prelude::*;

use crate::gene::GeneContext;
use crate::mapper::{CoordinateMapper, MappedVariant, MappingOptions};
use crate::variant::GenomicVariant;

/// Map variants in parallel
///
/// `first_index` is the input index of `variants[0]`, so chunks of a larger
/// request keep their caller positions. Order is preserved.
pub fn map_variants_parallel(
    ctx: &GeneContext,
    options: MappingOptions,
    variants: &[GenomicVariant],
    first_index: usize,
) -> Vec<MappedVariant> {
    let mapper = CoordinateMapper::new(ctx, options);
    variants
        .par_iter()
        .enumerate()
        .map(|(i, v)| mapper.map(first_index + i, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::UnmappedReason;
    use crate::sources::mock::tp53_context;

    fn variants() -> Vec<GenomicVariant> {
        vec![
            GenomicVariant::new("17", 7577120, "C", "T"),
            GenomicVariant::new("17", 7577120, "G", "A"),
            GenomicVariant::new("17", 0, "C", "T"),
            GenomicVariant::new("1", 100, "A", "G"),
        ]
    }

    #[test]
    fn test_matches_sequential() {
        let ctx = tp53_context();
        let options = MappingOptions {
            include_structure: false,
            ..Default::default()
        };
        let mapper = CoordinateMapper::new(&ctx, options);
        let sequential: Vec<MappedVariant> = variants()
            .iter()
            .enumerate()
            .map(|(i, v)| mapper.map(10 + i, v))
            .collect();
        let parallel = map_variants_parallel(&ctx, options, &variants(), 10);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel[0].index, 10);
        assert_eq!(parallel[3].index, 13);
    }

    #[test]
    fn test_outcomes_without_structure() {
        let ctx = tp53_context();
        let all = map_variants_parallel(&ctx, MappingOptions::default(), &variants(), 0);
        assert_eq!(all[0].unmapped, Some(UnmappedReason::NoStructure));
        assert_eq!(all[2].unmapped, Some(UnmappedReason::InvalidVariant));
    }
}
