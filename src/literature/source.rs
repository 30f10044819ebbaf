//! Literature source abstraction

use async_trait::async_trait;

use super::types::{RawPublication, SearchParams};
use crate::error::SourceError;

/// Search backend returning candidate publications
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    fn name(&self) -> &str;

    /// Publications about `gene`, narrowed to `variant` when given
    async fn search(
        &self,
        gene: &str,
        variant: Option<&str>,
        params: &SearchParams,
    ) -> Result<Vec<RawPublication>, SourceError>;
}
