use std::sync::Arc;

use anyhow::Context;
use futures::future::try_join_all;
use thiserror::Error;

use crate::catalog::CatalogStore;
use crate::config::MatchingConfig;
use crate::matching::{rank, score_sections, PreparedNarrative};
use crate::models::{JudgmentSummary, Recommendation, ScoredSection};
use crate::text::TextNormalizer;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("narrative is empty")]
    EmptyNarrative,

    #[error("catalog access failed: {0:#}")]
    Catalog(#[from] anyhow::Error),
}

/// Scores a narrative against the catalog and assembles recommendations.
#[derive(Clone)]
pub struct Analyzer {
    catalog: Arc<dyn CatalogStore>,
    normalizer: Arc<dyn TextNormalizer>,
    config: MatchingConfig,
}

impl Analyzer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        normalizer: Arc<dyn TextNormalizer>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            catalog,
            normalizer,
            config,
        }
    }

    /// Ranks catalog sections against `narrative` and attaches their judgments.
    ///
    /// A narrative that is empty or only whitespace is rejected with
    /// [`AnalysisError::EmptyNarrative`] (HTTP 400) before the catalog is read,
    /// so whitespace is not treated as a valid narrative with no matches.
    pub async fn analyze(&self, narrative: &str) -> Result<Vec<Recommendation>, AnalysisError> {
        if narrative.trim().is_empty() {
            return Err(AnalysisError::EmptyNarrative);
        }

        let prepared = PreparedNarrative::new(narrative, self.normalizer.as_ref());
        let sections = self
            .catalog
            .list_sections()
            .await
            .context("failed listing sections")?;
        let section_count = sections.len();

        let scored = score_sections(&prepared, sections, self.normalizer.as_ref());
        let ranked = rank(scored, self.config.max_recommendations);

        tracing::debug!(
            tokens = prepared.token_count(),
            sections = section_count,
            matched = ranked.len(),
            "scored narrative"
        );

        // Fetches run concurrently; output keeps rank order.
        let recommendations = try_join_all(ranked.into_iter().map(|entry| self.assemble(entry)))
            .await?;

        Ok(recommendations)
    }

    async fn assemble(&self, entry: ScoredSection) -> anyhow::Result<Recommendation> {
        let limit = self.config.judgments_per_section;
        let judgments = self
            .catalog
            .find_judgments_by_section_code(&entry.section.code, limit)
            .await
            .with_context(|| format!("failed fetching judgments for {}", entry.section.code))?;

        let section = entry.section;
        Ok(Recommendation {
            score: normalized_score(entry.score, section.keywords.len()),
            code: section.code,
            title: section.title,
            description: section.description,
            judgments: judgments
                .into_iter()
                .take(limit)
                .map(JudgmentSummary::from)
                .collect(),
        })
    }
}

/// Raw score over keyword count, clamped to 1. Phrase hits weigh 2, so the
/// ratio can exceed 1 before the clamp.
pub fn normalized_score(score: u32, keyword_count: usize) -> f64 {
    if keyword_count == 0 {
        return 0.0;
    }
    (f64::from(score) / keyword_count as f64).min(1.0)
}
