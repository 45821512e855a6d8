use std::collections::HashSet;

use crate::models::{ScoredSection, Section};
use crate::text::TextNormalizer;

const PHRASE_WEIGHT: u32 = 2;
const STEM_WEIGHT: u32 = 1;

/// A narrative prepared once for scoring against every section.
pub struct PreparedNarrative {
    lowered: String,
    stems: HashSet<String>,
    token_count: usize,
}

impl PreparedNarrative {
    pub fn new(narrative: &str, normalizer: &dyn TextNormalizer) -> Self {
        let lowered = narrative.to_lowercase();
        let tokens = normalizer.tokenize(&lowered);
        let token_count = tokens.len();
        let stems = tokens
            .iter()
            .map(|token| normalizer.stem(token))
            .collect();

        Self {
            lowered,
            stems,
            token_count,
        }
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }
}

/// Sum of keyword contributions for one section.
///
/// A keyword containing a space is a phrase and scores when it occurs
/// verbatim (case-insensitive) in the narrative. Any other keyword scores
/// when its stem is among the narrative's token stems.
pub fn score_section(
    section: &Section,
    narrative: &PreparedNarrative,
    normalizer: &dyn TextNormalizer,
) -> u32 {
    section
        .keywords
        .iter()
        .map(|keyword| {
            let keyword = keyword.to_lowercase();
            if keyword.contains(' ') {
                if narrative.lowered.contains(&keyword) {
                    PHRASE_WEIGHT
                } else {
                    0
                }
            } else if narrative.stems.contains(&normalizer.stem(&keyword)) {
                STEM_WEIGHT
            } else {
                0
            }
        })
        .sum()
}

/// One scored entry per section, in catalog order.
pub fn score_sections(
    narrative: &PreparedNarrative,
    sections: Vec<Section>,
    normalizer: &dyn TextNormalizer,
) -> Vec<ScoredSection> {
    sections
        .into_iter()
        .map(|section| {
            let score = score_section(&section, narrative, normalizer);
            ScoredSection { section, score }
        })
        .collect()
}

/// Drops zero scores and keeps the `limit` best. Equal scores keep their
/// catalog order.
pub fn rank(mut scored: Vec<ScoredSection>, limit: usize) -> Vec<ScoredSection> {
    scored.retain(|entry| entry.score > 0);
    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}
