use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Judgment, Section};

/// Read access to the section and judgment catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every section, in catalog insertion order.
    async fn list_sections(&self) -> Result<Vec<Section>>;

    /// Up to `limit` judgments that reference `code`, in insertion order.
    async fn find_judgments_by_section_code(&self, code: &str, limit: usize)
        -> Result<Vec<Judgment>>;
}

/// Catalog held in memory. Used for evaluation against seed files and in tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    sections: Vec<Section>,
    judgments: Vec<Judgment>,
}

impl MemoryCatalog {
    pub fn new(sections: Vec<Section>, judgments: Vec<Judgment>) -> Self {
        Self {
            sections,
            judgments,
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list_sections(&self) -> Result<Vec<Section>> {
        Ok(self.sections.clone())
    }

    async fn find_judgments_by_section_code(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<Judgment>> {
        Ok(self
            .judgments
            .iter()
            .filter(|judgment| judgment.section_codes.iter().any(|c| c == code))
            .take(limit)
            .cloned()
            .collect())
    }
}
