//! Catalog seeding: loading, validating and installing section/judgment sets.
//!
//! A catalog is installed wholesale. The SHA-256 of its canonical JSON is
//! recorded in a manifest so that reseeding an unchanged catalog is a no-op
//! unless a rebuild is requested.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::db::Database;
use crate::models::{SeedCatalog, SeedManifest};

const BUILTIN_CATALOG: &str = include_str!("../data/seed.json");

#[derive(Debug, Clone)]
pub struct SeedResult {
    pub section_count: i64,
    pub judgment_count: i64,
    pub skipped: bool,
}

#[derive(Clone)]
pub struct Seeder {
    db: Database,
}

impl Seeder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn seed(&self, catalog: &SeedCatalog, rebuild: bool) -> Result<SeedResult> {
        validate_catalog(catalog)?;
        let catalog_hash = catalog_hash(catalog)?;

        if !rebuild {
            if let Some(latest) = self.db.latest_manifest().await? {
                if latest.catalog_hash == catalog_hash {
                    tracing::info!(
                        sections = latest.section_count,
                        judgments = latest.judgment_count,
                        "catalog unchanged; skipped reseed"
                    );
                    return Ok(SeedResult {
                        section_count: latest.section_count,
                        judgment_count: latest.judgment_count,
                        skipped: true,
                    });
                }
            }
        }

        self.db.replace_catalog(catalog).await?;

        let manifest = SeedManifest {
            catalog_hash,
            created_at: Utc::now(),
            section_count: catalog.sections.len() as i64,
            judgment_count: catalog.judgments.len() as i64,
        };
        self.db.record_manifest(&manifest).await?;

        tracing::info!(
            sections = manifest.section_count,
            judgments = manifest.judgment_count,
            "catalog seeded"
        );

        Ok(SeedResult {
            section_count: manifest.section_count,
            judgment_count: manifest.judgment_count,
            skipped: false,
        })
    }

    /// Installs the built-in catalog when the store has no sections.
    pub async fn ensure_seeded(&self) -> Result<Option<SeedResult>> {
        if self.db.section_count().await? > 0 {
            return Ok(None);
        }

        let catalog = builtin_catalog()?;
        self.seed(&catalog, true).await.map(Some)
    }
}

pub fn builtin_catalog() -> Result<SeedCatalog> {
    parse_catalog(BUILTIN_CATALOG).context("built-in catalog is invalid")
}

pub async fn load_catalog_file(path: &Path) -> Result<SeedCatalog> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed reading seed file: {}", path.display()))?;
    parse_catalog(&raw).with_context(|| format!("invalid seed file: {}", path.display()))
}

pub fn parse_catalog(raw: &str) -> Result<SeedCatalog> {
    let catalog: SeedCatalog = serde_json::from_str(raw)?;
    Ok(normalize_catalog(catalog))
}

/// Trims every text field and drops blank keywords and section codes.
pub fn normalize_catalog(mut catalog: SeedCatalog) -> SeedCatalog {
    for section in &mut catalog.sections {
        section.code = section.code.trim().to_string();
        section.title = section.title.trim().to_string();
        section.description = section.description.trim().to_string();
        section.keywords = section
            .keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
    }

    for judgment in &mut catalog.judgments {
        judgment.case_name = judgment.case_name.trim().to_string();
        judgment.synopsis = judgment.synopsis.trim().to_string();
        judgment.court = judgment.court.trim().to_string();
        judgment.section_codes = judgment
            .section_codes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }

    catalog
}

/// Rejects blank or duplicate section codes. Sections that can never match
/// and judgments citing unknown sections are only logged.
pub fn validate_catalog(catalog: &SeedCatalog) -> Result<()> {
    let mut codes = HashSet::with_capacity(catalog.sections.len());

    for section in &catalog.sections {
        if section.code.is_empty() {
            bail!("section '{}' has an empty code", section.title);
        }
        if !codes.insert(section.code.as_str()) {
            bail!("duplicate section code: {}", section.code);
        }
        if section.keywords.is_empty() {
            tracing::warn!(code = %section.code, "section has no keywords and will never match");
        }
    }

    for judgment in &catalog.judgments {
        for code in &judgment.section_codes {
            if !codes.contains(code.as_str()) {
                tracing::warn!(
                    case = %judgment.case_name,
                    code = %code,
                    "judgment references an unknown section"
                );
            }
        }
    }

    Ok(())
}

pub fn catalog_hash(catalog: &SeedCatalog) -> Result<String> {
    let canonical = serde_json::to_vec(catalog)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use crate::catalog::CatalogStore;
    use crate::models::Section;

    use super::*;

    fn section(code: &str) -> Section {
        Section {
            code: code.to_string(),
            title: "Title".to_string(),
            description: "Description".to_string(),
            keywords: vec!["keyword".to_string()],
        }
    }

    #[test]
    fn builtin_catalog_has_the_ipc_sections() {
        let catalog = builtin_catalog().unwrap();
        let codes: Vec<_> = catalog.sections.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["IPC 302", "IPC 307", "IPC 376", "IPC 379", "IPC 420", "IPC 454", "IPC 323"]
        );
        assert_eq!(catalog.judgments.len(), 4);
        assert!(validate_catalog(&catalog).is_ok());
    }

    #[test]
    fn parse_trims_fields_and_drops_blank_keywords() {
        let catalog = parse_catalog(
            r#"{
                "sections": [
                    {"code": " IPC 506 ", "title": " Intimidation ", "description": "d",
                     "keywords": [" threat ", "", "  "]}
                ],
                "judgments": [
                    {"caseName": " A v. B ", "sectionCodes": [" IPC 506", " "],
                     "synopsis": "s", "date": "2001-02-03", "court": " High Court "}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.sections[0].code, "IPC 506");
        assert_eq!(catalog.sections[0].title, "Intimidation");
        assert_eq!(catalog.sections[0].keywords, vec!["threat"]);
        assert_eq!(catalog.judgments[0].case_name, "A v. B");
        assert_eq!(catalog.judgments[0].section_codes, vec!["IPC 506"]);
        assert_eq!(catalog.judgments[0].court, "High Court");
    }

    #[test]
    fn parse_rejects_bad_dates() {
        let err = parse_catalog(
            r#"{"judgments": [{"caseName": "A", "sectionCodes": [], "synopsis": "s",
                "date": "15/05/1992", "court": "c"}]}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn validation_rejects_duplicate_and_blank_codes() {
        let duplicate = SeedCatalog {
            sections: vec![section("IPC 302"), section("IPC 302")],
            judgments: vec![],
        };
        let err = validate_catalog(&duplicate).unwrap_err();
        assert!(err.to_string().contains("duplicate section code"));

        let blank = SeedCatalog {
            sections: vec![section("")],
            judgments: vec![],
        };
        assert!(validate_catalog(&blank).is_err());
    }

    #[test]
    fn hash_tracks_catalog_content() {
        let catalog = builtin_catalog().unwrap();
        let same = builtin_catalog().unwrap();
        assert_eq!(catalog_hash(&catalog).unwrap(), catalog_hash(&same).unwrap());

        let mut changed = catalog.clone();
        changed.sections[0].keywords.push("manslaughter".to_string());
        assert_ne!(catalog_hash(&catalog).unwrap(), catalog_hash(&changed).unwrap());
    }

    #[tokio::test]
    async fn unchanged_catalog_is_skipped_unless_rebuilt() {
        let db = Database::in_memory().await.unwrap();
        let seeder = Seeder::new(db.clone());
        let catalog = builtin_catalog().unwrap();

        let first = seeder.seed(&catalog, false).await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.section_count, 7);
        assert_eq!(first.judgment_count, 4);

        let second = seeder.seed(&catalog, false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.section_count, 7);

        let forced = seeder.seed(&catalog, true).await.unwrap();
        assert!(!forced.skipped);
        assert_eq!(db.list_sections().await.unwrap(), catalog.sections);
    }

    #[tokio::test]
    async fn ensure_seeded_only_fills_an_empty_store() {
        let db = Database::in_memory().await.unwrap();
        let seeder = Seeder::new(db.clone());

        let installed = seeder.ensure_seeded().await.unwrap().unwrap();
        assert_eq!(installed.section_count, 7);
        assert_eq!(db.section_count().await.unwrap(), 7);

        assert!(seeder.ensure_seeded().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_catalog_leaves_store_untouched() {
        let db = Database::in_memory().await.unwrap();
        let seeder = Seeder::new(db.clone());
        seeder.ensure_seeded().await.unwrap();

        let duplicate = SeedCatalog {
            sections: vec![section("IPC 1"), section("IPC 1")],
            judgments: vec![],
        };
        assert!(seeder.seed(&duplicate, true).await.is_err());
        assert_eq!(db.section_count().await.unwrap(), 7);
    }
}
