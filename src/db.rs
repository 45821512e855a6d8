use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::catalog::CatalogStore;
use crate::config::AppConfig;
use crate::models::{Judgment, SeedCatalog, SeedManifest, Section};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let options = SqliteConnectOptions::from_str(&config.sqlite_dsn())?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database. A single connection that never expires,
    /// since every new connection would open an empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sections (
                code TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                keywords TEXT NOT NULL,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS judgments (
                id TEXT PRIMARY KEY,
                case_name TEXT NOT NULL,
                synopsis TEXT NOT NULL,
                decided_on TEXT NOT NULL,
                court TEXT NOT NULL,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS judgment_sections (
                judgment_id TEXT NOT NULL,
                section_code TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                PRIMARY KEY (judgment_id, section_code),
                FOREIGN KEY (judgment_id) REFERENCES judgments(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_judgment_sections_code
                ON judgment_sections (section_code);

            CREATE TABLE IF NOT EXISTS seed_manifests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                catalog_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                section_count INTEGER NOT NULL,
                judgment_count INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Clears the catalog and inserts `catalog` in one transaction.
    pub async fn replace_catalog(&self, catalog: &SeedCatalog) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM judgment_sections")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM judgments").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM sections").execute(&mut *tx).await?;

        for (position, section) in catalog.sections.iter().enumerate() {
            insert_section_tx(&mut tx, section, position as i64).await?;
        }
        for (position, judgment) in catalog.judgments.iter().enumerate() {
            insert_judgment_tx(&mut tx, judgment, position as i64).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn section_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM sections")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }

    pub async fn record_manifest(&self, manifest: &SeedManifest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO seed_manifests (catalog_hash, created_at, section_count, judgment_count)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&manifest.catalog_hash)
        .bind(manifest.created_at.to_rfc3339())
        .bind(manifest.section_count)
        .bind(manifest.judgment_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn latest_manifest(&self) -> Result<Option<SeedManifest>> {
        let row = sqlx::query(
            r#"
            SELECT catalog_hash, created_at, section_count, judgment_count
            FROM seed_manifests
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let manifest = row.map(|r| SeedManifest {
            catalog_hash: r.get::<String, _>("catalog_hash"),
            created_at: chrono::DateTime::parse_from_rfc3339(&r.get::<String, _>("created_at"))
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            section_count: r.get::<i64, _>("section_count"),
            judgment_count: r.get::<i64, _>("judgment_count"),
        });

        Ok(manifest)
    }

    async fn section_codes_for(
        &self,
        judgment_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        if judgment_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT judgment_id, section_code FROM judgment_sections WHERE judgment_id IN (",
        );
        let mut separated = qb.separated(",");
        for id in judgment_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY judgment_id, ordinal ASC");

        let rows: Vec<SqliteRow> = qb.build().fetch_all(&self.pool).await?;
        let mut out: HashMap<String, Vec<String>> = HashMap::with_capacity(judgment_ids.len());
        for row in rows {
            out.entry(row.get::<String, _>("judgment_id"))
                .or_default()
                .push(row.get::<String, _>("section_code"));
        }
        Ok(out)
    }
}

#[async_trait]
impl CatalogStore for Database {
    async fn list_sections(&self) -> Result<Vec<Section>> {
        let rows = sqlx::query(
            r#"
            SELECT code, title, description, keywords
            FROM sections
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_section).collect()
    }

    async fn find_judgments_by_section_code(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<Judgment>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT j.id, j.case_name, j.synopsis, j.decided_on, j.court
            FROM judgments j
            JOIN judgment_sections js ON js.judgment_id = j.id
            WHERE js.section_code = ?
            ORDER BY j.position ASC
            LIMIT ?
            "#,
        )
        .bind(code)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<String> = rows.iter().map(|r| r.get::<String, _>("id")).collect();
        let mut codes = self.section_codes_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let id = row.get::<String, _>("id");
                let section_codes = codes.remove(&id).unwrap_or_default();
                row_to_judgment(row, section_codes)
            })
            .collect()
    }
}

async fn insert_section_tx(
    tx: &mut Transaction<'_, Sqlite>,
    section: &Section,
    position: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sections (code, title, description, keywords, position)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&section.code)
    .bind(&section.title)
    .bind(&section.description)
    .bind(serde_json::to_string(&section.keywords)?)
    .bind(position)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed inserting section {}", section.code))?;

    Ok(())
}

async fn insert_judgment_tx(
    tx: &mut Transaction<'_, Sqlite>,
    judgment: &Judgment,
    position: i64,
) -> Result<()> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO judgments (id, case_name, synopsis, decided_on, court, position)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&judgment.case_name)
    .bind(&judgment.synopsis)
    .bind(judgment.date.format(DATE_FORMAT).to_string())
    .bind(&judgment.court)
    .bind(position)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed inserting judgment {}", judgment.case_name))?;

    for (ordinal, code) in judgment.section_codes.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO judgment_sections (judgment_id, section_code, ordinal)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(code)
        .bind(ordinal as i64)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn row_to_section(row: SqliteRow) -> Result<Section> {
    let code: String = row.get("code");
    let keywords: Vec<String> = serde_json::from_str(&row.get::<String, _>("keywords"))
        .with_context(|| format!("corrupt keyword list for section {}", code))?;

    Ok(Section {
        code,
        title: row.get("title"),
        description: row.get("description"),
        keywords,
    })
}

fn row_to_judgment(row: SqliteRow, section_codes: Vec<String>) -> Result<Judgment> {
    let decided_on: String = row.get("decided_on");
    let date = NaiveDate::parse_from_str(&decided_on, DATE_FORMAT)
        .with_context(|| format!("invalid judgment date: {}", decided_on))?;

    Ok(Judgment {
        case_name: row.get("case_name"),
        section_codes,
        synopsis: row.get("synopsis"),
        date,
        court: row.get("court"),
    })
}
