use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub code: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Judgment {
    pub case_name: String,
    pub section_codes: Vec<String>,
    pub synopsis: String,
    pub date: NaiveDate,
    pub court: String,
}

#[derive(Debug, Clone)]
pub struct ScoredSection {
    pub section: Section,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JudgmentSummary {
    pub case_name: String,
    pub synopsis: String,
}

impl From<Judgment> for JudgmentSummary {
    fn from(judgment: Judgment) -> Self {
        Self {
            case_name: judgment.case_name,
            synopsis: judgment.synopsis,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub code: String,
    pub title: String,
    pub description: String,
    pub score: f64,
    pub judgments: Vec<JudgmentSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub narrative: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedCatalog {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub judgments: Vec<Judgment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedManifest {
    pub catalog_hash: String,
    pub created_at: DateTime<Utc>,
    pub section_count: i64,
    pub judgment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<i64>,
}
