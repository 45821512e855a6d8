use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct MatchingConfig {
    pub max_recommendations: usize,
    pub judgments_per_section: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_recommendations: 5,
            judgments_per_section: 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub seed_file: Option<PathBuf>,
    pub matching: MatchingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = env::var("FIR_ASSIST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let defaults = MatchingConfig::default();

        Self {
            bind_addr: env::var("FIR_ASSIST_BIND")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            data_dir,
            seed_file: env::var("FIR_ASSIST_SEED_FILE").ok().map(PathBuf::from),
            matching: MatchingConfig {
                max_recommendations: env::var("MAX_RECOMMENDATIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_recommendations),
                judgments_per_section: env::var("JUDGMENTS_PER_SECTION")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.judgments_per_section),
            },
        }
    }

    pub fn sqlite_dsn(&self) -> String {
        format!(
            "sqlite://{}",
            self.data_dir.join("fir_assist.sqlite3").display()
        )
    }
}
