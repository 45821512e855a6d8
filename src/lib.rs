pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod db;
pub mod matching;
pub mod models;
pub mod seed;
pub mod server;
pub mod text;

pub use config::AppConfig;
pub use server::run_server;
