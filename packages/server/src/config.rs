use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Enables the render proxy for JavaScript boards and as a fallback when a board blocks us
    pub firecrawl_api_key: Option<String>,
    pub browser_sources_enabled: bool,
    pub chrome_path: Option<PathBuf>,
    pub request_deadline_secs: u64,
    pub source_concurrency: usize,
    pub max_results: usize,
    pub max_pages_cap: u32,
    pub requests_per_second: u32,
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, value)),
        _ => Ok(default),
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let config = Self {
            port: var_or("PORT", 3000)?,
            firecrawl_api_key: optional_var("FIRECRAWL_API_KEY"),
            browser_sources_enabled: var_or("BROWSER_SOURCES_ENABLED", true)?,
            chrome_path: optional_var("CHROME_PATH").map(PathBuf::from),
            request_deadline_secs: var_or("REQUEST_DEADLINE_SECS", 120)?,
            source_concurrency: var_or("SOURCE_CONCURRENCY", 1)?,
            max_results: var_or("MAX_RESULTS", 200)?,
            max_pages_cap: var_or("MAX_PAGES_CAP", 5)?,
            requests_per_second: var_or("REQUESTS_PER_SECOND", 2)?,
        };

        anyhow::ensure!(config.max_pages_cap >= 1, "MAX_PAGES_CAP must be at least 1");
        anyhow::ensure!(
            config.source_concurrency >= 1,
            "SOURCE_CONCURRENCY must be at least 1"
        );
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            firecrawl_api_key: None,
            browser_sources_enabled: true,
            chrome_path: None,
            request_deadline_secs: 120,
            source_concurrency: 1,
            max_results: 200,
            max_pages_cap: 5,
            requests_per_second: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_or_falls_back_when_unset() {
        let value: u32 = var_or("JOBS_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_var_or_rejects_garbage() {
        env::set_var("JOBS_TEST_BAD_NUMBER", "three");
        let result: Result<u32> = var_or("JOBS_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
        env::remove_var("JOBS_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_default_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_pages_cap, 5);
        assert!(config.firecrawl_api_key.is_none());
    }
}
