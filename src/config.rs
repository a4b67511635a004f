use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Seconds between scheduler ticks
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Maximum number of feeds refreshed per tick
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Upper bound for a single feed download, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_concurrency() -> u32 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "rss-aggregator/0.1".to_string()
}

fn default_owner() -> String {
    "admin".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    /// Name of the user the feed belongs to
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be greater than zero");
        }
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        assert_eq!(default_refresh_interval_secs(), 60);
        assert_eq!(default_concurrency(), 10);
        assert_eq!(default_fetch_timeout_secs(), 10);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            refresh_interval_secs = 30
            concurrency = 4
            fetch_timeout_secs = 5

            [[feeds]]
            name = "Test Feed"
            url = "https://example.com/feed.xml"
            owner = "alice"

            [[feeds]]
            name = "Another Feed"
            url = "https://example.org/rss"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].name, "Test Feed");
        assert_eq!(config.feeds[0].url, "https://example.com/feed.xml");
        assert_eq!(config.feeds[0].owner, "alice");
        assert_eq!(config.feeds[1].owner, "admin");
    }

    #[test]
    fn test_scheduler_settings_default_when_omitted() {
        let content = r#"
            [[feeds]]
            name = "Test Feed"
            url = "https://example.com/feed.xml"
        "#;

        let config = Config::from_str(content).unwrap();

        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.user_agent, "rss-aggregator/0.1");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_required_fields() {
        let content = r#"
            [[feeds]]
            name = "Test Feed"
            # Missing url field
        "#;

        let result = Config::from_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = Config::from_str("concurrency = 0").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_str("refresh_interval_secs = 0").unwrap_err();
        assert!(err.to_string().contains("refresh_interval_secs"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_str("fetch_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("fetch_timeout_secs"));
    }

    #[test]
    fn test_empty_feeds_list() {
        let config = Config::from_str("feeds = []").unwrap();
        assert!(config.feeds.is_empty());

        let config = Config::from_str("").unwrap();
        assert!(config.feeds.is_empty());
    }
}
