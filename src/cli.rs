//! Command-line interface and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it. Collaborator credentials are optional at startup so the
//! server can come up and report state without them; they are validated
//! lazily, per run, by [`Cli::credentials`].

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::api::GROQ_BASE;
use crate::error::{PipelineError, Result};
use crate::scrapers::firecrawl::FIRECRAWL_BASE;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Command-line arguments for the Hacker News publisher.
///
/// # Examples
///
/// ```sh
/// # Everything from the environment
/// FIRECRAWL_API_KEY=fc-... GROQ_API_KEY=gsk_... WP_SITE_URL=https://blog.example.com \
///   WP_USER=bot WP_APP_PASSWORD='xxxx xxxx' hackernews_publisher
///
/// # HTTP surface only, no daily trigger
/// hackernews_publisher --no-schedule --bind-addr 127.0.0.1:9000
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Firecrawl API key
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true)]
    pub firecrawl_api_key: Option<String>,

    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    /// WordPress site root, e.g. https://blog.example.com
    #[arg(long, env = "WP_SITE_URL")]
    pub wp_site_url: Option<String>,

    /// WordPress user owning the application password
    #[arg(long, env = "WP_USER")]
    pub wp_user: Option<String>,

    /// WordPress application password
    #[arg(long, env = "WP_APP_PASSWORD", hide_env_values = true)]
    pub wp_app_password: Option<String>,

    /// Groq model used to write posts
    #[arg(long, env = "GROQ_MODEL", default_value = "openai/gpt-oss-120b")]
    pub groq_model: String,

    /// User-Agent sent to WordPress and used for the shared HTTP client
    #[arg(long, env = "HTTP_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8787")]
    pub bind_addr: SocketAddr,

    /// Where the publish state is persisted
    #[arg(short, long, env = "STATE_FILE", default_value = "./publish_state.json")]
    pub state_file: PathBuf,

    /// Hour (IST) of the daily publish
    #[arg(long, env = "SCHEDULE_HOUR_IST", default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..24))]
    pub schedule_hour_ist: u32,

    /// Minute (IST) of the daily publish
    #[arg(long, env = "SCHEDULE_MINUTE_IST", default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..60))]
    pub schedule_minute_ist: u32,

    /// Serve HTTP only; never publish on a timer
    #[arg(long)]
    pub no_schedule: bool,

    /// Firecrawl API root
    #[arg(long, env = "FIRECRAWL_BASE_URL", default_value = FIRECRAWL_BASE)]
    pub firecrawl_base_url: String,

    /// Groq API root
    #[arg(long, env = "GROQ_BASE_URL", default_value = GROQ_BASE)]
    pub groq_base_url: String,

    /// Per-request timeout for collaborator calls, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 120)]
    pub http_timeout_secs: u64,
}

/// The secrets one pipeline run needs, all present and non-blank.
#[derive(Clone)]
pub struct Credentials {
    pub firecrawl_api_key: String,
    pub groq_api_key: String,
    pub wp_site_url: String,
    pub wp_user: String,
    pub wp_app_password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("wp_site_url", &self.wp_site_url)
            .field("wp_user", &self.wp_user)
            .finish_non_exhaustive()
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(PipelineError::Config(name)),
    }
}

impl Cli {
    /// Validate the collaborator credentials.
    ///
    /// Fails with the name of the first missing or blank variable.
    pub fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            firecrawl_api_key: required(&self.firecrawl_api_key, "FIRECRAWL_API_KEY")?,
            groq_api_key: required(&self.groq_api_key, "GROQ_API_KEY")?,
            wp_site_url: required(&self.wp_site_url, "WP_SITE_URL")?,
            wp_user: required(&self.wp_user, "WP_USER")?,
            wp_app_password: required(&self.wp_app_password, "WP_APP_PASSWORD")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["hackernews_publisher"]);

        assert_eq!(cli.groq_model, "openai/gpt-oss-120b");
        assert_eq!(cli.bind_addr, "0.0.0.0:8787".parse().unwrap());
        assert_eq!(cli.state_file, PathBuf::from("./publish_state.json"));
        assert_eq!(cli.schedule_hour_ist, 6);
        assert_eq!(cli.schedule_minute_ist, 0);
        assert!(!cli.no_schedule);
        assert_eq!(cli.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cli.firecrawl_base_url, "https://api.firecrawl.dev/v1");
        assert_eq!(cli.groq_base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "hackernews_publisher",
            "--no-schedule",
            "-s",
            "/tmp/state.json",
            "--schedule-hour-ist",
            "18",
            "--schedule-minute-ist",
            "45",
        ]);

        assert!(cli.no_schedule);
        assert_eq!(cli.state_file, PathBuf::from("/tmp/state.json"));
        assert_eq!(cli.schedule_hour_ist, 18);
        assert_eq!(cli.schedule_minute_ist, 45);
    }

    #[test]
    fn test_schedule_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["hackernews_publisher", "--schedule-hour-ist", "24"]).is_err());
        assert!(Cli::try_parse_from(["hackernews_publisher", "--schedule-minute-ist", "60"]).is_err());
    }

    #[test]
    fn test_credentials_report_first_missing_variable() {
        let cli = Cli::parse_from([
            "hackernews_publisher",
            "--firecrawl-api-key",
            "fc",
            "--groq-api-key",
            "   ",
            "--wp-site-url",
            "https://blog.example.com",
        ]);
        let err = cli.credentials().unwrap_err();
        assert_eq!(err.to_string(), "Missing required environment variable GROQ_API_KEY");
    }

    #[test]
    fn test_credentials_complete() {
        let cli = Cli::parse_from([
            "hackernews_publisher",
            "--firecrawl-api-key",
            "fc",
            "--groq-api-key",
            "gsk",
            "--wp-site-url",
            " https://blog.example.com ",
            "--wp-user",
            "bot",
            "--wp-app-password",
            "abcd efgh",
        ]);
        let creds = cli.credentials().unwrap();
        assert_eq!(creds.wp_site_url, "https://blog.example.com");
        assert_eq!(creds.wp_app_password, "abcd efgh");
    }
}
