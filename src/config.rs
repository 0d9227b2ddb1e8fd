//! Configuration for Plansync
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Shortest JWT secret accepted outside dev mode
const MIN_JWT_SECRET_LEN: usize = 32;

/// Plansync - plan records with an asynchronously indexed search projection
#[derive(Parser, Debug, Clone)]
#[command(name = "plansync")]
#[command(about = "Plan record service with ETag concurrency and a search projection")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (disables auth, in-memory fallbacks)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "plansync")]
    pub mongodb_db: String,

    /// Collection holding canonical plan records
    #[arg(long, env = "CANONICAL_COLLECTION", default_value = "plans")]
    pub canonical_collection: String,

    /// Search index (collection) receiving the derived document tree
    #[arg(long, env = "SEARCH_INDEX", default_value = "plans")]
    pub search_index: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// JWT secret for bearer token validation (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Expected JWT audience (unchecked when unset)
    #[arg(long, env = "JWT_AUDIENCE")]
    pub jwt_audience: Option<String>,

    /// Request timeout in milliseconds, bounds queue publish acks
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Run the index worker inside the server process
    #[arg(long, env = "INDEXER_ENABLED", default_value = "true")]
    pub indexer_enabled: bool,

    /// Attempts per change event before it is given up on
    #[arg(long, env = "INDEXER_MAX_ATTEMPTS", default_value = "5")]
    pub indexer_max_attempts: u32,

    /// Initial retry backoff in milliseconds, doubled per attempt
    #[arg(long, env = "INDEXER_BACKOFF_MS", default_value = "200")]
    pub indexer_backoff_ms: u64,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,

    /// Queue (JetStream subject) carrying change events
    #[arg(long, env = "QUEUE_NAME", default_value = "plan_requests")]
    pub queue_name: String,
}

impl Args {
    /// Whether `/v1` routes require a bearer token.
    ///
    /// Dev mode turns auth off unless a secret is given explicitly.
    pub fn auth_enabled(&self) -> bool {
        !self.dev_mode || self.jwt_secret.is_some()
    }

    /// Request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether log output should be JSON
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_JWT_SECRET_LEN => {
                    return Err(format!(
                        "JWT_SECRET must be at least {} bytes",
                        MIN_JWT_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
        }

        if self.indexer_max_attempts == 0 {
            return Err("INDEXER_MAX_ATTEMPTS must be at least 1".to_string());
        }

        if self.nats.queue_name.trim().is_empty() {
            return Err("QUEUE_NAME must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["plansync"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.canonical_collection, "plans");
        assert_eq!(args.search_index, "plans");
        assert_eq!(args.nats.queue_name, "plan_requests");
        assert_eq!(args.indexer_max_attempts, 5);
        assert!(args.indexer_enabled);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_production_requires_strong_secret() {
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["--jwt-secret", "short"]).validate().is_err());

        let secret = "x".repeat(MIN_JWT_SECRET_LEN);
        assert!(parse(&["--jwt-secret", &secret]).validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let args = parse(&["--dev-mode", "--indexer-max-attempts", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_auth_enabled() {
        assert!(!parse(&["--dev-mode"]).auth_enabled());
        assert!(parse(&["--dev-mode", "--jwt-secret", "s"]).auth_enabled());
        assert!(parse(&[]).auth_enabled());
    }
}
