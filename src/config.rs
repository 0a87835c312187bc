use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            _ => Ok(Environment::Development),
        }
    }
}

/// Process-wide configuration, loaded once from the environment.
///
/// Mirrors the tunables named throughout the component design: rate
/// limiter window/cap, retry budgets, timeouts and batch sizes all live
/// here rather than as scattered literals, so a deployment can tighten
/// or loosen them without a rebuild.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,

    pub mailtester_api_key: Option<String>,
    pub mailtester_base_url: String,

    pub rapidapi_key: Option<String>,
    pub rapidapi_host: String,

    pub verifier_rate_limit_window_secs: u64,
    pub verifier_rate_limit_max_requests: usize,
    pub verifier_max_retries: u32,
    pub verifier_retry_base_secs: u64,

    pub verifier_http_timeout_secs: u64,
    pub profile_http_timeout_secs: u64,
    pub webhook_timeout_secs: u64,

    pub dns_query_timeout_secs: u64,
    pub dns_total_timeout_secs: u64,

    pub verify_progress_flush_every: usize,
    pub scrape_chunk_size: usize,

    pub scrape_enrich_concurrency: usize,
    pub verify_concurrency: usize,

    pub job_poll_interval_secs: u64,
    pub broker_max_retries: u32,

    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            mailtester_api_key: env::var("MAILTESTER_NINJA_API_KEY").ok(),
            mailtester_base_url: env::var("MAILTESTER_NINJA_BASE_URL")
                .unwrap_or_else(|_| "https://happy.mailtester.ninja/ninja".to_string()),

            rapidapi_key: env::var("RAPIDAPI_KEY").ok(),
            rapidapi_host: env::var("RAPIDAPI_HOST")
                .unwrap_or_else(|_| "fresh-linkedin-profile-data.p.rapidapi.com".to_string()),

            verifier_rate_limit_window_secs: env_parse("VERIFIER_RATE_LIMIT_WINDOW_SECS", 30),
            verifier_rate_limit_max_requests: env_parse("VERIFIER_RATE_LIMIT_MAX_REQUESTS", 35),
            verifier_max_retries: env_parse("VERIFIER_MAX_RETRIES", 2),
            verifier_retry_base_secs: env_parse("VERIFIER_RETRY_BASE_SECS", 31),

            verifier_http_timeout_secs: env_parse("VERIFIER_HTTP_TIMEOUT_SECS", 10),
            profile_http_timeout_secs: env_parse("PROFILE_HTTP_TIMEOUT_SECS", 30),
            webhook_timeout_secs: env_parse("WEBHOOK_TIMEOUT_SECS", 30),

            dns_query_timeout_secs: env_parse("DNS_QUERY_TIMEOUT_SECS", 3),
            dns_total_timeout_secs: env_parse("DNS_TOTAL_TIMEOUT_SECS", 5),

            verify_progress_flush_every: env_parse("VERIFY_PROGRESS_FLUSH_EVERY", 10),
            scrape_chunk_size: env_parse("SCRAPE_CHUNK_SIZE", 50),

            scrape_enrich_concurrency: env_parse("SCRAPE_ENRICH_CONCURRENCY", 50),
            verify_concurrency: env_parse("VERIFY_CONCURRENCY", 1),

            job_poll_interval_secs: env_parse("JOB_POLL_INTERVAL_SECS", 5),
            broker_max_retries: env_parse("BROKER_MAX_RETRIES", 3),

            environment: env::var("ENVIRONMENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Environment::Development),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
