use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::FetcherConfig;

/// Pool of realistic browser identities, sampled per attempt.
pub const USER_AGENTS: &[&str] = &[
    // Chrome Win
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    // Chrome Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    // Firefox Win
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    // Firefox Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
    // Safari Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 12_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    // Edge Win
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
    // Opera Win
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 OPR/109.0.0.0",
    // Yandex Browser
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 YaBrowser/24.3.3.827 Yowser/2.5 Safari/537.36",
    // Chrome Android
    "Mozilla/5.0 (Linux; Android 13; Pixel 6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Mobile Safari/537.36",
    // Safari iPhone
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

const ACCEPT_LANGUAGE_VALUE: &str = "uk,en;q=0.9,ru;q=0.8";

/// Terminal outcomes of the retry loop. `Unavailable` means the upstream
/// answered and said no (404, 403, 5xx); it is never retried. Everything
/// transient (timeouts, resets, 429 storms) collapses into
/// `RetriesExhausted` once the attempt budget is spent.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page unavailable: upstream returned status {status}")]
    Unavailable { status: u16 },

    #[error("failed to fetch page after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// HTTP GET with bounded retry, randomized browser identity and optional
/// per-attempt proxy rotation.
pub struct Fetcher {
    config: FetcherConfig,
    rng: Mutex<SmallRng>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    /// Seeded constructor for deterministic tests.
    pub fn with_rng(config: FetcherConfig, rng: SmallRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            let client = match self.build_client() {
                Ok(client) => client,
                Err(e) => {
                    error!("attempt {}: failed to build client: {}", attempt, e);
                    self.backoff(attempt, attempts).await;
                    continue;
                }
            };

            let response = client
                .get(url)
                .header(USER_AGENT, self.random_user_agent())
                .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!("got 429 on attempt {}, backing off", attempt);
                        self.backoff(attempt, attempts).await;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(FetchError::Unavailable {
                            status: status.as_u16(),
                        });
                    }

                    match response.text().await {
                        Ok(body) => return Ok(body),
                        Err(e) => {
                            error!("attempt {}: failed to read body: {}", attempt, e);
                            self.backoff(attempt, attempts).await;
                        }
                    }
                }
                Err(e) => {
                    error!("attempt {}: {}", attempt, e);
                    self.backoff(attempt, attempts).await;
                }
            }
        }

        Err(FetchError::RetriesExhausted { attempts })
    }

    // reqwest binds proxies at build time, so each attempt gets its own
    // client; this also keeps proxy choice non-sticky across attempts.
    fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds));

        if let Some(proxy_uri) = self.random_proxy() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_uri)?);
        }

        builder.build()
    }

    fn random_user_agent(&self) -> &'static str {
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    fn random_proxy(&self) -> Option<String> {
        if self.config.proxy_pool.is_empty() {
            return None;
        }
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let index = rng.gen_range(0..self.config.proxy_pool.len());
        Some(self.config.proxy_pool[index].clone())
    }

    // Exponential backoff: base * 2^(attempt-1). Skipped after the final
    // attempt since nothing follows it.
    async fn backoff(&self, attempt: u32, attempts: u32) {
        if attempt >= attempts {
            return;
        }
        let millis = self
            .config
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt - 1));
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(max_attempts: u32) -> FetcherConfig {
        FetcherConfig {
            timeout_seconds: 5,
            max_attempts,
            proxy_pool: Vec::new(),
            backoff_base_ms: 5,
        }
    }

    fn test_fetcher(max_attempts: u32) -> Fetcher {
        Fetcher::with_rng(test_config(max_attempts), SmallRng::seed_from_u64(42))
    }

    #[test]
    fn test_user_agent_pool_is_large_enough() {
        assert!(USER_AGENTS.len() >= 10);
        assert!(USER_AGENTS.iter().all(|ua| ua.starts_with("Mozilla/5.0")));
    }

    #[test]
    fn test_random_user_agent_comes_from_pool() {
        let fetcher = test_fetcher(3);
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&fetcher.random_user_agent()));
        }
    }

    #[test]
    fn test_seeded_sampling_is_deterministic() {
        let a = test_fetcher(3);
        let b = test_fetcher(3);
        let seq_a: Vec<_> = (0..5).map(|_| a.random_user_agent()).collect();
        let seq_b: Vec<_> = (0..5).map(|_| b.random_user_agent()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_random_proxy_selection() {
        let fetcher = test_fetcher(3);
        assert!(fetcher.random_proxy().is_none());

        let mut config = test_config(3);
        config.proxy_pool = vec![
            "http://proxy-a:8080".to_string(),
            "http://proxy-b:8080".to_string(),
        ];
        let fetcher = Fetcher::with_rng(config.clone(), SmallRng::seed_from_u64(7));
        for _ in 0..10 {
            let proxy = fetcher.random_proxy().unwrap();
            assert!(config.proxy_pool.contains(&proxy));
        }
    }

    #[tokio::test]
    async fn test_success_returns_body_with_browser_headers() {
        let server = MockServer::start().await;
        // The mock only matches when the browser identity and language
        // headers actually go out.
        Mock::given(method("GET"))
            .and(path("/ad/123"))
            .and(header("accept-language", ACCEPT_LANGUAGE_VALUE))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3);
        let body = fetcher
            .fetch(&format!("{}/ad/123", server.uri()))
            .await
            .unwrap();

        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_not_found_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3);
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();

        assert!(matches!(err, FetchError::Unavailable { status: 404 }));
        // A single request: unavailable pages must not burn the retry budget.
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3);
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();

        assert!(matches!(err, FetchError::Unavailable { status: 500 }));
    }

    #[tokio::test]
    async fn test_rate_limit_retries_until_success() {
        let server = MockServer::start().await;
        // Three 429s, then the page comes back.
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(4);
        let body = fetcher.fetch(&server.uri()).await.unwrap();

        assert_eq!(body, "body");
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_is_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3);
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();

        // 429 storms exhaust attempts; they never classify as unavailable.
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 3 }));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_connection_error_retries_then_exhausts() {
        // Nothing listens on this port.
        let fetcher = test_fetcher(2);
        let err = fetcher.fetch("http://127.0.0.1:1/ad").await.unwrap_err();

        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 2 }));
    }
}
