use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{Probe, ProbeOutcome};
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    follow_redirects: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

/// HTTP/HTTPS probe. One outcome per run; error status codes are handled
/// outcomes, so `code == 503` is a perfectly assertable condition.
pub struct HttpProbe {
    url: Url,
    method: reqwest::Method,
    follow_redirects: bool,
}

impl HttpProbe {
    pub fn from_config(raw: &serde_json::Value) -> Result<Arc<dyn Probe>, ConfigError> {
        let config: HttpConfig =
            serde_json::from_value(raw.clone()).map_err(|e| ConfigError::ProbeConfig {
                probe: "http".to_string(),
                reason: e.to_string(),
            })?;

        let url = Url::parse(&config.url).map_err(|e| ConfigError::ProbeConfig {
            probe: "http".to_string(),
            reason: format!("invalid url {:?}: {e}", config.url),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::ProbeConfig {
                    probe: "http".to_string(),
                    reason: format!("unsupported scheme {other:?}"),
                });
            }
        }

        let method = config.method.to_ascii_uppercase().parse().map_err(|_| {
            ConfigError::ProbeConfig {
                probe: "http".to_string(),
                reason: format!("invalid method {:?}", config.method),
            }
        })?;

        Ok(Arc::new(Self { url, method, follow_redirects: config.follow_redirects }))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(&self, timeout: Duration) -> Vec<ProbeOutcome> {
        let subtest = self.url.as_str().to_string();

        let redirects = if self.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = match reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirects)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                return vec![ProbeOutcome::error(subtest, format!("http client: {e}"))];
            }
        };

        let start = Instant::now();
        let response = client.request(self.method.clone(), self.url.clone()).send().await;
        let elapsed = start.elapsed();

        let outcome = match response {
            Ok(response) => {
                let code = response.status().as_u16();
                let body_size = response.content_length().unwrap_or(0);
                let mut headers = serde_json::Map::new();
                for (name, value) in response.headers() {
                    if let Ok(text) = value.to_str() {
                        headers.insert(name.to_string(), json!(text));
                    }
                }

                let fields = json!({
                    "code": code,
                    "reachable": true,
                    "responsetime": elapsed.as_millis() as u64,
                    "bodysize": body_size,
                    "headers": headers,
                });

                if response.status().is_server_error() || response.status().is_client_error() {
                    // The target answered; the status code itself is the
                    // assertable fact.
                    ProbeOutcome::error(subtest, format!("http status {code}"))
                        .handled()
                        .with_fields(fields)
                } else {
                    ProbeOutcome::success(subtest, elapsed).with_fields(fields)
                }
            }
            Err(e) if e.is_timeout() => ProbeOutcome::timeout(subtest, timeout),
            Err(e) => ProbeOutcome::failure(subtest, format!("http request failed: {e}")),
        };

        vec![outcome]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_bad_config() {
        assert!(HttpProbe::from_config(&json!({})).is_err());
        assert!(HttpProbe::from_config(&json!({"url": "not a url"})).is_err());
        assert!(HttpProbe::from_config(&json!({"url": "ftp://example.com"})).is_err());
        assert!(
            HttpProbe::from_config(&json!({"url": "https://example.com", "banana": 1})).is_err()
        );
    }

    #[test]
    fn test_accepts_valid_config() {
        let probe = HttpProbe::from_config(&json!({
            "url": "https://example.com/health",
            "method": "head",
        }))
        .unwrap();
        assert_eq!(probe.name(), "http");
    }
}
