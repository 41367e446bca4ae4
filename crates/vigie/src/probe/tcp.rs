use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout as with_timeout;

use super::{Probe, ProbeOutcome};
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TcpConfig {
    host: String,
    port: u16,
}

/// TCP connect probe. The host is resolved on every run and the check
/// fans out into one outcome per resolved address, so a multi-homed
/// target reports each address independently.
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn from_config(raw: &serde_json::Value) -> Result<Arc<dyn Probe>, ConfigError> {
        let config: TcpConfig =
            serde_json::from_value(raw.clone()).map_err(|e| ConfigError::ProbeConfig {
                probe: "tcp".to_string(),
                reason: e.to_string(),
            })?;
        if config.host.is_empty() {
            return Err(ConfigError::ProbeConfig {
                probe: "tcp".to_string(),
                reason: "host must not be empty".to_string(),
            });
        }
        Ok(Arc::new(Self { host: config.host, port: config.port }))
    }

    async fn connect(addr: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let subtest = addr.to_string();
        let start = Instant::now();

        match with_timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                let elapsed = start.elapsed();
                ProbeOutcome::success(subtest, elapsed).with_fields(json!({
                    "reachable": true,
                    "address": addr.ip().to_string(),
                    "port": addr.port(),
                    "responsetime": elapsed.as_millis() as u64,
                }))
            }
            Ok(Err(e)) => ProbeOutcome::failure(subtest, format!("tcp connect failed: {e}")),
            Err(_) => ProbeOutcome::timeout(subtest, timeout),
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn run(&self, timeout: Duration) -> Vec<ProbeOutcome> {
        let target = format!("{}:{}", self.host, self.port);

        let addrs = match with_timeout(timeout, tokio::net::lookup_host(&target)).await {
            Ok(Ok(addrs)) => addrs.collect::<Vec<_>>(),
            Ok(Err(e)) => {
                return vec![ProbeOutcome::failure(&target, format!("dns lookup failed: {e}"))];
            }
            Err(_) => return vec![ProbeOutcome::timeout(&target, timeout)],
        };
        if addrs.is_empty() {
            return vec![ProbeOutcome::failure(&target, "host resolved to no addresses".into())];
        }

        let mut outcomes = Vec::with_capacity(addrs.len());
        for addr in addrs {
            outcomes.push(Self::connect(addr, timeout).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_bad_config() {
        assert!(TcpProbe::from_config(&json!({"host": "example.com"})).is_err());
        assert!(TcpProbe::from_config(&json!({"host": "", "port": 80})).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_port_is_failure() {
        // Port 1 on localhost is practically never listening.
        let probe = TcpProbe { host: "127.0.0.1".to_string(), port: 1 };
        let outcomes = probe.run(Duration::from_secs(2)).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].code, super::super::ProbeCode::Failure);
        assert!(outcomes[0].error.is_some());
    }
}
