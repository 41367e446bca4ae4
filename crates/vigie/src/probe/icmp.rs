use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Probe, ProbeOutcome};
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IcmpConfig {
    host: String,
}

/// ICMP ping probe (placeholder - raw sockets require elevated
/// privileges).
pub struct IcmpProbe {
    host: String,
}

impl IcmpProbe {
    pub fn from_config(raw: &serde_json::Value) -> Result<Arc<dyn Probe>, ConfigError> {
        let config: IcmpConfig =
            serde_json::from_value(raw.clone()).map_err(|e| ConfigError::ProbeConfig {
                probe: "icmp".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(Self { host: config.host }))
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    fn name(&self) -> &'static str {
        "icmp"
    }

    async fn run(&self, _timeout: Duration) -> Vec<ProbeOutcome> {
        // TODO: Implement proper ICMP ping using surge-ping or similar crate
        vec![ProbeOutcome::error(
            self.host.clone(),
            "ICMP checks are not yet implemented; use HTTP or TCP instead".to_string(),
        )]
    }
}
