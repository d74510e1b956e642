//! Network reachability race
//!
//! A probe against the network's endpoint races a fixed timer. Whichever
//! settles first decides the result; a probe that loses is dropped.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Network;

/// How long a probe may take before the network is reported as unknown
pub const REACHABILITY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Outcome of a reachability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    /// The probe got an answer
    Reachable,
    /// The probe failed
    Unreachable,
    /// The timer won the race
    Unknown,
}

impl NetworkStatus {
    /// `Some(true)`, `Some(false)` or `None` for unknown
    pub fn as_option(self) -> Option<bool> {
        match self {
            NetworkStatus::Reachable => Some(true),
            NetworkStatus::Unreachable => Some(false),
            NetworkStatus::Unknown => None,
        }
    }
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkStatus::Reachable => write!(f, "reachable"),
            NetworkStatus::Unreachable => write!(f, "unreachable"),
            NetworkStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Live request used to decide whether a network answers
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn probe(&self, network: &Network) -> bool;
}

/// Race `probe` against a timer of `within`
pub async fn race<F>(probe: F, within: Duration) -> NetworkStatus
where
    F: Future<Output = bool>,
{
    match tokio::time::timeout(within, probe).await {
        Ok(true) => NetworkStatus::Reachable,
        Ok(false) => NetworkStatus::Unreachable,
        Err(_) => {
            debug!("Reachability probe lost the race after {:?}", within);
            NetworkStatus::Unknown
        }
    }
}

/// Probe that issues a GET against `fullhost + path`; any HTTP answer counts
pub struct HttpProbe {
    client: reqwest::Client,
    path: String,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, path: &str) -> Self {
        Self {
            client,
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl NetworkProbe for HttpProbe {
    async fn probe(&self, network: &Network) -> bool {
        let url = format!("{}{}", network.fullhost(), self.path);
        match self.client.get(&url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_probe_answer_wins() {
        assert_eq!(race(async { true }, REACHABILITY_TIMEOUT).await, NetworkStatus::Reachable);
        assert_eq!(race(async { false }, REACHABILITY_TIMEOUT).await, NetworkStatus::Unreachable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let started = Instant::now();
        let status = race(std::future::pending::<bool>(), REACHABILITY_TIMEOUT).await;

        assert_eq!(status, NetworkStatus::Unknown);
        assert_eq!(status.as_option(), None);
        assert!(started.elapsed() >= REACHABILITY_TIMEOUT);
        assert!(started.elapsed() < REACHABILITY_TIMEOUT + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_result_is_ignored() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            true
        };
        assert_eq!(race(slow, REACHABILITY_TIMEOUT).await, NetworkStatus::Unknown);
    }

    #[test]
    fn test_status_as_option() {
        assert_eq!(NetworkStatus::Reachable.as_option(), Some(true));
        assert_eq!(NetworkStatus::Unreachable.as_option(), Some(false));
    }
}
