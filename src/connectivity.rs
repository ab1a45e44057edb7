//! Internet reachability probes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// Default time allowed for a probe connection.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Reports whether a network path currently exists.
///
/// Queried fresh on every fetch; implementations should not cache the answer
/// for long.
#[async_trait]
pub trait Connectivity: Send + Sync {
  async fn has_internet(&self) -> bool;
}

/// Probes reachability by opening a TCP connection to a fixed target.
///
/// Any resolution failure, connect error or timeout counts as offline.
#[derive(Debug, Clone)]
pub struct TcpProbe {
  target: String,
  timeout: Duration,
}

impl TcpProbe {
  /// Probe an explicit `host:port` target.
  pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
    Self {
      target: target.into(),
      timeout,
    }
  }

  /// Probe the host and port the given base URL points at.
  ///
  /// Returns `None` for URLs without a host or a known default port.
  pub fn for_url(url: &Url, timeout: Duration) -> Option<Self> {
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(Self::new(format!("{}:{}", host, port), timeout))
  }

  pub fn target(&self) -> &str {
    &self.target
  }
}

#[async_trait]
impl Connectivity for TcpProbe {
  async fn has_internet(&self) -> bool {
    match tokio::time::timeout(self.timeout, TcpStream::connect(self.target.as_str())).await {
      Ok(Ok(_)) => true,
      Ok(Err(e)) => {
        debug!(probe = %self.target, error = %e, "connectivity probe failed");
        false
      }
      Err(_) => {
        debug!(probe = %self.target, "connectivity probe timed out");
        false
      }
    }
  }
}

/// Connectivity with a fixed, switchable answer.
#[derive(Debug)]
pub struct StaticConnectivity {
  online: AtomicBool,
}

impl StaticConnectivity {
  pub fn online() -> Self {
    Self {
      online: AtomicBool::new(true),
    }
  }

  pub fn offline() -> Self {
    Self {
      online: AtomicBool::new(false),
    }
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }
}

#[async_trait]
impl Connectivity for StaticConnectivity {
  async fn has_internet(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }
}
