use anyhow::Result;
use async_trait::async_trait;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

use super::UnlockSource;

/// Treats every delivery of a Unix signal as one unlock. Session hooks (a PAM module, a logind
/// `Unlock` handler, a screen locker's post-unlock command) are expected to run
/// `kill -USR1 <daemon pid>`.
pub struct SignalSource {
    signal: Signal,
}

impl SignalSource {
    pub fn new(kind: SignalKind) -> Result<Self> {
        Ok(Self {
            signal: signal(kind)?,
        })
    }

    pub fn user_defined1() -> Result<Self> {
        Self::new(SignalKind::user_defined1())
    }
}

#[async_trait]
impl UnlockSource for SignalSource {
    async fn wait_for_unlock(&mut self) -> Result<bool> {
        let received = self.signal.recv().await.is_some();
        debug!("Unlock signal received: {received}");
        Ok(received)
    }
}
