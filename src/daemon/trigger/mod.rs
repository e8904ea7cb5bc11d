//! Contains logic for receiving unlock triggers from the environment.
//! [UnlockSource] is the contract platform integrations implement, [listener::UnlockListener]
//! turns what they report into [UnlockEvent](super::event::UnlockEvent)s.

pub mod listener;
#[cfg(unix)]
pub mod signal;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Platform integration that reports screen unlocks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UnlockSource: Send {
    /// Waits for the next unlock. Returns `false` once the source is closed and won't report
    /// anything anymore.
    async fn wait_for_unlock(&mut self) -> Result<bool>;
}

/// Source that never reports anything. Used where no unlock integration exists.
pub struct SilentSource;

#[async_trait]
impl UnlockSource for SilentSource {
    async fn wait_for_unlock(&mut self) -> Result<bool> {
        std::future::pending::<()>().await;
        Ok(false)
    }
}

/// Picks the unlock source for the current platform.
pub fn default_source() -> Result<Box<dyn UnlockSource>> {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            Ok(Box::new(signal::SignalSource::user_defined1()?))
        } else {
            tracing::warn!("No unlock source is available on this platform, counts won't change");
            Ok(Box::new(SilentSource))
        }
    }
}
