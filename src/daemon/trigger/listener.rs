use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::{daemon::event::UnlockEvent, utils::clock::Clock};

use super::UnlockSource;

pub struct UnlockListener {
    next: mpsc::Sender<UnlockEvent>,
    source: Box<dyn UnlockSource>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

impl UnlockListener {
    pub fn new(
        next: mpsc::Sender<UnlockEvent>,
        source: Box<dyn UnlockSource>,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            source,
            shutdown,
            clock,
        }
    }

    fn stamp(&self) -> UnlockEvent {
        UnlockEvent {
            day: self.clock.today(),
            moment: self.clock.time(),
        }
    }

    /// Executes the listener event loop. Returns when the source closes or on shutdown.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let unlocked = tokio::select! {
                // Cancelation means we stop execution of the event loop. Which means we also drop
                // the sender channel and consequently stop processing module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                unlocked = self.source.wait_for_unlock() => unlocked,
            };

            if !unlocked.inspect_err(|e| error!("Unlock source failed {e:?}"))? {
                info!("Unlock source closed");
                return Ok(());
            }

            let event = self.stamp();
            let span = info_span!("Forwarding unlock");
            debug!("Sending message {:?}", event);
            self.next
                .send(event)
                .instrument(span)
                .await
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        }
    }
}
