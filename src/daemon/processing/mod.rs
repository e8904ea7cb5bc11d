use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error};

use super::event::UnlockEvent;

pub mod counting;
pub mod module;

/// Receives unlock events and hands them to a processor one at a time. A failed event is logged
/// and dropped; the next delivery is processed normally.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<UnlockEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<UnlockEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Processing event {:?}", event);
            if let Err(e) = self.processor.process_next(event.clone()).await {
                error!("Error processing event {:?}: {e:?}", event)
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{bail, Result};
    use chrono::{NaiveDate, Utc};
    use tokio::sync::mpsc;

    use crate::daemon::event::UnlockEvent;

    use super::{module::EventProcessor, ProcessingModule};

    /// Fails on the first event and records the rest.
    #[derive(Default)]
    struct FlakyProcessor {
        seen: usize,
        processed: Vec<UnlockEvent>,
        finalized: bool,
    }

    impl EventProcessor for &mut FlakyProcessor {
        async fn process_next(&mut self, message: UnlockEvent) -> Result<()> {
            self.seen += 1;
            if self.seen == 1 {
                bail!("storage unavailable");
            }
            self.processed.push(message);
            Ok(())
        }

        async fn finalize(&mut self) -> Result<()> {
            self.finalized = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_event_does_not_stop_processing() -> Result<()> {
        let (sender, receiver) = mpsc::channel(10);
        let event = UnlockEvent {
            day: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            moment: Utc::now(),
        };
        for _ in 0..3 {
            sender.send(event.clone()).await?;
        }
        drop(sender);

        let mut processor = FlakyProcessor::default();
        ProcessingModule::new(receiver, &mut processor).run().await?;

        assert_eq!(processor.seen, 3);
        assert_eq!(processor.processed.len(), 2);
        assert!(processor.finalized);
        Ok(())
    }
}
