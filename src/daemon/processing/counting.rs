use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::{
    counter::UnlockCounter, daemon::event::UnlockEvent, storage::counter_store::CounterStore,
};

use super::module::EventProcessor;

/// Bridges [ProcessingModule](super::ProcessingModule) and [UnlockCounter]. Each delivered event
/// is one increment, duplicates are not filtered.
pub struct CountingProcessor<S: CounterStore> {
    counter: Arc<UnlockCounter<S>>,
}

impl<S: CounterStore> CountingProcessor<S> {
    pub fn new(counter: Arc<UnlockCounter<S>>) -> Self {
        Self { counter }
    }
}

impl<S: CounterStore> EventProcessor for CountingProcessor<S> {
    async fn process_next(&mut self, message: UnlockEvent) -> Result<()> {
        let count = self.counter.record_unlock(message.day).await?;
        info!("Unlock #{count} on {}", message.day);
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        let today = self.counter.today();
        let count = self.counter.get_count(today).await?;
        info!("Stopping with {count} unlocks recorded for {today}");
        Ok(())
    }
}
