use anyhow::Result;

use crate::daemon::event::UnlockEvent;

/// Represents an event processor. Abstracts over what happens with a delivered unlock.
pub trait EventProcessor {
    fn process_next(
        &mut self,
        message: UnlockEvent,
    ) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
