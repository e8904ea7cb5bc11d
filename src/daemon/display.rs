use futures::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::storage::entities::CacheEntry;

/// Stands in for display surfaces: follows cache updates and reports every new count. Returns
/// the last reported entry.
///
/// A change that is already pending when `shutdown` fires is still reported.
pub async fn report_updates(
    mut updates: WatchStream<Option<CacheEntry>>,
    shutdown: CancellationToken,
) -> Option<CacheEntry> {
    let mut reported = None;
    loop {
        let entry = tokio::select! {
            biased;
            entry = updates.next() => entry,
            _ = shutdown.cancelled() => return reported,
        };
        match entry {
            Some(Some(entry)) => {
                info!("Screen unlocks on {}: {}", entry.day, entry.count);
                reported = Some(entry);
            }
            Some(None) => (),
            None => return reported,
        }
    }
}
