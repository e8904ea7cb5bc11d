use std::{path::Path, sync::Arc};

use anyhow::Result;
use processing::{counting::CountingProcessor, ProcessingModule};
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use trigger::{default_source, listener::UnlockListener, UnlockSource};

use crate::{
    counter::UnlockCounter,
    storage::{
        counter_store::{CounterStore, SqliteCounterStore},
        entities::CacheEntry,
        fast_cache::FastCache,
    },
    utils::clock::{Clock, DefaultClock},
};

use event::UnlockEvent;

pub mod args;
pub mod display;
pub mod event;
pub mod processing;
pub mod shutdown;
pub mod trigger;

pub const DATABASE_FILE: &str = "unlocks.sqlite3";
pub const CACHE_FILE: &str = "cache.json";

/// Unlocks arrive at human speed, a small buffer is plenty.
const EVENT_BUFFER: usize = 16;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: &Path) -> Result<()> {
    let counter = Arc::new(open_counter(dir, DefaultClock).await?);

    let today = counter.today();
    match counter.warm_cache(today).await {
        Ok(count) => info!("Starting with {} unlocks for {today}", count.unwrap_or(0)),
        Err(e) => error!("Couldn't read today's count {e:?}"),
    }

    let (sender, receiver) = mpsc::channel::<UnlockEvent>(EVENT_BUFFER);
    let shutdown_token = CancellationToken::new();

    let listener = create_listener(sender, default_source()?, &shutdown_token, DefaultClock);
    let processor = create_processor(receiver, counter.clone());

    let (_, (listener_result, processing_result, _)) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        drive_pipeline(
            listener,
            processor,
            counter.cache().updates(),
            &shutdown_token,
        ),
    );

    if let Err(listener_result) = listener_result {
        error!("Unlock listener got an error {:?}", listener_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    Ok(())
}

/// Opens the store and the cache kept in `dir`.
pub async fn open_counter(
    dir: &Path,
    clock: impl Clock,
) -> Result<UnlockCounter<SqliteCounterStore>> {
    let store = SqliteCounterStore::open(&dir.join(DATABASE_FILE))?;
    let cache = FastCache::open(dir.join(CACHE_FILE)).await;
    Ok(UnlockCounter::new(store, cache, Box::new(clock)))
}

/// Runs the listener, the processor and the update reporter. The reporter keeps going until the
/// processor has handled every queued unlock.
async fn drive_pipeline<S: CounterStore>(
    listener: UnlockListener,
    processor: ProcessingModule<CountingProcessor<S>>,
    updates: WatchStream<Option<CacheEntry>>,
    shutdown_token: &CancellationToken,
) -> (Result<()>, Result<()>, Option<CacheEntry>) {
    let display_token = CancellationToken::new();
    tokio::join!(
        async {
            let result = listener.run().await;
            // Without a listener there is nothing left to wait for.
            shutdown_token.cancel();
            result
        },
        async {
            let result = processor.run().await;
            display_token.cancel();
            result
        },
        display::report_updates(updates, display_token.clone()),
    )
}

fn create_listener(
    sender: mpsc::Sender<UnlockEvent>,
    source: Box<dyn UnlockSource>,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> UnlockListener {
    UnlockListener::new(sender, source, shutdown_token.clone(), Box::new(clock))
}

fn create_processor<S: CounterStore>(
    receiver: mpsc::Receiver<UnlockEvent>,
    counter: Arc<UnlockCounter<S>>,
) -> ProcessingModule<CountingProcessor<S>> {
    ProcessingModule::new(receiver, CountingProcessor::new(counter))
}
