use std::{io::ErrorKind, path::Path};

use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{self, AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

/// Reads the whole file while holding a shared lock. Returns `None` if the file doesn't exist yet.
pub async fn read_locked(path: &Path) -> Result<Option<Vec<u8>>, io::Error> {
    debug!("Reading {path:?}");
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    file.lock_shared()?;
    let mut buffer = Vec::new();
    let result = file.read_to_end(&mut buffer).await;
    file.unlock_async().await?;
    result?;

    Ok(Some(buffer))
}

/// Replaces file contents while holding an exclusive lock, so readers never observe a half
/// written file from another process that respects the lock.
pub async fn write_locked(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    debug!("Writing {} bytes into {path:?}", contents.len());
    // Truncation has to wait until the lock is held.
    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await?;

    file.lock_exclusive()?;
    let result = overwrite(&mut file, contents).await;
    file.unlock_async().await?;
    result
}

async fn overwrite(file: &mut File, contents: &[u8]) -> Result<(), io::Error> {
    file.set_len(0).await?;
    file.rewind().await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_data().await
}
