//! Staged multi-file commits for one doc directory.
//!
//! A commit writes every blob to `<name>.staged` and fsyncs it, then
//! publishes a journal naming the pending renames, applies the renames and
//! removes the journal. The journal itself is published with a rename, so it
//! is either absent or complete.
//!
//! [`recover`] runs before every load and save: a journal left by an
//! interrupted commit is rolled forward, and staged files with no journal
//! (a commit that died before publishing) are discarded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{StoreError, StoreResult};

pub const JOURNAL_FILE: &str = ".save-journal.json";
pub const STAGED_SUFFIX: &str = ".staged";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PendingRename {
    pub staged: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Journal {
    pub renames: Vec<PendingRename>,
}

/// Render a blob the way it is stored: 2-space pretty JSON.
pub(crate) fn render<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_synced(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(StoreError::io(path))?;
    file.write_all(bytes).await.map_err(StoreError::io(path))?;
    file.sync_all().await.map_err(StoreError::io(path))?;
    Ok(())
}

async fn sync_dir(dir: &Path) -> StoreResult<()> {
    #[cfg(unix)]
    {
        let handle = tokio::fs::File::open(dir)
            .await
            .map_err(StoreError::io(dir))?;
        handle.sync_all().await.map_err(StoreError::io(dir))?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> StoreResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

/// Stage every blob and publish the journal, without applying it.
pub(crate) async fn prepare(dir: &Path, blobs: &[(&str, Value)]) -> StoreResult<Journal> {
    let mut journal = Journal::default();
    let mut staged_paths: Vec<PathBuf> = Vec::with_capacity(blobs.len());

    let staged = async {
        for (target, value) in blobs {
            let staged_name = format!("{target}{STAGED_SUFFIX}");
            let staged_path = dir.join(&staged_name);
            let bytes = render(&dir.join(target), value)?;
            staged_paths.push(staged_path.clone());
            write_synced(&staged_path, &bytes).await?;
            journal.renames.push(PendingRename {
                staged: staged_name,
                target: (*target).to_string(),
            });
        }

        let journal_path = dir.join(JOURNAL_FILE);
        let tmp_path = dir.join(format!("{JOURNAL_FILE}.tmp"));
        let bytes = render(&journal_path, &journal)?;
        write_synced(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &journal_path)
            .await
            .map_err(StoreError::io(&journal_path))?;
        sync_dir(dir).await
    }
    .await;

    if let Err(err) = staged {
        for path in &staged_paths {
            let _ = remove_if_present(path).await;
        }
        let _ = remove_if_present(&dir.join(format!("{JOURNAL_FILE}.tmp"))).await;
        return Err(err);
    }
    Ok(journal)
}

/// Apply a published journal. Renames whose staged file is already gone
/// were applied by an earlier attempt and are skipped.
pub(crate) async fn apply(dir: &Path, journal: &Journal) -> StoreResult<()> {
    for rename in &journal.renames {
        let staged = dir.join(&rename.staged);
        let target = dir.join(&rename.target);
        match tokio::fs::rename(&staged, &target).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(file = %rename.target, "Staged file already applied");
            }
            Err(err) => {
                return Err(StoreError::Io {
                    path: target,
                    source: err,
                })
            }
        }
    }
    sync_dir(dir).await?;
    remove_if_present(&dir.join(JOURNAL_FILE)).await?;
    sync_dir(dir).await
}

/// Write `blobs` into `dir` as one unit.
pub(crate) async fn commit(dir: &Path, blobs: &[(&str, Value)]) -> StoreResult<()> {
    let journal = prepare(dir, blobs).await?;
    apply(dir, &journal).await
}

/// Finish or discard whatever an interrupted commit left behind.
///
/// Returns `true` when a journal was rolled forward.
pub(crate) async fn recover(dir: &Path) -> StoreResult<bool> {
    let journal_path = dir.join(JOURNAL_FILE);
    let rolled_forward = match tokio::fs::read(&journal_path).await {
        Ok(bytes) => {
            let journal: Journal =
                serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
                    path: journal_path.clone(),
                    source,
                })?;
            tracing::warn!(
                dir = %dir.display(),
                files = journal.renames.len(),
                "Rolling forward interrupted native doc save",
            );
            apply(dir, &journal).await?;
            true
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => {
            return Err(StoreError::Io {
                path: journal_path,
                source: err,
            })
        }
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(StoreError::io(dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(StoreError::io(dir))? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(STAGED_SUFFIX) || name == format!("{JOURNAL_FILE}.tmp") {
            tracing::warn!(file = %name, "Discarding orphaned staged file");
            remove_if_present(&entry.path()).await?;
        }
    }

    Ok(rolled_forward)
}
