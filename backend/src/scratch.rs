//! Scratch directory lifecycle.
//!
//! The directory is created once at startup. Each request owns a [`JobFile`]
//! whose output, and anything the downloader left next to it, is removed
//! when the guard goes out of scope.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tracing::{info, warn};
use uuid::Uuid;

pub async fn ensure_scratch_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    info!("Scratch directory {:?} ready.", dir);
    Ok(())
}

/// Per-request output file. Dropping it deletes `<id>.<format>` and the
/// side files the downloader writes next to it (`.part`, `.ytdl`, `.temp`).
/// Unmerged `<id>.fNNN.*` streams from a killed process are left to
/// [`sweep_stale_files`].
#[derive(Debug)]
pub struct JobFile {
    id: Uuid,
    format: String,
    filename: String,
    path: PathBuf,
}

impl JobFile {
    pub fn new(scratch_dir: &Path, format: &str) -> Self {
        let id = Uuid::new_v4();
        let filename = format!("{id}.{format}");
        let path = scratch_dir.join(&filename);
        Self {
            id,
            format: format.to_string(),
            filename,
            path,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn side_files(&self) -> [PathBuf; 4] {
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        [
            dir.join(format!("{}.part", self.filename)),
            dir.join(format!("{}.ytdl", self.filename)),
            dir.join(format!("{}.temp.{}", self.id, self.format)),
            dir.join(format!("{}.part", self.id)),
        ]
    }
}

impl Drop for JobFile {
    fn drop(&mut self) {
        remove_quietly(&self.path);
        for side_file in self.side_files() {
            remove_quietly(&side_file);
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed temporary file {:?}.", path),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => warn!("Could not remove temporary file {:?}: {error}", path),
    }
}

/// True for names this service writes: `<uuid>.<anything>`.
fn is_job_artifact(name: &str) -> bool {
    name.split_once('.')
        .is_some_and(|(stem, rest)| !rest.is_empty() && Uuid::parse_str(stem).is_ok())
}

/// Removes job files older than `older_than_secs` left by a previous
/// process. Entries not named `<uuid>.*` are never touched. A threshold of
/// zero disables the sweep.
pub async fn sweep_stale_files(scratch_dir: &Path, older_than_secs: u64) -> usize {
    if older_than_secs == 0 {
        return 0;
    }

    let mut entries = match tokio::fs::read_dir(scratch_dir).await {
        Ok(entries) => entries,
        Err(error) => {
            if error.kind() != ErrorKind::NotFound {
                warn!("Could not open scratch directory for sweeping: {error}");
            }
            return 0;
        }
    };

    let max_age = Duration::from_secs(older_than_secs);
    let now = SystemTime::now();
    let mut removed = 0;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(error) => {
                warn!("Could not iterate scratch directory for sweeping: {error}");
                break;
            }
        };

        let owned = entry.file_name().to_str().is_some_and(is_job_artifact);
        if !owned {
            continue;
        }

        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!("Could not read metadata of {:?}: {error}", path);
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => warn!("Could not remove stale file {:?}: {error}", path),
        }
    }

    if removed > 0 {
        info!("Swept {removed} stale file(s) from {:?}.", scratch_dir);
    }
    removed
}
