// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-agent build context directories and their tar packing.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::agent::AgentId;
use crate::infrastructure::wrapper_synthesizer::BuildBundle;

/// A build context materialized on disk at `<workspace>/<agent_id>/`.
#[derive(Debug)]
pub struct BuildContext {
    dir: PathBuf,
}

impl BuildContext {
    /// Write the bundle's files into a fresh directory scoped to `agent_id`.
    /// Leftovers from an earlier attempt are discarded first.
    pub async fn materialize(workspace: &Path, agent_id: &AgentId, bundle: &BuildBundle) -> io::Result<Self> {
        let dir = workspace.join(agent_id.as_str());
        if tokio::fs::try_exists(&dir).await? {
            warn!(agent_id = %agent_id, "Removing stale build context at {:?}", dir);
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;

        let context = Self { dir };
        for (name, contents) in bundle.files() {
            if let Err(e) = tokio::fs::write(context.dir.join(name), contents).await {
                context.remove().await;
                return Err(e);
            }
        }

        debug!(agent_id = %agent_id, "Materialized build context at {:?}", context.dir);
        Ok(context)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Pack the context as an uncompressed tar archive, the format the Docker
    /// build endpoint expects.
    pub async fn archive(&self) -> io::Result<Vec<u8>> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || pack_directory(&dir))
            .await
            .map_err(io::Error::other)?
    }

    /// Delete the directory. Best effort: failures are logged, not returned.
    pub async fn remove(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!("Removed build context {:?}", self.dir),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove build context {:?}: {}", self.dir, e),
        }
    }
}

fn pack_directory(dir: &Path) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        if entry.file_type()?.is_file() {
            builder.append_path_with_name(entry.path(), entry.file_name())?;
        }
    }
    builder.into_inner()
}
