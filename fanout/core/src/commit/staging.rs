// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{error, info, warn};

use super::{check_fragment, CommitCoordinator, TEMPORARY_DIR};
use crate::error::{FanoutError, Result};
use crate::router::FragmentId;
use crate::sink::SinkContext;
use crate::store::OutputStore;
use crate::summary::WriteSummary;

/// Commits by renaming staged files into place on the same store.
///
/// A worker stages below `<output_root>/_temporary/<fragment_id>`, so
/// concurrent workers never see each other's partial output.
pub struct StagingCommitter<S: OutputStore> {
    store: Arc<S>,
    output_root: PathBuf,
    fragment: FragmentId,
}

impl<S: OutputStore> Debug for StagingCommitter<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingCommitter")
            .field("output_root", &self.output_root)
            .field("fragment", &self.fragment)
            .finish()
    }
}

impl<S: OutputStore + 'static> StagingCommitter<S> {
    pub fn new(store: Arc<S>, output_root: impl Into<PathBuf>, fragment: FragmentId) -> Self {
        Self {
            store,
            output_root: output_root.into(),
            fragment,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn staging_dir(&self) -> PathBuf {
        self.output_root
            .join(TEMPORARY_DIR)
            .join(self.fragment.as_str())
    }
}

#[async_trait]
impl<S: OutputStore + 'static> CommitCoordinator for StagingCommitter<S> {
    fn context(&self) -> SinkContext {
        SinkContext {
            fragment: self.fragment.clone(),
            output_root: self.output_root.clone(),
            staging_root: self.staging_dir(),
        }
    }

    fn staging_store(&self) -> Arc<dyn OutputStore> {
        self.store.clone()
    }

    async fn commit(&self, summary: &WriteSummary) -> Result<Vec<String>> {
        check_fragment(&self.context(), summary)?;
        let now = Instant::now();

        let store = self.store.clone();
        let output_root = self.output_root.clone();
        let staging = self.staging_dir();
        let files = summary.files.clone();
        let published = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut moved: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
            for file in &files {
                let target = file.path.under(&output_root);
                if let Err(e) = publish(store.as_ref(), &file.staged_location, &target) {
                    roll_back(store.as_ref(), &moved);
                    return Err(e);
                }
                moved.push((target, file.staged_location.clone()));
            }
            store.remove_dir_all(&staging)?;
            Ok(moved
                .iter()
                .map(|(target, _)| target.display().to_string())
                .collect())
        })
        .await??;

        info!(
            "Committed fragment {} to {:?} in {} ms: {}",
            self.fragment,
            self.output_root,
            now.elapsed().as_millis(),
            summary
        );
        Ok(published)
    }

    async fn abort(&self) -> Result<()> {
        let store = self.store.clone();
        let staging = self.staging_dir();
        warn!("Discarding staged output of fragment {}", self.fragment);
        tokio::task::spawn_blocking(move || store.remove_dir_all(&staging)).await??;
        Ok(())
    }
}

fn publish<S: OutputStore>(store: &S, staged: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        store.create_dir_all(parent).map_err(|e| {
            error!("Failed to create output directory at {:?}: {:?}", parent, e);
            FanoutError::StorageWriteFailure(parent.to_path_buf(), e)
        })?;
    }
    store.rename(staged, target).map_err(|e| {
        error!("Failed to move {:?} to {:?}: {:?}", staged, target, e);
        FanoutError::StorageWriteFailure(target.to_path_buf(), e)
    })
}

/// Move already published files back into the staging area, newest first.
fn roll_back<S: OutputStore>(store: &S, moved: &[(PathBuf, PathBuf)]) {
    for (target, staged) in moved.iter().rev() {
        if let Err(e) = store.rename(target, staged) {
            warn!(
                "Failed to withdraw partially committed {:?} back to {:?}: {:?}",
                target, staged, e
            );
        }
    }
}
