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

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};

use super::{check_fragment, CommitCoordinator, TEMPORARY_DIR};
use crate::error::{FanoutError, Result};
use crate::router::{FragmentId, OutputPath};
use crate::sink::SinkContext;
use crate::store::OutputStore;
use crate::summary::WriteSummary;

/// Stages output on a local store and publishes it by uploading every file
/// to an object store below a prefix.
#[derive(Debug)]
pub struct ObjectStoreCommitter {
    staging: Arc<dyn OutputStore>,
    work_dir: PathBuf,
    object_store: Arc<dyn ObjectStore>,
    prefix: ObjectPath,
    fragment: FragmentId,
}

impl ObjectStoreCommitter {
    pub fn new(
        staging: Arc<dyn OutputStore>,
        work_dir: impl Into<PathBuf>,
        object_store: Arc<dyn ObjectStore>,
        prefix: ObjectPath,
        fragment: FragmentId,
    ) -> Self {
        Self {
            staging,
            work_dir: work_dir.into(),
            object_store,
            prefix,
            fragment,
        }
    }

    fn staging_dir(&self) -> PathBuf {
        self.work_dir
            .join(TEMPORARY_DIR)
            .join(self.fragment.as_str())
    }

    /// Object location for an output path
    pub fn location(&self, path: &OutputPath) -> ObjectPath {
        path.relative()
            .iter()
            .fold(self.prefix.clone(), |loc, part| {
                loc.child(&*part.to_string_lossy())
            })
    }

    async fn remove_staging(&self) -> Result<()> {
        let staging = self.staging.clone();
        let dir = self.staging_dir();
        tokio::task::spawn_blocking(move || staging.remove_dir_all(&dir)).await??;
        Ok(())
    }

    async fn upload_all(&self, summary: &WriteSummary) -> Result<Vec<ObjectPath>> {
        let mut uploaded = Vec::with_capacity(summary.files.len());
        for file in &summary.files {
            let location = self.location(&file.path);
            let staging = self.staging.clone();
            let staged = file.staged_location.clone();
            let res = async {
                let data = tokio::task::spawn_blocking(move || staging.read(&staged))
                    .await?
                    .map_err(|e| {
                        error!("Failed to read staged file at {:?}: {:?}", file.staged_location, e);
                        FanoutError::StorageWriteFailure(file.staged_location.clone(), e)
                    })?;
                debug!("Uploading {} bytes to {}", data.len(), location);
                self.object_store
                    .put(&location, PutPayload::from(data))
                    .await?;
                Ok::<_, FanoutError>(())
            }
            .await;

            if let Err(e) = res {
                error!("Failed to publish {}: {:?}", location, e);
                self.delete_uploaded(&uploaded).await;
                return Err(e);
            }
            uploaded.push(location);
        }
        Ok(uploaded)
    }

    async fn delete_uploaded(&self, uploaded: &[ObjectPath]) {
        for location in uploaded {
            if let Err(e) = self.object_store.delete(location).await {
                warn!("Failed to delete partially published {}: {:?}", location, e);
            }
        }
    }
}

#[async_trait]
impl CommitCoordinator for ObjectStoreCommitter {
    fn context(&self) -> SinkContext {
        SinkContext {
            fragment: self.fragment.clone(),
            output_root: PathBuf::from(self.prefix.to_string()),
            staging_root: self.staging_dir(),
        }
    }

    fn staging_store(&self) -> Arc<dyn OutputStore> {
        self.staging.clone()
    }

    async fn commit(&self, summary: &WriteSummary) -> Result<Vec<String>> {
        check_fragment(&self.context(), summary)?;
        let now = Instant::now();

        let uploaded = self.upload_all(summary).await?;
        self.remove_staging().await?;

        info!(
            "Published fragment {} to {} in {} ms: {}",
            self.fragment,
            self.prefix,
            now.elapsed().as_millis(),
            summary
        );
        Ok(uploaded.iter().map(|p| p.to_string()).collect())
    }

    async fn abort(&self) -> Result<()> {
        warn!("Discarding staged output of fragment {}", self.fragment);
        self.remove_staging().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FanoutConfig;
    use crate::router::KeyDirectoryRouter;
    use crate::sink::RecordSink;
    use crate::store::InMemoryStore;
    use object_store::memory::InMemory;

    fn committer(staging: &InMemoryStore, remote: Arc<InMemory>) -> ObjectStoreCommitter {
        ObjectStoreCommitter::new(
            Arc::new(staging.clone()),
            "/work",
            remote,
            ObjectPath::from("warehouse/events"),
            FragmentId::new("10.0.0.7_4242").unwrap(),
        )
    }

    #[tokio::test]
    async fn commit_uploads_staged_files() -> Result<()> {
        let staging = InMemoryStore::new();
        let remote = Arc::new(InMemory::new());
        let committer = committer(&staging, remote.clone());

        let mut sink = RecordSink::with_context(
            &committer.context(),
            Arc::new(KeyDirectoryRouter::default()),
            committer.staging_store(),
            &FanoutConfig::default(),
        );
        sink.emit("root/us", "1")?;
        sink.emit("root/eu", "2")?;
        sink.emit("root/us", "3")?;
        let summary = sink.close()?;

        let published = committer.commit(&summary).await?;
        assert_eq!(
            vec![
                "warehouse/events/root/eu/10.0.0.7_4242".to_string(),
                "warehouse/events/root/us/10.0.0.7_4242".to_string(),
            ],
            published
        );

        let us = remote
            .get(&ObjectPath::from("warehouse/events/root/us/10.0.0.7_4242"))
            .await?
            .bytes()
            .await?;
        assert_eq!(&b"1\n3\n"[..], &us[..]);
        assert!(staging.files().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn abort_uploads_nothing() -> Result<()> {
        let staging = InMemoryStore::new();
        let remote = Arc::new(InMemory::new());
        let committer = committer(&staging, remote.clone());

        let mut sink = RecordSink::with_context(
            &committer.context(),
            Arc::new(KeyDirectoryRouter::default()),
            committer.staging_store(),
            &FanoutConfig::default(),
        );
        sink.emit("a", "1")?;
        sink.abort();
        committer.abort().await?;

        assert!(staging.files().is_empty());
        assert!(remote
            .head(&ObjectPath::from("warehouse/events/a/10.0.0.7_4242"))
            .await
            .is_err());
        Ok(())
    }
}
