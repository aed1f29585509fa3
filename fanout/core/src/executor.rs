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

//! Drives worker invocations: feeds a record stream through a sink and hands
//! the result to the commit coordinator.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::AbortHandle;
use futures::{Stream, StreamExt};
use log::{info, warn};

use crate::commit::CommitCoordinator;
use crate::config::FanoutConfig;
use crate::error::Result;
use crate::router::OutputRouter;
use crate::sink::RecordSink;
use crate::summary::WriteSummary;

type AbortHandles = Arc<DashMap<usize, AbortHandle>>;

/// Result of a committed worker invocation
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub summary: WriteSummary,
    /// Locations the files were published to
    pub published: Vec<String>,
}

/// Runs worker invocations and keeps track of the ones in flight.
#[derive(Debug, Clone)]
pub struct OutputExecutor {
    router: Arc<dyn OutputRouter>,
    config: FanoutConfig,
    /// Handles to abort executing tasks
    abort_handles: AbortHandles,
}

impl OutputExecutor {
    pub fn new(router: Arc<dyn OutputRouter>, config: FanoutConfig) -> Self {
        Self {
            router,
            config,
            abort_handles: Default::default(),
        }
    }

    /// Write every record of `records` and commit the output.
    ///
    /// If the stream yields an error, a record is rejected, the sink fails to
    /// close, or the task is cancelled, the staged output is discarded and
    /// the error returned.
    pub async fn execute_output_task<S>(
        &self,
        task_id: usize,
        records: S,
        committer: Arc<dyn CommitCoordinator>,
    ) -> Result<TaskOutput>
    where
        S: Stream<Item = Result<(String, String)>> + Send,
    {
        let ctx = committer.context();
        info!(
            "Executing task {} for fragment {} into {:?}",
            task_id, ctx.fragment, ctx.output_root
        );
        let sink = RecordSink::with_context(
            &ctx,
            self.router.clone(),
            committer.staging_store(),
            &self.config,
        );

        let (task, abort_handle) = futures::future::abortable(write_records(sink, records));
        self.abort_handles.insert(task_id, abort_handle);
        let res = task.await;
        self.abort_handles.remove(&task_id);

        let res = match res {
            Ok(Ok(summary)) => committer
                .commit(&summary)
                .await
                .map(|published| TaskOutput { summary, published }),
            Ok(Err(e)) => Err(e),
            Err(aborted) => Err(aborted.into()),
        };

        if let Err(e) = &res {
            warn!("Task {} failed: {}", task_id, e);
            if let Err(abort_err) = committer.abort().await {
                warn!(
                    "Failed to discard staged output of task {}: {}",
                    task_id, abort_err
                );
            }
        }
        res
    }

    pub async fn cancel_task(&self, task_id: usize) -> Result<bool> {
        if let Some((_, handle)) = self.abort_handles.remove(&task_id) {
            handle.abort();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn active_task_count(&self) -> usize {
        self.abort_handles.len()
    }

    pub fn router(&self) -> &Arc<dyn OutputRouter> {
        &self.router
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }
}

async fn write_records<S>(mut sink: RecordSink, records: S) -> Result<WriteSummary>
where
    S: Stream<Item = Result<(String, String)>>,
{
    futures::pin_mut!(records);
    while let Some(record) = records.next().await {
        let res = record.and_then(|(key, value)| sink.emit(&key, &value));
        if let Err(e) = res {
            sink.abort();
            return Err(e);
        }
    }
    sink.close()
}
