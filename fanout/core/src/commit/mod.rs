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

//! Commit coordination: output of a worker is written to a staging area and
//! only becomes visible under the output root once the worker succeeded.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{FanoutError, Result};
use crate::sink::SinkContext;
use crate::store::OutputStore;
use crate::summary::WriteSummary;

mod remote;
mod staging;

pub use remote::ObjectStoreCommitter;
pub use staging::StagingCommitter;

/// Directory below the output root holding uncommitted worker output
pub const TEMPORARY_DIR: &str = "_temporary";

/// Publishes the output of one worker invocation on success, or discards it.
#[async_trait]
pub trait CommitCoordinator: Debug + Send + Sync {
    /// Fragment id and locations for the worker
    fn context(&self) -> SinkContext;

    /// Store the worker writes its staged output to
    fn staging_store(&self) -> Arc<dyn OutputStore>;

    fn stage_root(&self) -> PathBuf {
        self.context().staging_root
    }

    /// Make every file in `summary` visible under the output root and
    /// return the published locations.
    async fn commit(&self, summary: &WriteSummary) -> Result<Vec<String>>;

    /// Discard everything staged by the worker.
    async fn abort(&self) -> Result<()>;
}

pub(crate) fn check_fragment(ctx: &SinkContext, summary: &WriteSummary) -> Result<()> {
    match &summary.fragment {
        Some(fragment) if fragment != &ctx.fragment => Err(FanoutError::Internal(format!(
            "Cannot commit output of fragment {} through the committer of fragment {}",
            fragment, ctx.fragment
        ))),
        _ => Ok(()),
    }
}
