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

//! Fanout error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    io,
    path::PathBuf,
    result,
};

use futures::future::Aborted;

/// Result type alias for Fanout operations.
pub type Result<T> = result::Result<T, FanoutError>;

/// Errors raised while routing and writing partitioned output.
#[derive(Debug)]
pub enum FanoutError {
    /// Key cannot be embedded as a path segment: (key, reason).
    InvalidKey(String, String),
    /// Opening, appending to or flushing an output stream failed.
    StorageWriteFailure(PathBuf, io::Error),
    /// The worker tried to hold more open streams than the configured limit.
    ResourceExhaustion(usize),
    /// Configuration error with invalid settings.
    Configuration(String),
    /// General error with a descriptive message.
    General(String),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
    /// I/O error not tied to a single output stream.
    IoError(io::Error),
    /// Error from the object store used to publish output.
    ObjectStoreError(Box<object_store::Error>),
    /// Tokio task join error.
    TokioError(tokio::task::JoinError),
    /// A record was emitted after the sink was closed or aborted.
    SinkClosed,
    /// Operation was cancelled.
    Cancelled,
}

impl FanoutError {
    /// Whether re-running the whole worker may succeed.
    ///
    /// Only storage and I/O failures are considered transient; a bad key or
    /// a resource ceiling will fail again on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FanoutError::StorageWriteFailure(_, _)
                | FanoutError::IoError(_)
                | FanoutError::ObjectStoreError(_)
        )
    }
}

impl From<io::Error> for FanoutError {
    fn from(e: io::Error) -> Self {
        FanoutError::IoError(e)
    }
}

impl From<object_store::Error> for FanoutError {
    fn from(e: object_store::Error) -> Self {
        FanoutError::ObjectStoreError(Box::new(e))
    }
}

impl From<tokio::task::JoinError> for FanoutError {
    fn from(e: tokio::task::JoinError) -> Self {
        FanoutError::TokioError(e)
    }
}

impl From<Aborted> for FanoutError {
    fn from(_: Aborted) -> Self {
        FanoutError::Cancelled
    }
}

impl Display for FanoutError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FanoutError::InvalidKey(key, reason) => {
                write!(f, "Invalid key '{key}': {reason}")
            }
            FanoutError::StorageWriteFailure(path, desc) => {
                write!(
                    f,
                    "Storage write failure at {}: {desc}",
                    path.display()
                )
            }
            FanoutError::ResourceExhaustion(limit) => {
                write!(
                    f,
                    "Resource exhaustion: worker already holds the maximum of {limit} open streams"
                )
            }
            FanoutError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            FanoutError::General(desc) => write!(f, "General error: {desc}"),
            FanoutError::Internal(desc) => {
                write!(f, "Internal Fanout error: {desc}")
            }
            FanoutError::IoError(desc) => write!(f, "IO error: {desc}"),
            FanoutError::ObjectStoreError(desc) => {
                write!(f, "Object store error: {desc}")
            }
            FanoutError::TokioError(desc) => write!(f, "Tokio join error: {desc}"),
            FanoutError::SinkClosed => write!(f, "Record sink is already closed"),
            FanoutError::Cancelled => write!(f, "Task cancelled"),
        }
    }
}

impl Error for FanoutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FanoutError::StorageWriteFailure(_, e) | FanoutError::IoError(e) => Some(e),
            FanoutError::ObjectStoreError(e) => Some(e.as_ref()),
            FanoutError::TokioError(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure report handed back to the host engine for a failed worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub error: String,
    /// Whether the host may re-run the worker from scratch.
    pub retryable: bool,
    /// Whether the failure counts against the task's attempt budget.
    pub count_to_failures: bool,
}

impl From<FanoutError> for TaskFailure {
    fn from(e: FanoutError) -> Self {
        match e {
            FanoutError::Cancelled => TaskFailure {
                error: "Task cancelled".to_owned(),
                retryable: false,
                // cancellation is requested by the host, not a task fault
                count_to_failures: false,
            },
            e if e.is_retryable() => TaskFailure {
                error: format!("Task failed due to Fanout IO error: {e}"),
                retryable: true,
                count_to_failures: true,
            },
            other => TaskFailure {
                error: format!("Task failed due to output error: {other}"),
                retryable: false,
                count_to_failures: false,
            },
        }
    }
}
