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

//! Open output streams of a single worker, keyed by resolved path.

use std::collections::HashMap;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error};

use crate::error::{FanoutError, Result};
use crate::router::OutputPath;
use crate::store::OutputStore;
use crate::summary::WrittenFile;

/// One open append-only output stream.
pub struct StreamHandle {
    path: OutputPath,
    location: PathBuf,
    writer: Option<BufWriter<Box<dyn Write + Send>>>,
    num_records: u64,
    num_bytes: u64,
    failed: bool,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("location", &self.location)
            .field("num_records", &self.num_records)
            .field("num_bytes", &self.num_bytes)
            .field("failed", &self.failed)
            .finish()
    }
}

impl StreamHandle {
    /// Create the key directory under `root` and open the file for `path`.
    pub(crate) fn open(
        store: &dyn OutputStore,
        root: &Path,
        path: &OutputPath,
        buffer_size: usize,
    ) -> Result<Self> {
        let dir = root.join(path.key_dir());
        debug!("Creating dir {:?}", dir);
        store.create_dir_all(&dir).map_err(|e| {
            error!("Failed to create output directory at {:?}: {:?}", dir, e);
            FanoutError::StorageWriteFailure(dir.clone(), e)
        })?;

        let location = path.under(root);
        debug!("Writing results to {:?}", location);
        let file = store
            .open_append(&location)
            .map_err(|e| FanoutError::StorageWriteFailure(location.clone(), e))?;

        Ok(Self {
            path: path.clone(),
            location,
            writer: Some(BufWriter::with_capacity(buffer_size, file)),
            num_records: 0,
            num_bytes: 0,
            failed: false,
        })
    }

    pub fn path(&self) -> &OutputPath {
        &self.path
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Append one encoded record.
    ///
    /// After the first failure the handle refuses further writes, so a file
    /// never continues after a torn record.
    pub fn append(&mut self, record: &[u8]) -> Result<()> {
        if self.failed {
            return Err(self.failure("stream failed on an earlier write"));
        }
        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => return Err(self.failure("stream is already closed")),
        };
        if let Err(e) = writer.write_all(record) {
            error!("Failed to append to output file at {:?}: {:?}", self.location, e);
            self.failed = true;
            return Err(FanoutError::StorageWriteFailure(self.location.clone(), e));
        }
        self.num_records += 1;
        self.num_bytes += record.len() as u64;
        Ok(())
    }

    /// Flush and close the stream, reporting what it wrote.
    pub(crate) fn finish(&mut self) -> Result<WrittenFile> {
        if self.failed {
            self.discard();
            return Err(self.failure("stream failed on an earlier write"));
        }
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                error!("Failed to flush output file at {:?}: {:?}", self.location, e);
                self.failed = true;
                // the inner writer is dropped without another flush attempt
                let _ = writer.into_parts();
                return Err(FanoutError::StorageWriteFailure(self.location.clone(), e));
            }
        }
        Ok(WrittenFile {
            key: self.path.key().to_owned(),
            path: self.path.clone(),
            staged_location: self.location.clone(),
            num_records: self.num_records,
            num_bytes: self.num_bytes,
        })
    }

    /// Release the stream without flushing buffered bytes.
    pub(crate) fn discard(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.into_parts();
        }
    }

    fn failure(&self, reason: &str) -> FanoutError {
        FanoutError::StorageWriteFailure(
            self.location.clone(),
            io::Error::new(io::ErrorKind::Other, reason.to_owned()),
        )
    }
}

/// Handles released by [StreamCache::close_all]: what was written, and the
/// first failure if any handle could not be flushed.
pub(crate) type CloseOutcome = (Vec<WrittenFile>, Option<FanoutError>);

/// Streams opened by one worker invocation.
///
/// Each distinct [OutputPath] maps to exactly one [StreamHandle] until the
/// cache is closed. Not thread safe; see
/// [SharedStreamCache](crate::shared_cache::SharedStreamCache) for a variant
/// that can be used from several threads.
#[derive(Debug)]
pub struct StreamCache {
    store: Arc<dyn OutputStore>,
    root: PathBuf,
    max_open_streams: usize,
    buffer_size: usize,
    streams: HashMap<OutputPath, StreamHandle>,
    opened: usize,
    released: usize,
}

impl StreamCache {
    pub fn new(
        store: Arc<dyn OutputStore>,
        root: impl Into<PathBuf>,
        max_open_streams: usize,
        buffer_size: usize,
    ) -> Self {
        Self {
            store,
            root: root.into(),
            max_open_streams,
            buffer_size,
            streams: HashMap::new(),
            opened: 0,
            released: 0,
        }
    }

    /// Get the open stream for `path`, opening it on first use.
    pub fn get_or_create(&mut self, path: &OutputPath) -> Result<&mut StreamHandle> {
        if !self.streams.contains_key(path) {
            if self.streams.len() >= self.max_open_streams {
                error!(
                    "Cannot open {} for writing, {} streams are already open",
                    path, self.max_open_streams
                );
                return Err(FanoutError::ResourceExhaustion(self.max_open_streams));
            }
            let handle = StreamHandle::open(
                self.store.as_ref(),
                &self.root,
                path,
                self.buffer_size,
            )?;
            self.streams.insert(path.clone(), handle);
            self.opened += 1;
        }

        self.streams.get_mut(path).ok_or_else(|| {
            FanoutError::Internal(format!("Failed to get output stream for {path}"))
        })
    }

    /// Flush and release every handle.
    ///
    /// All handles are released even if some fail; the first failure is
    /// returned alongside the files that were closed successfully.
    pub(crate) fn close_all(&mut self) -> CloseOutcome {
        let mut files = Vec::with_capacity(self.streams.len());
        let mut first_error = None;
        for (_, mut handle) in self.streams.drain() {
            self.released += 1;
            match handle.finish() {
                Ok(file) => files.push(file),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        (files, first_error)
    }

    /// Release every handle without flushing. Returns how many were released.
    pub fn abandon_all(&mut self) -> usize {
        let n = self.streams.len();
        for (_, mut handle) in self.streams.drain() {
            handle.discard();
        }
        self.released += n;
        n
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of currently open streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Number of streams opened since the cache was created
    pub fn opened(&self) -> usize {
        self.opened
    }

    /// Number of streams released since the cache was created
    pub fn released(&self) -> usize {
        self.released
    }
}
