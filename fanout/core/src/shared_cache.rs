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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::error;
use parking_lot::Mutex;

use crate::error::{FanoutError, Result};
use crate::router::OutputPath;
use crate::store::OutputStore;
use crate::stream_cache::{CloseOutcome, StreamHandle};

/// Stream cache that can be shared by several threads of one worker.
///
/// Creation is serialized per path through the map entry, so concurrent
/// first writes to a key still open exactly one stream. Appends to the same
/// stream are serialized by the handle's own lock.
#[derive(Debug)]
pub struct SharedStreamCache {
    store: Arc<dyn OutputStore>,
    root: PathBuf,
    max_open_streams: usize,
    buffer_size: usize,
    streams: DashMap<OutputPath, Arc<Mutex<StreamHandle>>>,
    open: AtomicUsize,
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl SharedStreamCache {
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
            streams: DashMap::new(),
            open: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn get_or_create(&self, path: &OutputPath) -> Result<Arc<Mutex<StreamHandle>>> {
        if let Some(handle) = self.streams.get(path) {
            return Ok(handle.value().clone());
        }

        match self.streams.entry(path.clone()) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                self.reserve_slot(path)?;
                let handle = match StreamHandle::open(
                    self.store.as_ref(),
                    &self.root,
                    path,
                    self.buffer_size,
                ) {
                    Ok(h) => Arc::new(Mutex::new(h)),
                    Err(err) => {
                        self.open.fetch_sub(1, Ordering::SeqCst);
                        return Err(err);
                    }
                };
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(e.insert(handle).value().clone())
            }
        }
    }

    fn reserve_slot(&self, path: &OutputPath) -> Result<()> {
        let max = self.max_open_streams;
        self.open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                error!(
                    "Cannot open {} for writing, {} streams are already open",
                    path, max
                );
                FanoutError::ResourceExhaustion(max)
            })
    }

    /// Flush and release every handle.
    ///
    /// Callers must make sure no other thread is still appending.
    pub(crate) fn close_all(&self) -> CloseOutcome {
        let mut files = vec![];
        let mut first_error = None;
        let mut n = 0;
        self.streams.retain(|_, handle| {
            n += 1;
            match handle.lock().finish() {
                Ok(file) => files.push(file),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
            false
        });
        self.release(n);
        (files, first_error)
    }

    /// Release every handle without flushing.
    pub fn abandon_all(&self) -> usize {
        let mut n = 0;
        self.streams.retain(|_, handle| {
            handle.lock().discard();
            n += 1;
            false
        });
        self.release(n);
        n
    }

    fn release(&self, n: usize) {
        self.open.fetch_sub(n, Ordering::SeqCst);
        self.released.fetch_add(n, Ordering::SeqCst);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}
