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

//! RecordSink accepts the `(key, value)` output of one worker and fans it out
//! into one stream per key. Streams are opened lazily below the staging root
//! handed out by the commit coordinator, and are flushed and closed together
//! when the worker finishes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::config::FanoutConfig;
use crate::error::{FanoutError, Result};
use crate::router::{FragmentId, OutputRouter};
use crate::shared_cache::SharedStreamCache;
use crate::store::OutputStore;
use crate::stream_cache::StreamCache;
use crate::summary::WriteSummary;

/// Serializes records into the bytes appended to an output stream.
///
/// Keys are only used for routing unless `include_key` is set.
#[derive(Debug, Clone)]
pub struct RecordEncoder {
    include_key: bool,
    separator: Vec<u8>,
    delimiter: Vec<u8>,
}

impl RecordEncoder {
    pub fn new(include_key: bool, separator: &str, delimiter: &str) -> Self {
        Self {
            include_key,
            separator: separator.as_bytes().to_vec(),
            delimiter: delimiter.as_bytes().to_vec(),
        }
    }

    pub fn from_config(config: &FanoutConfig) -> Self {
        Self::new(
            config.include_key(),
            &config.key_value_separator(),
            &config.record_delimiter(),
        )
    }

    /// Encode into `buf`, replacing its previous content.
    pub fn encode(&self, key: &str, value: &str, buf: &mut Vec<u8>) {
        buf.clear();
        if self.include_key {
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(&self.separator);
        }
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(&self.delimiter);
    }
}

/// Where a worker invocation writes, as handed out by the commit coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkContext {
    pub fragment: FragmentId,
    /// Final location of committed output
    pub output_root: PathBuf,
    /// Root the sink writes below while the worker runs
    pub staging_root: PathBuf,
}

/// Counters collected by a sink over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkMetrics {
    /// Records handed to `emit`, including rejected ones
    pub input_records: u64,
    pub output_records: u64,
    pub output_bytes: u64,
    /// Time spent appending to and flushing streams
    pub write_time: Duration,
}

#[derive(Debug)]
enum SinkState {
    Open,
    Closed(WriteSummary),
    /// aborted, or closing failed
    Released,
}

/// Per-worker writer routing every record to the stream of its key.
///
/// Records must be emitted between construction and [RecordSink::close];
/// records for the same key keep their arrival order in the output.
#[derive(Debug)]
pub struct RecordSink {
    fragment: FragmentId,
    router: Arc<dyn OutputRouter>,
    cache: StreamCache,
    encoder: RecordEncoder,
    progress_interval: usize,
    state: SinkState,
    metrics: SinkMetrics,
    buf: Vec<u8>,
    started: Instant,
}

impl RecordSink {
    /// Open a sink writing below `staging_root`.
    pub fn open(
        fragment: FragmentId,
        staging_root: impl Into<PathBuf>,
        router: Arc<dyn OutputRouter>,
        store: Arc<dyn OutputStore>,
        config: &FanoutConfig,
    ) -> Self {
        let staging_root = staging_root.into();
        debug!(
            "Opening record sink for fragment {} at {:?}",
            fragment, staging_root
        );
        Self {
            fragment,
            router,
            cache: StreamCache::new(
                store,
                staging_root,
                config.max_open_streams(),
                config.buffer_size(),
            ),
            encoder: RecordEncoder::from_config(config),
            progress_interval: config.progress_interval(),
            state: SinkState::Open,
            metrics: SinkMetrics::default(),
            buf: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Open a sink for the worker described by `ctx`.
    pub fn with_context(
        ctx: &SinkContext,
        router: Arc<dyn OutputRouter>,
        store: Arc<dyn OutputStore>,
        config: &FanoutConfig,
    ) -> Self {
        Self::open(
            ctx.fragment.clone(),
            ctx.staging_root.clone(),
            router,
            store,
            config,
        )
    }

    /// Append `value` to the stream resolved for `key`.
    pub fn emit(&mut self, key: &str, value: &str) -> Result<()> {
        if !matches!(self.state, SinkState::Open) {
            return Err(FanoutError::SinkClosed);
        }
        self.metrics.input_records += 1;

        let path = self.router.resolve(key, &self.fragment)?;
        self.encoder.encode(key, value, &mut self.buf);

        let now = Instant::now();
        let res = self
            .cache
            .get_or_create(&path)
            .and_then(|handle| handle.append(&self.buf));
        self.metrics.write_time += now.elapsed();
        res?;

        self.metrics.output_records += 1;
        self.metrics.output_bytes += self.buf.len() as u64;

        if self.progress_interval > 0
            && self.metrics.input_records % self.progress_interval as u64 == 0
        {
            debug!(
                "Fragment {}: processed {} records into {} streams",
                self.fragment,
                self.metrics.input_records,
                self.cache.len()
            );
        }
        Ok(())
    }

    /// Flush and release every stream.
    ///
    /// Calling `close` again returns the same summary. If any stream fails to
    /// flush, all others are still closed and the first failure is returned.
    pub fn close(&mut self) -> Result<WriteSummary> {
        match &self.state {
            SinkState::Closed(summary) => return Ok(summary.clone()),
            SinkState::Released => return Err(FanoutError::SinkClosed),
            SinkState::Open => {}
        }

        let now = Instant::now();
        let (files, err) = self.cache.close_all();
        self.metrics.write_time += now.elapsed();

        if let Some(e) = err {
            self.state = SinkState::Released;
            return Err(e);
        }

        let summary = WriteSummary::new(self.fragment.clone(), files);
        info!(
            "Closed fragment {} in {} ms. Input records: {}. Statistics: {}",
            self.fragment,
            self.started.elapsed().as_millis(),
            self.metrics.input_records,
            summary
        );
        self.state = SinkState::Closed(summary.clone());
        Ok(summary)
    }

    /// Release every stream without finishing the output.
    ///
    /// Already written data stays in the staging area for the commit
    /// coordinator to discard.
    pub fn abort(&mut self) {
        if matches!(self.state, SinkState::Open) {
            let released = self.cache.abandon_all();
            warn!(
                "Aborted fragment {} after {} records, released {} streams",
                self.fragment, self.metrics.input_records, released
            );
        }
        self.state = SinkState::Released;
    }

    pub fn fragment(&self) -> &FragmentId {
        &self.fragment
    }

    pub fn staging_root(&self) -> &Path {
        self.cache.root()
    }

    pub fn metrics(&self) -> SinkMetrics {
        self.metrics
    }

    /// Number of streams currently open
    pub fn open_streams(&self) -> usize {
        self.cache.len()
    }

    pub fn streams_opened(&self) -> usize {
        self.cache.opened()
    }

    pub fn streams_released(&self) -> usize {
        self.cache.released()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SinkState::Open)
    }
}

impl Drop for RecordSink {
    fn drop(&mut self) {
        if self.is_open() && !self.cache.is_empty() {
            self.abort();
        }
    }
}

/// Record sink that can be shared by several threads of one worker.
///
/// Per-key order follows the order in which `emit` calls on that key
/// complete. `close` waits for in-flight emits to finish.
#[derive(Debug)]
pub struct ConcurrentRecordSink {
    fragment: FragmentId,
    router: Arc<dyn OutputRouter>,
    cache: SharedStreamCache,
    encoder: RecordEncoder,
    progress_interval: usize,
    state: RwLock<SinkState>,
    input_records: AtomicU64,
    output_records: AtomicU64,
    output_bytes: AtomicU64,
    write_nanos: AtomicU64,
    started: Instant,
}

impl ConcurrentRecordSink {
    pub fn open(
        fragment: FragmentId,
        staging_root: impl Into<PathBuf>,
        router: Arc<dyn OutputRouter>,
        store: Arc<dyn OutputStore>,
        config: &FanoutConfig,
    ) -> Self {
        let staging_root = staging_root.into();
        debug!(
            "Opening concurrent record sink for fragment {} at {:?}",
            fragment, staging_root
        );
        Self {
            fragment,
            router,
            cache: SharedStreamCache::new(
                store,
                staging_root,
                config.max_open_streams(),
                config.buffer_size(),
            ),
            encoder: RecordEncoder::from_config(config),
            progress_interval: config.progress_interval(),
            state: RwLock::new(SinkState::Open),
            input_records: AtomicU64::new(0),
            output_records: AtomicU64::new(0),
            output_bytes: AtomicU64::new(0),
            write_nanos: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn emit(&self, key: &str, value: &str) -> Result<()> {
        let state = self.state.read();
        if !matches!(*state, SinkState::Open) {
            return Err(FanoutError::SinkClosed);
        }
        let seen = self.input_records.fetch_add(1, Ordering::Relaxed) + 1;

        let path = self.router.resolve(key, &self.fragment)?;
        let mut buf = Vec::with_capacity(key.len() + value.len() + 2);
        self.encoder.encode(key, value, &mut buf);

        let now = Instant::now();
        let res = self
            .cache
            .get_or_create(&path)
            .and_then(|handle| handle.lock().append(&buf));
        self.write_nanos
            .fetch_add(now.elapsed().as_nanos() as u64, Ordering::Relaxed);
        res?;

        self.output_records.fetch_add(1, Ordering::Relaxed);
        self.output_bytes
            .fetch_add(buf.len() as u64, Ordering::Relaxed);

        if self.progress_interval > 0 && seen % self.progress_interval as u64 == 0 {
            debug!(
                "Fragment {}: processed {} records into {} streams",
                self.fragment,
                seen,
                self.cache.len()
            );
        }
        Ok(())
    }

    /// See [RecordSink::close].
    pub fn close(&self) -> Result<WriteSummary> {
        let mut state = self.state.write();
        match &*state {
            SinkState::Closed(summary) => return Ok(summary.clone()),
            SinkState::Released => return Err(FanoutError::SinkClosed),
            SinkState::Open => {}
        }

        let (files, err) = self.cache.close_all();
        if let Some(e) = err {
            *state = SinkState::Released;
            return Err(e);
        }

        let summary = WriteSummary::new(self.fragment.clone(), files);
        info!(
            "Closed fragment {} in {} ms. Input records: {}. Statistics: {}",
            self.fragment,
            self.started.elapsed().as_millis(),
            self.input_records.load(Ordering::Relaxed),
            summary
        );
        *state = SinkState::Closed(summary.clone());
        Ok(summary)
    }

    pub fn abort(&self) {
        let mut state = self.state.write();
        if matches!(*state, SinkState::Open) {
            let released = self.cache.abandon_all();
            warn!(
                "Aborted fragment {} after {} records, released {} streams",
                self.fragment,
                self.input_records.load(Ordering::Relaxed),
                released
            );
        }
        *state = SinkState::Released;
    }

    pub fn fragment(&self) -> &FragmentId {
        &self.fragment
    }

    pub fn staging_root(&self) -> &Path {
        self.cache.root()
    }

    pub fn metrics(&self) -> SinkMetrics {
        SinkMetrics {
            input_records: self.input_records.load(Ordering::Relaxed),
            output_records: self.output_records.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
            write_time: Duration::from_nanos(self.write_nanos.load(Ordering::Relaxed)),
        }
    }

    pub fn open_streams(&self) -> usize {
        self.cache.len()
    }

    pub fn streams_opened(&self) -> usize {
        self.cache.opened()
    }

    pub fn streams_released(&self) -> usize {
        self.cache.released()
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.read(), SinkState::Open)
    }
}

impl Drop for ConcurrentRecordSink {
    fn drop(&mut self) {
        if self.is_open() && !self.cache.is_empty() {
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        FANOUT_SINK_BUFFER_SIZE, FANOUT_SINK_INCLUDE_KEY, FANOUT_SINK_MAX_OPEN_STREAMS,
    };
    use crate::router::KeyDirectoryRouter;
    use crate::store::{InMemoryStore, LocalDiskStore};
    use std::io::{self, Write};
    use tempfile::TempDir;

    fn memory_sink(store: &InMemoryStore, config: &FanoutConfig) -> RecordSink {
        RecordSink::open(
            FragmentId::for_partition(0),
            "/stage",
            Arc::new(KeyDirectoryRouter::default()),
            Arc::new(store.clone()),
            config,
        )
    }

    fn read(store: &dyn OutputStore, path: &str) -> String {
        String::from_utf8(store.read(Path::new(path)).unwrap()).unwrap()
    }

    #[test]
    fn routes_values_by_key_in_arrival_order() -> Result<()> {
        let store = InMemoryStore::new();
        let mut sink = memory_sink(&store, &FanoutConfig::default());
        for (k, v) in [("a", "1"), ("b", "2"), ("a", "3"), ("b", "4"), ("a", "5")] {
            sink.emit(k, v)?;
        }
        let summary = sink.close()?;

        assert_eq!("1\n3\n5\n", read(&store, "/stage/a/part-00000"));
        assert_eq!("2\n4\n", read(&store, "/stage/b/part-00000"));
        assert_eq!(2, summary.files.len());
        assert_eq!(3, summary.file_for_key("a").map(|f| f.num_records).unwrap());
        assert_eq!(5, summary.num_records());
        assert_eq!(10, summary.num_bytes());
        Ok(())
    }

    #[test]
    fn routes_to_local_disk() -> Result<()> {
        let dir = TempDir::new()?;
        let mut sink = RecordSink::open(
            FragmentId::for_partition(3),
            dir.path(),
            Arc::new(KeyDirectoryRouter::default()),
            Arc::new(LocalDiskStore::new()),
            &FanoutConfig::default(),
        );
        sink.emit("root/us", "{\"id\":1}")?;
        sink.emit("root/eu", "{\"id\":2}")?;
        sink.emit("root/us", "{\"id\":3}")?;
        sink.close()?;

        let us = std::fs::read_to_string(dir.path().join("root/us/part-00003"))?;
        assert_eq!("{\"id\":1}\n{\"id\":3}\n", us);
        let eu = std::fs::read_to_string(dir.path().join("root/eu/part-00003"))?;
        assert_eq!("{\"id\":2}\n", eu);
        Ok(())
    }

    #[test]
    fn n_keys_open_and_release_n_streams() -> Result<()> {
        let store = InMemoryStore::new();
        let mut sink = memory_sink(&store, &FanoutConfig::default());
        for i in 0..10 {
            sink.emit(&format!("k{}", i % 4), &i.to_string())?;
        }
        assert_eq!(4, sink.streams_opened());
        assert_eq!(4, sink.open_streams());

        sink.close()?;
        assert_eq!(4, sink.streams_released());
        assert_eq!(0, sink.open_streams());

        // second close does not release anything again
        let again = sink.close()?;
        assert_eq!(4, again.files.len());
        assert_eq!(4, sink.streams_released());
        Ok(())
    }

    #[test]
    fn close_without_records() -> Result<()> {
        let store = InMemoryStore::new();
        let mut sink = memory_sink(&store, &FanoutConfig::default());
        let summary = sink.close()?;
        assert!(summary.is_empty());
        assert_eq!(0, sink.streams_released());
        assert!(store.files().is_empty());
        Ok(())
    }

    #[test]
    fn invalid_key_opens_nothing() -> Result<()> {
        let store = InMemoryStore::new();
        let mut sink = memory_sink(&store, &FanoutConfig::default());
        let res = sink.emit("../etc", "secret");
        assert!(matches!(res, Err(FanoutError::InvalidKey(_, _))));
        assert_eq!(0, sink.streams_opened());
        assert!(store.files().is_empty());

        // the sink keeps accepting valid records
        sink.emit("ok", "1")?;
        assert_eq!(1, sink.close()?.files.len());
        assert_eq!(2, sink.metrics().input_records);
        assert_eq!(1, sink.metrics().output_records);
        Ok(())
    }

    #[test]
    fn emit_after_close_fails() -> Result<()> {
        let store = InMemoryStore::new();
        let mut sink = memory_sink(&store, &FanoutConfig::default());
        sink.emit("a", "1")?;
        sink.close()?;
        assert!(matches!(sink.emit("a", "2"), Err(FanoutError::SinkClosed)));
        Ok(())
    }

    #[test]
    fn include_key_writes_key_and_value() -> Result<()> {
        let store = InMemoryStore::new();
        let config = FanoutConfig::builder()
            .set(FANOUT_SINK_INCLUDE_KEY, "true")
            .build()?;
        let mut sink = memory_sink(&store, &config);
        sink.emit("a", "1")?;
        sink.close()?;
        assert_eq!("a\t1\n", read(&store, "/stage/a/part-00000"));
        Ok(())
    }

    #[test]
    fn too_many_keys_exhaust_resources() -> Result<()> {
        let store = InMemoryStore::new();
        let config = FanoutConfig::builder()
            .set(FANOUT_SINK_MAX_OPEN_STREAMS, "2")
            .build()?;
        let mut sink = memory_sink(&store, &config);
        sink.emit("a", "1")?;
        sink.emit("b", "2")?;
        assert!(matches!(
            sink.emit("c", "3"),
            Err(FanoutError::ResourceExhaustion(2))
        ));
        Ok(())
    }

    #[test]
    fn abort_releases_streams() -> Result<()> {
        let store = InMemoryStore::new();
        let mut sink = memory_sink(&store, &FanoutConfig::default());
        sink.emit("a", "1")?;
        sink.emit("b", "2")?;
        sink.abort();
        assert_eq!(2, sink.streams_released());
        assert!(!sink.is_open());
        assert!(matches!(sink.emit("a", "3"), Err(FanoutError::SinkClosed)));
        assert!(matches!(sink.close(), Err(FanoutError::SinkClosed)));
        Ok(())
    }

    /// Store whose streams fail for paths containing a marker.
    #[derive(Debug, Clone)]
    struct FlakyStore {
        inner: InMemoryStore,
        marker: &'static str,
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk quota exceeded"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl OutputStore for FlakyStore {
        fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
            self.inner.create_dir_all(dir)
        }

        fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
            if path.to_string_lossy().contains(self.marker) {
                Ok(Box::new(FailingWriter))
            } else {
                self.inner.open_append(path)
            }
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.inner.read(path)
        }

        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.inner.rename(from, to)
        }

        fn remove_dir_all(&self, dir: &Path) -> io::Result<()> {
            self.inner.remove_dir_all(dir)
        }

        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }
    }

    #[test]
    fn write_failure_on_one_key_leaves_others_intact() -> Result<()> {
        let inner = InMemoryStore::new();
        let store = FlakyStore {
            inner: inner.clone(),
            marker: "/b/",
        };
        // unbuffered, so the failure surfaces on the write itself
        let config = FanoutConfig::builder()
            .set(FANOUT_SINK_BUFFER_SIZE, "0")
            .build()?;
        let mut sink = RecordSink::open(
            FragmentId::for_partition(0),
            "/stage",
            Arc::new(KeyDirectoryRouter::default()),
            Arc::new(store),
            &config,
        );

        sink.emit("a", "1")?;
        let res = sink.emit("b", "2");
        assert!(matches!(res, Err(FanoutError::StorageWriteFailure(_, _))));
        // later writes to the failed path fail fast
        assert!(matches!(
            sink.emit("b", "4"),
            Err(FanoutError::StorageWriteFailure(_, _))
        ));
        sink.emit("a", "3")?;

        // closing reports the failed stream but still flushes the healthy one
        assert!(matches!(
            sink.close(),
            Err(FanoutError::StorageWriteFailure(_, _))
        ));
        assert_eq!(2, sink.streams_released());
        assert_eq!("1\n3\n", read(&inner, "/stage/a/part-00000"));
        Ok(())
    }

    fn concurrent_sink(store: Arc<dyn OutputStore>, config: &FanoutConfig) -> ConcurrentRecordSink {
        ConcurrentRecordSink::open(
            FragmentId::for_partition(0),
            "/stage",
            Arc::new(KeyDirectoryRouter::default()),
            store,
            config,
        )
    }

    #[test]
    fn concurrent_abort_releases_streams() -> Result<()> {
        let store = InMemoryStore::new();
        let sink = concurrent_sink(Arc::new(store.clone()), &FanoutConfig::default());
        sink.emit("a", "1")?;
        sink.emit("b", "2")?;
        assert_eq!(2, sink.open_streams());

        sink.abort();
        assert!(!sink.is_open());
        assert_eq!(0, sink.open_streams());
        assert_eq!(2, sink.streams_released());
        assert!(matches!(sink.emit("c", "3"), Err(FanoutError::SinkClosed)));
        assert!(matches!(sink.close(), Err(FanoutError::SinkClosed)));
        // nothing was opened after the abort
        assert_eq!(2, sink.streams_opened());
        Ok(())
    }

    #[test]
    fn concurrent_emit_after_close_fails() -> Result<()> {
        let store = InMemoryStore::new();
        let sink = concurrent_sink(Arc::new(store.clone()), &FanoutConfig::default());
        sink.emit("a", "1")?;
        let summary = sink.close()?;

        assert!(matches!(sink.emit("a", "2"), Err(FanoutError::SinkClosed)));
        assert_eq!(1, summary.num_records());
        assert_eq!(1, sink.close()?.num_records());
        assert_eq!("1\n", read(&store, "/stage/a/part-00000"));
        Ok(())
    }

    #[test]
    fn concurrent_write_failure_on_one_key_leaves_others_intact() -> Result<()> {
        let inner = InMemoryStore::new();
        let store = FlakyStore {
            inner: inner.clone(),
            marker: "/b/",
        };
        let config = FanoutConfig::builder()
            .set(FANOUT_SINK_BUFFER_SIZE, "0")
            .build()?;
        let sink = concurrent_sink(Arc::new(store), &config);

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..50 {
                    sink.emit("a", &i.to_string()).unwrap();
                }
            });
            s.spawn(|| {
                for i in 0..50 {
                    assert!(matches!(
                        sink.emit("b", &i.to_string()),
                        Err(FanoutError::StorageWriteFailure(_, _))
                    ));
                }
            });
        });

        assert!(matches!(
            sink.close(),
            Err(FanoutError::StorageWriteFailure(_, _))
        ));
        assert_eq!(0, sink.open_streams());
        assert_eq!(2, sink.streams_released());
        let expected: String = (0..50).map(|i| format!("{i}\n")).collect();
        assert_eq!(expected, read(&inner, "/stage/a/part-00000"));
        Ok(())
    }

    #[test]
    fn encoder_formats() {
        let mut buf = vec![];
        RecordEncoder::new(false, "\t", "\n").encode("k", "v", &mut buf);
        assert_eq!(b"v\n".to_vec(), buf);
        RecordEncoder::new(true, ",", "\r\n").encode("k", "v", &mut buf);
        assert_eq!(b"k,v\r\n".to_vec(), buf);
    }
}
