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

#![doc = include_str!("../README.md")]

/// Commit coordination for staged worker output.
pub mod commit;
/// Configuration options and settings.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Task driver feeding record streams through a sink.
pub mod executor;
/// Key to output path resolution.
pub mod router;
/// Thread-safe stream cache.
pub mod shared_cache;
/// Record sinks fanning records out to per-key streams.
pub mod sink;
/// Storage backends the sink writes to.
pub mod store;
/// Per-worker cache of open output streams.
pub mod stream_cache;
/// Write statistics reported on close.
pub mod summary;

pub use router::{FragmentId, KeyDirectoryRouter, OutputPath, OutputRouter};
pub use sink::{ConcurrentRecordSink, RecordSink, SinkContext};
pub use summary::{WriteSummary, WrittenFile};
