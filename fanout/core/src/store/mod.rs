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

//! Storage backends the sink writes output streams to.

use std::fmt::Debug;
use std::io::{self, Write};
use std::path::Path;

mod disk;
mod memory;

pub use disk::LocalDiskStore;
pub use memory::InMemoryStore;

/// Synchronous storage backend for output files.
///
/// All calls block until the backend has completed them. Paths are absolute
/// within the backend's namespace.
pub trait OutputStore: Debug + Send + Sync {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Open `path` for appending, creating the file if it does not exist.
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Move a file, replacing the destination if it already exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a directory and everything below it. Missing directories are
    /// not an error.
    fn remove_dir_all(&self, dir: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}
