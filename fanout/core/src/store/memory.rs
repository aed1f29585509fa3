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

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::OutputStore;

#[derive(Debug, Default)]
struct StoreState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

/// Output store keeping every file in memory.
///
/// Clones share the same contents, so a host can hand one clone to the sink
/// and inspect the output through another.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All file paths currently held, in sorted order
    pub fn files(&self) -> Vec<PathBuf> {
        self.state.lock().files.keys().cloned().collect()
    }
}

impl OutputStore for InMemoryStore {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.files.contains_key(dir) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", dir.display()),
            ));
        }
        check_ancestors(&state, dir)?;
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let mut state = self.state.lock();
        check_parent(&state, path)?;
        if state.dirs.contains(path) {
            return Err(is_a_directory(path));
        }
        state.files.entry(path.to_path_buf()).or_default();
        Ok(Box::new(InMemoryFile {
            state: self.state.clone(),
            path: path.to_path_buf(),
        }))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.state
            .lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        if !state.files.contains_key(from) {
            return Err(not_found(from));
        }
        check_parent(&state, to)?;
        if state.dirs.contains(to) {
            return Err(is_a_directory(to));
        }
        if let Some(content) = state.files.remove(from) {
            state.files.insert(to.to_path_buf(), content);
        }
        Ok(())
    }

    fn remove_dir_all(&self, dir: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        state.files.retain(|p, _| !p.starts_with(dir));
        state.dirs.retain(|p| !p.starts_with(dir));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock();
        state.files.contains_key(path) || state.dirs.contains(path)
    }
}

/// Fails if a file sits anywhere above `path`.
fn check_ancestors(state: &StoreState, path: &Path) -> io::Result<()> {
    match path
        .ancestors()
        .skip(1)
        .take_while(|p| !p.as_os_str().is_empty())
        .find(|p| state.files.contains_key(*p))
    {
        Some(file) => Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", file.display()),
        )),
        None => Ok(()),
    }
}

fn check_parent(state: &StoreState, path: &Path) -> io::Result<()> {
    check_ancestors(state, path)?;
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !state.dirs.contains(parent) => {
            Err(not_found(parent))
        }
        _ => Ok(()),
    }
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::IsADirectory,
        format!("{} is a directory", path.display()),
    )
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

struct InMemoryFile {
    state: Arc<Mutex<StoreState>>,
    path: PathBuf,
}

impl Write for InMemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        match state.files.get_mut(&self.path) {
            Some(content) => {
                content.extend_from_slice(buf);
                Ok(buf.len())
            }
            // the file was moved or removed underneath the writer
            None => Err(not_found(&self.path)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
