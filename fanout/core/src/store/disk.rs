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

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use log::error;

use super::OutputStore;

/// Output store backed by the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDiskStore {}

impl LocalDiskStore {
    pub fn new() -> Self {
        Self {}
    }
}

impl OutputStore for LocalDiskStore {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                error!("Failed to open output file at {:?}: {:?}", path, e);
                e
            })?;
        Ok(Box::new(file))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to).map_err(|e| {
            error!("Failed to move {:?} to {:?}: {:?}", from, to, e);
            e
        })
    }

    fn remove_dir_all(&self, dir: &Path) -> io::Result<()> {
        match fs::remove_dir_all(dir) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_keeps_existing_content() -> io::Result<()> {
        let dir = TempDir::new()?;
        let store = LocalDiskStore::new();
        let nested = dir.path().join("a").join("b");
        store.create_dir_all(&nested)?;

        let path = nested.join("part-00000");
        store.open_append(&path)?.write_all(b"1\n")?;
        store.open_append(&path)?.write_all(b"2\n")?;

        assert_eq!(b"1\n2\n".to_vec(), store.read(&path)?);
        Ok(())
    }

    #[test]
    fn rename_and_remove() -> io::Result<()> {
        let dir = TempDir::new()?;
        let store = LocalDiskStore::new();
        let staging = dir.path().join("_temporary");
        store.create_dir_all(&staging)?;

        let from = staging.join("part-00000");
        store.open_append(&from)?.write_all(b"x")?;
        let to = dir.path().join("part-00000");
        store.rename(&from, &to)?;
        assert!(store.exists(&to));
        assert!(!store.exists(&from));

        store.remove_dir_all(&staging)?;
        assert!(!store.exists(&staging));
        // removing twice is fine
        store.remove_dir_all(&staging)?;
        Ok(())
    }
}
