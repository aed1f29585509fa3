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

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::router::{FragmentId, OutputPath};

/// One output file produced by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Key directory the file belongs to, after key validation
    pub key: String,
    pub path: OutputPath,
    /// Where the file was written while the worker ran
    pub staged_location: PathBuf,
    pub num_records: u64,
    pub num_bytes: u64,
}

/// Files written by one worker invocation, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub fragment: Option<FragmentId>,
    pub files: Vec<WrittenFile>,
}

impl WriteSummary {
    pub fn new(fragment: FragmentId, mut files: Vec<WrittenFile>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            fragment: Some(fragment),
            files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn num_records(&self) -> u64 {
        self.files.iter().map(|f| f.num_records).sum()
    }

    pub fn num_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.num_bytes).sum()
    }

    /// Distinct keys written by the worker
    pub fn keys(&self) -> BTreeSet<&str> {
        self.files.iter().map(|f| f.key.as_str()).collect()
    }

    pub fn file_for_key(&self, key: &str) -> Option<&WrittenFile> {
        self.files.iter().find(|f| f.key == key)
    }
}

impl Display for WriteSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "files: {}, records: {}, bytes: {}",
            self.files.len(),
            self.num_records(),
            self.num_bytes()
        )
    }
}
