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

//! Output routing: maps a record key and the worker's fragment id to the
//! relative path the record is written to.
//!
//! The key becomes one or more directory segments and the fragment id the
//! leaf file name, so `("events/us", part-00003)` lands in
//! `events/us/part-00003`. Paths are relative; the sink materialises them
//! under the staging root and the commit coordinator under the output root.

use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};

use crate::commit::TEMPORARY_DIR;
use crate::config::{FanoutConfig, KeyPolicy};
use crate::error::{FanoutError, Result};

/// Per-worker unique leaf name for output files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(String);

impl FragmentId {
    /// Wrap a fragment id supplied by the host engine.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id == "." || id == ".." {
            return Err(FanoutError::Configuration(format!(
                "fragment id '{id}' is not a valid file name"
            )));
        }
        if id.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
            return Err(FanoutError::Configuration(format!(
                "fragment id '{}' must not contain separators or control characters",
                id.escape_debug()
            )));
        }
        Ok(Self(id))
    }

    /// Fragment id following the batch engine naming convention, stable
    /// across attempts of the same partition.
    pub fn for_partition(partition: usize) -> Self {
        Self(format!("part-{partition:05}"))
    }

    /// Random fragment id for workers that have no partition number.
    pub fn random() -> Self {
        Self(format!("part-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FragmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of one output file, relative to an output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputPath {
    relative: PathBuf,
    /// key segments after validation or sanitization, joined by `/`
    key: String,
    key_dir: PathBuf,
}

impl OutputPath {
    fn new(segments: Vec<String>, fragment: &FragmentId) -> Self {
        let key_dir: PathBuf = segments.iter().collect();
        let relative = key_dir.join(fragment.as_str());
        Self {
            relative,
            key: segments.join("/"),
            key_dir,
        }
    }

    /// Routed key as written to the path
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Directory part of the path, derived from the key
    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Absolute location of this path below `root`
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }
}

impl Display for OutputPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.relative.display())
    }
}

/// Partitioning policy deciding where a record is written.
///
/// Implementations must be pure: the same key and fragment id always
/// resolve to the same path, which keeps re-executed workers idempotent.
pub trait OutputRouter: Debug + Send + Sync {
    fn resolve(&self, key: &str, fragment: &FragmentId) -> Result<OutputPath>;
}

/// Routes each key to its own directory, with the fragment id as leaf.
#[derive(Debug, Clone)]
pub struct KeyDirectoryRouter {
    policy: KeyPolicy,
    max_segment_length: usize,
}

impl Default for KeyDirectoryRouter {
    fn default() -> Self {
        Self::new(KeyPolicy::Strict, 255)
    }
}

impl KeyDirectoryRouter {
    pub fn new(policy: KeyPolicy, max_segment_length: usize) -> Self {
        Self {
            policy,
            max_segment_length,
        }
    }

    pub fn from_config(config: &FanoutConfig) -> Self {
        Self::new(config.key_policy(), config.max_segment_length())
    }

    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    fn key_segments(&self, key: &str, fragment: &FragmentId) -> Result<Vec<String>> {
        if key.is_empty() {
            return Err(invalid_key(key, "key is empty"));
        }
        if key.starts_with('/') {
            return Err(invalid_key(key, "absolute paths are not allowed"));
        }

        let mut segments = vec![];
        for segment in key.split('/') {
            let segment = match self.policy {
                KeyPolicy::Strict => {
                    check_segment(key, segment)?;
                    segment.to_owned()
                }
                KeyPolicy::Sanitize => sanitize_segment(segment),
            };
            if segment.is_empty() {
                return Err(invalid_key(key, "key contains an empty path segment"));
            }
            if segment.len() > self.max_segment_length {
                return Err(invalid_key(
                    key,
                    &format!(
                        "path segment is {} bytes, the limit is {}",
                        segment.len(),
                        self.max_segment_length
                    ),
                ));
            }
            if segments.is_empty() && segment.eq_ignore_ascii_case(TEMPORARY_DIR) {
                return Err(invalid_key(
                    key,
                    &format!("{TEMPORARY_DIR} is reserved for staged output"),
                ));
            }
            // the fragment id is the leaf file name in every key directory
            if segment == fragment.as_str() {
                return Err(invalid_key(
                    key,
                    &format!("path segment {fragment} is the name of this worker's output files"),
                ));
            }
            segments.push(segment);
        }
        Ok(segments)
    }
}

impl OutputRouter for KeyDirectoryRouter {
    fn resolve(&self, key: &str, fragment: &FragmentId) -> Result<OutputPath> {
        let segments = self.key_segments(key, fragment)?;
        Ok(OutputPath::new(segments, fragment))
    }
}

fn check_segment(key: &str, segment: &str) -> Result<()> {
    match segment {
        "." | ".." => Err(invalid_key(key, "path traversal segments are not allowed")),
        _ if segment.contains('\\') => {
            Err(invalid_key(key, "backslash is not allowed in keys"))
        }
        _ if segment.chars().any(|c| c.is_control()) => {
            Err(invalid_key(key, "control characters are not allowed in keys"))
        }
        _ => Ok(()),
    }
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn invalid_key(key: &str, reason: &str) -> FanoutError {
    FanoutError::InvalidKey(key.escape_debug().to_string(), reason.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part0() -> FragmentId {
        FragmentId::for_partition(0)
    }

    #[test]
    fn resolve_joins_key_and_fragment() -> Result<()> {
        let router = KeyDirectoryRouter::default();
        let path = router.resolve("events", &part0())?;
        assert_eq!(Path::new("events/part-00000"), path.relative());
        assert_eq!(Path::new("events"), path.key_dir());
        assert_eq!(
            PathBuf::from("/out/events/part-00000"),
            path.under(Path::new("/out"))
        );
        Ok(())
    }

    #[test]
    fn resolve_is_deterministic() -> Result<()> {
        let router = KeyDirectoryRouter::default();
        let fragment = FragmentId::new("10.0.0.7_4242")?;
        let first = router.resolve("root/us", &fragment)?;
        for _ in 0..3 {
            assert_eq!(first, router.resolve("root/us", &fragment)?);
        }
        assert_eq!(Path::new("root/us/10.0.0.7_4242"), first.relative());
        Ok(())
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let router = KeyDirectoryRouter::default();
        for key in ["../etc", "a/../../b", "./a", "..", "/etc/passwd", "a//b", "a/"] {
            let res = router.resolve(key, &part0());
            assert!(
                matches!(res, Err(FanoutError::InvalidKey(_, _))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn illegal_characters_are_rejected() {
        let router = KeyDirectoryRouter::default();
        for key in ["", "a\\b", "a\0b", "line\nbreak"] {
            assert!(matches!(
                router.resolve(key, &part0()),
                Err(FanoutError::InvalidKey(_, _))
            ));
        }
    }

    #[test]
    fn long_segments_are_rejected() {
        let router = KeyDirectoryRouter::new(KeyPolicy::Strict, 8);
        assert!(router.resolve("12345678", &part0()).is_ok());
        assert!(matches!(
            router.resolve("123456789", &part0()),
            Err(FanoutError::InvalidKey(_, _))
        ));
    }

    #[test]
    fn sanitize_rewrites_unsafe_characters() -> Result<()> {
        let router = KeyDirectoryRouter::new(KeyPolicy::Sanitize, 255);
        let path = router.resolve("US East/2024-01", &part0())?;
        assert_eq!(Path::new("us_east/2024_01/part-00000"), path.relative());
        assert_eq!("us_east/2024_01", path.key());

        // traversal collapses into a plain directory name
        let path = router.resolve("../etc", &part0())?;
        assert_eq!(Path::new("__/etc/part-00000"), path.relative());

        assert!(matches!(
            router.resolve("", &part0()),
            Err(FanoutError::InvalidKey(_, _))
        ));
        assert!(matches!(
            router.resolve("/etc", &part0()),
            Err(FanoutError::InvalidKey(_, _))
        ));
        Ok(())
    }

    #[test]
    fn staging_directory_is_reserved() -> Result<()> {
        for router in [
            KeyDirectoryRouter::default(),
            KeyDirectoryRouter::new(KeyPolicy::Sanitize, 255),
        ] {
            for key in ["_temporary", "_temporary/part-00001/k", "_TEMPORARY/k"] {
                assert!(
                    matches!(
                        router.resolve(key, &part0()),
                        Err(FanoutError::InvalidKey(_, _))
                    ),
                    "key {key:?} should be rejected"
                );
            }
            // only the top level is reserved
            let path = router.resolve("a/_temporary", &part0())?;
            assert_eq!(Path::new("a/_temporary/part-00000"), path.relative());
        }
        Ok(())
    }

    #[test]
    fn fragment_id_segments_are_rejected() -> Result<()> {
        let router = KeyDirectoryRouter::default();
        for key in ["a/part-00000", "part-00000", "a/part-00000/b"] {
            let err = router.resolve(key, &part0()).err();
            assert!(
                matches!(&err, Some(FanoutError::InvalidKey(_, _))),
                "key {key:?} should be rejected"
            );
            assert!(!err.map(|e| e.is_retryable()).unwrap_or(true));
        }
        // another worker's fragment id is an ordinary directory name
        let path = router.resolve("a/part-00001", &part0())?;
        assert_eq!(Path::new("a/part-00001/part-00000"), path.relative());
        Ok(())
    }

    #[test]
    fn different_fragments_do_not_collide() -> Result<()> {
        let router = KeyDirectoryRouter::default();
        let a = router.resolve("k", &FragmentId::for_partition(0))?;
        let b = router.resolve("k", &FragmentId::for_partition(1))?;
        assert_ne!(a, b);
        assert_eq!(a.key_dir(), b.key_dir());
        Ok(())
    }

    #[test]
    fn fragment_ids_are_validated() {
        assert!(FragmentId::new("part-00001").is_ok());
        assert!(FragmentId::new("").is_err());
        assert!(FragmentId::new("..").is_err());
        assert!(FragmentId::new("a/b").is_err());
        assert!(FragmentId::random().as_str().starts_with("part-"));
        assert_ne!(FragmentId::random(), FragmentId::random());
    }
}
