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

//! Fanout configuration

use std::collections::HashMap;
use std::fmt::Display;
use std::result;
use std::sync::LazyLock;

use crate::error::{FanoutError, Result};

/// upper bound on streams a single worker keeps open
pub const FANOUT_SINK_MAX_OPEN_STREAMS: &str = "fanout.sink.max_open_streams";
/// write `key<separator>value` instead of the bare value
pub const FANOUT_SINK_INCLUDE_KEY: &str = "fanout.sink.include_key";
pub const FANOUT_SINK_KEY_VALUE_SEPARATOR: &str = "fanout.sink.key_value_separator";
pub const FANOUT_SINK_RECORD_DELIMITER: &str = "fanout.sink.record_delimiter";
/// capacity of the write buffer in front of every output stream
pub const FANOUT_SINK_BUFFER_SIZE: &str = "fanout.sink.buffer_size";
pub const FANOUT_SINK_PROGRESS_INTERVAL: &str = "fanout.sink.progress_interval";
/// how keys that are unsafe as path segments are handled
pub const FANOUT_KEY_POLICY: &str = "fanout.key.policy";
pub const FANOUT_KEY_MAX_SEGMENT_LENGTH: &str = "fanout.key.max_segment_length";

pub type ParseResult<T> = result::Result<T, String>;

static CONFIG_ENTRIES: LazyLock<HashMap<String, ConfigEntry>> = LazyLock::new(|| {
    let entries = vec![
        ConfigEntry::new(FANOUT_SINK_MAX_OPEN_STREAMS.to_string(),
                         "Maximum number of output streams a single worker may hold open".to_string(),
                         ValueType::PositiveInteger, Some(1024.to_string())),
        ConfigEntry::new(FANOUT_SINK_INCLUDE_KEY.to_string(),
                         "Write the key in front of every value instead of routing on it only".to_string(),
                         ValueType::Boolean, Some(false.to_string())),
        ConfigEntry::new(FANOUT_SINK_KEY_VALUE_SEPARATOR.to_string(),
                         "Separator between key and value when keys are written".to_string(),
                         ValueType::Text, Some("\t".to_string())),
        ConfigEntry::new(FANOUT_SINK_RECORD_DELIMITER.to_string(),
                         "Delimiter appended after every record".to_string(),
                         ValueType::Text, Some("\n".to_string())),
        ConfigEntry::new(FANOUT_SINK_BUFFER_SIZE.to_string(),
                         "Write buffer capacity in bytes for each output stream".to_string(),
                         ValueType::Integer, Some((8 * 1024).to_string())),
        ConfigEntry::new(FANOUT_SINK_PROGRESS_INTERVAL.to_string(),
                         "Log progress every N records, 0 disables progress logging".to_string(),
                         ValueType::Integer, Some(1000.to_string())),
        ConfigEntry::new(FANOUT_KEY_POLICY.to_string(),
                         "Key handling policy: 'strict' rejects unsafe keys, 'sanitize' rewrites them".to_string(),
                         ValueType::KeyPolicy, Some(KeyPolicy::Strict.to_string())),
        ConfigEntry::new(FANOUT_KEY_MAX_SEGMENT_LENGTH.to_string(),
                         "Maximum length in bytes of a single key path segment".to_string(),
                         ValueType::PositiveInteger, Some(255.to_string())),
    ];
    entries
        .into_iter()
        .map(|e| (e.name.clone(), e))
        .collect::<HashMap<_, _>>()
});

/// Value types accepted by configuration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    PositiveInteger,
    Boolean,
    Text,
    KeyPolicy,
}

/// Configuration option meta-data
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    name: String,
    description: String,
    value_type: ValueType,
    default_value: Option<String>,
}

impl ConfigEntry {
    fn new(
        name: String,
        description: String,
        value_type: ValueType,
        default_value: Option<String>,
    ) -> Self {
        Self {
            name,
            description,
            value_type,
            default_value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }
}

/// Builder for [FanoutConfig]
#[derive(Debug, Default)]
pub struct FanoutConfigBuilder {
    settings: HashMap<String, String>,
}

impl FanoutConfigBuilder {
    /// Create a new config builder with an additional setting
    pub fn set(&self, k: &str, v: &str) -> Self {
        let mut settings = self.settings.clone();
        settings.insert(k.to_owned(), v.to_owned());
        Self { settings }
    }

    pub fn build(&self) -> Result<FanoutConfig> {
        FanoutConfig::with_settings(self.settings.clone())
    }
}

/// Fanout configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutConfig {
    /// Settings stored in map for easy serde
    settings: HashMap<String, String>,
    // typed values resolved once at construction
    key_policy: KeyPolicy,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            settings: HashMap::new(),
            key_policy: KeyPolicy::default(),
        }
    }
}

impl FanoutConfig {
    pub fn builder() -> FanoutConfigBuilder {
        FanoutConfigBuilder::default()
    }

    /// Create a new configuration based on key-value pairs
    pub fn with_settings(settings: HashMap<String, String>) -> Result<Self> {
        for name in settings.keys() {
            if !Self::valid_entries().contains_key(name) {
                return Err(FanoutError::Configuration(format!(
                    "configuration key `{name}` does not exist"
                )));
            }
        }

        for (name, entry) in Self::valid_entries() {
            if let Some(v) = settings.get(name) {
                // validate that we can parse the user-supplied value
                Self::parse_value(v.as_str(), entry.value_type).map_err(|e| FanoutError::Configuration(format!("Failed to parse user-supplied value '{v}' for configuration setting '{name}': {e}")))?;
            } else if let Some(v) = entry.default_value.as_deref() {
                Self::parse_value(v, entry.value_type).map_err(|e| FanoutError::Configuration(format!("Failed to parse default value '{v}' for configuration setting '{name}': {e}")))?;
            }
        }

        let key_policy = match settings.get(FANOUT_KEY_POLICY) {
            Some(v) => v.parse().map_err(FanoutError::Configuration)?,
            None => KeyPolicy::default(),
        };

        Ok(Self {
            settings,
            key_policy,
        })
    }

    pub fn parse_value(val: &str, value_type: ValueType) -> ParseResult<()> {
        match value_type {
            ValueType::Integer => {
                val.parse::<usize>().map_err(|e| format!("{e:?}"))?;
            }
            ValueType::PositiveInteger => {
                let v = val.parse::<usize>().map_err(|e| format!("{e:?}"))?;
                if v == 0 {
                    return Err("value must be greater than zero".to_string());
                }
            }
            ValueType::Boolean => {
                val.parse::<bool>().map_err(|e| format!("{e:?}"))?;
            }
            ValueType::Text => {}
            ValueType::KeyPolicy => {
                val.parse::<KeyPolicy>()?;
            }
        }

        Ok(())
    }

    // All available configuration options
    pub fn valid_entries() -> &'static HashMap<String, ConfigEntry> {
        &CONFIG_ENTRIES
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn max_open_streams(&self) -> usize {
        self.get_usize_setting(FANOUT_SINK_MAX_OPEN_STREAMS)
    }

    pub fn include_key(&self) -> bool {
        self.get_bool_setting(FANOUT_SINK_INCLUDE_KEY)
    }

    pub fn key_value_separator(&self) -> String {
        self.get_string_setting(FANOUT_SINK_KEY_VALUE_SEPARATOR)
    }

    pub fn record_delimiter(&self) -> String {
        self.get_string_setting(FANOUT_SINK_RECORD_DELIMITER)
    }

    pub fn buffer_size(&self) -> usize {
        self.get_usize_setting(FANOUT_SINK_BUFFER_SIZE)
    }

    pub fn progress_interval(&self) -> usize {
        self.get_usize_setting(FANOUT_SINK_PROGRESS_INTERVAL)
    }

    pub fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }

    pub fn max_segment_length(&self) -> usize {
        self.get_usize_setting(FANOUT_KEY_MAX_SEGMENT_LENGTH)
    }

    // Getters fall back to zero/empty values only if a setting is missing from
    // the entry table, which validation in the constructor rules out.
    fn get_usize_setting(&self, key: &str) -> usize {
        self.raw_setting(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    fn get_bool_setting(&self, key: &str) -> bool {
        self.raw_setting(key)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or_default()
    }

    fn get_string_setting(&self, key: &str) -> String {
        self.raw_setting(key).unwrap_or_default().to_string()
    }

    fn raw_setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(|v| v.as_str()).or_else(|| {
            Self::valid_entries()
                .get(key)
                .and_then(|entry| entry.default_value.as_deref())
        })
    }
}

// an enum used to configure how keys that are unsafe as path segments are handled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "build-binary", derive(clap::ValueEnum))]
pub enum KeyPolicy {
    /// Reject keys that cannot be used verbatim
    #[default]
    Strict,
    /// Replace characters outside `[0-9A-Za-z_]` with `_` and lower-case
    Sanitize,
}

impl std::str::FromStr for KeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(KeyPolicy::Strict),
            "sanitize" => Ok(KeyPolicy::Sanitize),
            other => Err(format!(
                "unknown key policy '{other}', expected 'strict' or 'sanitize'"
            )),
        }
    }
}

impl Display for KeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPolicy::Strict => write!(f, "strict"),
            KeyPolicy::Sanitize => write!(f, "sanitize"),
        }
    }
}
