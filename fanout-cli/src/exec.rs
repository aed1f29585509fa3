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

//! Turns line-oriented input into keyed records.

use std::pin::Pin;

use fanout_core::config::{FanoutConfig, FanoutConfigBuilder, FANOUT_SINK_KEY_VALUE_SEPARATOR};
use fanout_core::error::{FanoutError, Result};
use futures::Stream;
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// Boxed stream of `(key, value)` records
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<(String, String)>> + Send>>;

/// Split `line` at the first occurrence of `separator`.
///
/// The value keeps any further separators. Returns `None` if the line
/// contains no separator at all.
pub fn split_record(line: &str, separator: &str) -> Option<(String, String)> {
    line.split_once(separator)
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
}

struct LineState<R> {
    lines: Lines<R>,
    line_number: usize,
    separator: String,
    skip_malformed: bool,
    source: String,
}

/// Stream the lines of `reader` as records.
///
/// Lines without a separator fail the stream unless `skip_malformed` is set,
/// in which case they are logged and dropped.
pub fn line_records<R>(
    reader: R,
    source: impl Into<String>,
    separator: impl Into<String>,
    skip_malformed: bool,
) -> RecordStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let state = LineState {
        lines: reader.lines(),
        line_number: 0,
        separator: separator.into(),
        skip_malformed,
        source: source.into(),
    };
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            let line = match state.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(
                        "Read {} lines from {}",
                        state.line_number, state.source
                    );
                    return None;
                }
                Err(e) => return Some((Err(FanoutError::IoError(e)), state)),
            };
            state.line_number += 1;

            match split_record(&line, &state.separator) {
                Some(record) => return Some((Ok(record), state)),
                None if state.skip_malformed => {
                    warn!(
                        "Skipping line {} of {}: no key separator",
                        state.line_number, state.source
                    );
                }
                None => {
                    let err = FanoutError::General(format!(
                        "Line {} of {} has no key separator {:?}",
                        state.line_number, state.source, state.separator
                    ));
                    return Some((Err(err), state));
                }
            }
        }
    }))
}

/// Interpret the escape sequences a shell user is likely to type for a
/// separator, such as `\t`.
pub fn unescape_separator(sep: &str) -> String {
    sep.replace("\\t", "\t")
        .replace("\\n", "\n")
        .replace("\\0", "\0")
}

/// Apply `key=value` overrides on top of the settings derived from flags.
///
/// The resulting key/value separator is used both to split the input and
/// to write keys, so an override of it is unescaped like `--separator`.
pub fn worker_config(
    mut builder: FanoutConfigBuilder,
    overrides: &[(String, String)],
) -> Result<FanoutConfig> {
    for (key, value) in overrides {
        builder = if key == FANOUT_SINK_KEY_VALUE_SEPARATOR {
            builder.set(key, &unescape_separator(value))
        } else {
            builder.set(key, value)
        };
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::io::BufReader;

    async fn collect(input: &'static str, skip_malformed: bool) -> Vec<Result<(String, String)>> {
        line_records(
            BufReader::new(input.as_bytes()),
            "test",
            "\t",
            skip_malformed,
        )
        .collect()
        .await
    }

    #[test]
    fn splits_at_first_separator() {
        assert_eq!(
            Some(("a".to_string(), "b\tc".to_string())),
            split_record("a\tb\tc", "\t")
        );
        assert_eq!(
            Some(("".to_string(), "v".to_string())),
            split_record("\tv", "\t")
        );
        assert_eq!(None, split_record("no separator", "\t"));
    }

    #[tokio::test]
    async fn reads_records() {
        let records = collect("a\t1\nb\t2\n", false).await;
        let records: Vec<_> = records.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ],
            records
        );
    }

    #[tokio::test]
    async fn malformed_line_fails() {
        let records = collect("a\t1\nbroken\nb\t2\n", false).await;
        assert!(records[0].is_ok());
        assert!(matches!(records[1], Err(FanoutError::General(_))));
    }

    #[tokio::test]
    async fn malformed_line_is_skipped() {
        let records = collect("a\t1\nbroken\nb\t2\n", true).await;
        assert_eq!(2, records.len());
        assert!(records.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn separator_override_applies_to_input() -> Result<()> {
        let flags = FanoutConfig::builder().set(FANOUT_SINK_KEY_VALUE_SEPARATOR, "\t");
        let overrides = vec![(FANOUT_SINK_KEY_VALUE_SEPARATOR.to_string(), ",".to_string())];
        let config = worker_config(flags, &overrides)?;
        assert_eq!(",", config.key_value_separator());

        let records: Vec<_> = line_records(
            BufReader::new("a,1\nb,2\n".as_bytes()),
            "test",
            config.key_value_separator(),
            false,
        )
        .collect()
        .await;
        let records = records.into_iter().collect::<Result<Vec<_>>>()?;
        assert_eq!(
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ],
            records
        );

        let overrides = vec![(FANOUT_SINK_KEY_VALUE_SEPARATOR.to_string(), "\\t".to_string())];
        let config = worker_config(FanoutConfig::builder(), &overrides)?;
        assert_eq!("\t", config.key_value_separator());
        Ok(())
    }

    #[test]
    fn unescapes_separators() {
        assert_eq!("\t", unescape_separator("\\t"));
        assert_eq!(",", unescape_separator(","));
    }
}
