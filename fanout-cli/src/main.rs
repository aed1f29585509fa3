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

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use fanout_cli::exec::{line_records, unescape_separator, worker_config, RecordStream};
use fanout_cli::FANOUT_CLI_VERSION;
use fanout_core::commit::StagingCommitter;
use fanout_core::config::{
    FanoutConfig, KeyPolicy, FANOUT_KEY_POLICY, FANOUT_SINK_INCLUDE_KEY,
    FANOUT_SINK_KEY_VALUE_SEPARATOR, FANOUT_SINK_MAX_OPEN_STREAMS,
};
use fanout_core::error::{Result, TaskFailure};
use fanout_core::executor::OutputExecutor;
use fanout_core::store::LocalDiskStore;
use fanout_core::{FragmentId, KeyDirectoryRouter};
use futures::StreamExt;
use tokio::io::BufReader;

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(
        short = 'o',
        long,
        help = "Directory the per-key output is committed to"
    )]
    output_root: String,

    #[clap(
        short = 'p',
        long,
        help = "Partition number of this worker, used as output file name"
    )]
    partition: Option<usize>,

    #[clap(
        long,
        help = "Output file name for this worker, a random id is used if neither this nor --partition is given",
        conflicts_with = "partition"
    )]
    fragment_id: Option<String>,

    #[clap(long, value_enum, default_value_t = KeyPolicy::Strict)]
    key_policy: KeyPolicy,

    #[clap(
        long,
        help = "Maximum number of output files held open at once",
        value_parser(parse_max_open_streams)
    )]
    max_open_streams: Option<usize>,

    #[clap(long, help = "Write the key in front of every value")]
    include_key: bool,

    #[clap(
        short = 's',
        long,
        default_value = "\\t",
        help = "Separator between key and value in the input"
    )]
    separator: String,

    #[clap(long, help = "Skip input lines without a separator instead of failing")]
    skip_malformed: bool,

    #[clap(
        short = 'c',
        long = "config",
        help = "Additional configuration setting as key=value",
        value_parser(parse_setting)
    )]
    settings: Vec<(String, String)>,

    #[clap(
        short,
        long,
        help = "Reduce printing other than the written files"
    )]
    quiet: bool,

    #[clap(
        help = "Input files, standard input is read if none are given",
        value_parser(parse_valid_file)
    )]
    files: Vec<String>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.quiet {
        println!("fanout v{FANOUT_CLI_VERSION}");
    }

    let mut builder = FanoutConfig::builder()
        .set(FANOUT_KEY_POLICY, &args.key_policy.to_string())
        .set(FANOUT_SINK_INCLUDE_KEY, &args.include_key.to_string())
        .set(
            FANOUT_SINK_KEY_VALUE_SEPARATOR,
            &unescape_separator(&args.separator),
        );
    if let Some(max_open_streams) = args.max_open_streams {
        builder = builder.set(FANOUT_SINK_MAX_OPEN_STREAMS, &max_open_streams.to_string());
    }
    let config = worker_config(builder, &args.settings)?;
    let separator = config.key_value_separator();

    let fragment = match (args.partition, args.fragment_id) {
        (Some(partition), _) => FragmentId::for_partition(partition),
        (None, Some(id)) => FragmentId::new(id)?,
        (None, None) => FragmentId::random(),
    };

    let records: RecordStream = if args.files.is_empty() {
        line_records(
            BufReader::new(tokio::io::stdin()),
            "stdin",
            separator.clone(),
            args.skip_malformed,
        )
    } else {
        let mut inputs = Vec::with_capacity(args.files.len());
        for file in &args.files {
            let reader = BufReader::new(tokio::fs::File::open(file).await?);
            inputs.push(line_records(
                reader,
                file.clone(),
                separator.clone(),
                args.skip_malformed,
            ));
        }
        Box::pin(futures::stream::iter(inputs).flatten())
    };

    let committer = Arc::new(StagingCommitter::new(
        Arc::new(LocalDiskStore::new()),
        &args.output_root,
        fragment,
    ));
    let executor = OutputExecutor::new(
        Arc::new(KeyDirectoryRouter::from_config(&config)),
        config,
    );
    let output = match executor.execute_output_task(0, records, committer).await {
        Ok(output) => output,
        Err(e) => {
            let failure = TaskFailure::from(e);
            eprintln!("{}", failure.error);
            // EX_TEMPFAIL lets a wrapping scheduler re-run the worker
            std::process::exit(if failure.retryable { 75 } else { 1 });
        }
    };

    for location in &output.published {
        println!("{location}");
    }
    if !args.quiet {
        println!("{}", output.summary);
    }
    Ok(())
}

fn parse_valid_file(file: &str) -> std::result::Result<String, String> {
    if Path::new(file).is_file() {
        Ok(file.to_string())
    } else {
        Err(format!("Invalid file '{file}'"))
    }
}

fn parse_max_open_streams(size: &str) -> std::result::Result<usize, String> {
    match size.parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(format!("Invalid max open streams '{size}'")),
    }
}

fn parse_setting(setting: &str) -> std::result::Result<(String, String), String> {
    match setting.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid setting '{setting}', expected key=value")),
    }
}
