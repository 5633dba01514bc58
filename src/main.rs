// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Command-line front end: describe the services or replay one message
// through a filter service.
use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use filter_shim::config::Config;
use filter_shim::engine_core::models::Header;
use filter_shim::registry::ServiceRegistry;
use filter_shim::replay::{drive, ReplayHost};
use filter_shim::service::{Service, ServiceKind};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file (defaults to the environment)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter service socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Verbose transaction logging
    #[arg(long)]
    debug: bool,

    /// Deadline for each channel operation in milliseconds, 0 disables it
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the registered services
    Describe,
    /// Replay a request through a REQMOD transaction
    Reqmod {
        /// File holding the raw request header
        #[arg(long)]
        header: PathBuf,
        /// File holding the request body
        #[arg(long)]
        body: Option<PathBuf>,
        /// Size of the virgin body chunks handed to the adapter
        #[arg(long, default_value_t = 1024)]
        chunk_size: usize,
    },
    /// Replay a response through a RESPMOD transaction
    Respmod {
        /// File holding the raw header of the request that caused the response
        #[arg(long)]
        cause: PathBuf,
        /// File holding the raw response header
        #[arg(long)]
        header: PathBuf,
        /// File holding the response body
        #[arg(long)]
        body: Option<PathBuf>,
        #[arg(long, default_value_t = 1024)]
        chunk_size: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    install_panic_hook();

    let mut config = match &cli.config {
        Some(path) => Config::from_yaml_file(path)?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };
    if let Some(socket) = &cli.socket {
        config.listen_socket = Some(socket.clone());
    }
    if cli.debug {
        config.debug = true;
    }
    if let Some(ms) = cli.timeout_ms {
        config.io_timeout_ms = ms;
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to init tracing: {}", e);
    }

    match cli.command {
        Command::Describe => {
            let registry = ServiceRegistry::with_builtin();
            let descriptions: Vec<_> = registry.services().iter().map(Service::describe).collect();
            println!("{}", serde_json::to_string_pretty(&descriptions)?);
        }
        Command::Reqmod {
            header,
            body,
            chunk_size,
        } => {
            let host = ReplayHost::request(read_header(&header)?, read_body(body.as_deref())?);
            replay(ServiceKind::Reqmod, config, host, chunk_size).await?;
        }
        Command::Respmod {
            cause,
            header,
            body,
            chunk_size,
        } => {
            let host = ReplayHost::response(
                read_header(&cause)?,
                read_header(&header)?,
                read_body(body.as_deref())?,
            );
            replay(ServiceKind::Respmod, config, host, chunk_size).await?;
        }
    }

    Ok(())
}

async fn replay(
    kind: ServiceKind,
    config: Config,
    host: ReplayHost,
    chunk_size: usize,
) -> anyhow::Result<()> {
    let mut service = Service::new(kind);
    service.configure_with(config)?;
    service.start()?;
    info!(service = %kind, "Replaying message through {}", service.uri());

    let journal = host.journal();
    let xaction = service.make_transaction(host).await?;
    let outcome = drive(xaction, journal, chunk_size).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    service.stop();
    Ok(())
}

fn read_header(path: &Path) -> anyhow::Result<Header> {
    let image = std::fs::read(path)
        .with_context(|| format!("Failed to read header file {}", path.display()))?;
    Ok(Header::from_image(image))
}

fn read_body(path: Option<&Path>) -> anyhow::Result<Option<Bytes>> {
    path.map(|p| {
        std::fs::read(p)
            .map(Bytes::from)
            .with_context(|| format!("Failed to read body file {}", p.display()))
    })
    .transpose()
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC: {} at {}", message, location);
    }));
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let default_level: &str = if config.debug { "debug" } else { &config.log_level };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("filter_shim=debug,info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
