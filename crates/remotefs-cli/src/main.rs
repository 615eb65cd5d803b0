// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use remotefs_client::{ClientConfig, Endpoint, RemoteFsClient, Transport};
use remotefs_logging::{CliLogLevel, CliLoggingArgs};
use remotefs_proto::{Inode, ObjectInfo, ObjectType, WireFormat, MAX_DATA_LEN, ROOT_INODE};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run single operations against a RemoteFS object server"
)]
struct Cli {
    /// Object server address, `<ipv4>:<port>`
    #[arg(long, env = "REMOTEFS_ENDPOINT")]
    endpoint: Option<Endpoint>,

    /// Client configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wire format spoken with the server (native or framed)
    #[arg(long)]
    wire_format: Option<WireFormat>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the root inode reported by the server
    Root,
    /// Resolve a name inside a directory
    Lookup {
        name: String,
        #[arg(long, default_value_t = ROOT_INODE)]
        parent: Inode,
    },
    /// List a directory (one entry per line)
    Ls {
        #[arg(default_value_t = ROOT_INODE)]
        inode: Inode,
    },
    /// Write a file's payload to stdout
    Cat { inode: Inode },
    /// Replace a file's payload from a file (use '-' for stdin)
    Put {
        inode: Inode,
        #[arg(default_value = "-")]
        file: PathBuf,
    },
    /// Create an empty file and print its inode
    Touch {
        name: String,
        #[arg(long, default_value_t = ROOT_INODE)]
        parent: Inode,
    },
    /// Create a directory and print its inode
    Mkdir {
        name: String,
        #[arg(long, default_value_t = ROOT_INODE)]
        parent: Inode,
    },
    /// Remove an empty directory
    Rmdir {
        name: String,
        #[arg(long, default_value_t = ROOT_INODE)]
        parent: Inode,
    },
    /// Add a new name for an existing file
    Ln {
        source: Inode,
        name: String,
        #[arg(long, default_value_t = ROOT_INODE)]
        parent: Inode,
    },
    /// Remove a name
    Rm {
        name: String,
        #[arg(long, default_value_t = ROOT_INODE)]
        parent: Inode,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.logging
        .clone()
        .init_with_default_level("remotefs-cli", false, CliLogLevel::Warn)?;

    let config = client_config(&cli, |key| std::env::var(key).ok())?;
    debug!(endpoint = %config.endpoint, wire_format = %config.wire_format, "client configured");
    let client = RemoteFsClient::from_config(&config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&client, cli.command, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Config file, then environment, then command-line flags.
fn client_config<F>(cli: &Cli, env: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match (&cli.config, cli.endpoint) {
        (Some(path), endpoint) => {
            let mut config = ClientConfig::load(path)?;
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            config
        }
        (None, Some(endpoint)) => ClientConfig::new(endpoint),
        (None, None) => bail!("no server endpoint: pass --endpoint or --config"),
    };
    config.apply_overrides_from(env)?;
    if let Some(wire_format) = cli.wire_format {
        config.wire_format = wire_format;
    }
    Ok(config)
}

fn print_info(out: &mut impl Write, info: ObjectInfo) -> Result<()> {
    writeln!(out, "INODE={}\tTYPE={}", info.inode, info.kind)?;
    Ok(())
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin()
            .take(MAX_DATA_LEN as u64 + 1)
            .read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    if bytes.len() > MAX_DATA_LEN {
        bail!("payload exceeds {} bytes", MAX_DATA_LEN);
    }
    Ok(bytes)
}

fn execute<T: Transport>(
    client: &RemoteFsClient<T>,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Root => {
            let inode = client.mount().context("mount failed")?;
            print_info(out, ObjectInfo::new(ObjectType::Directory, inode))?;
        }
        Command::Lookup { name, parent } => {
            let info = client
                .lookup(parent, &name)
                .with_context(|| format!("lookup of {name:?} in {parent} failed"))?;
            print_info(out, info)?;
        }
        Command::Ls { inode } => {
            let objects = client
                .list(inode)
                .with_context(|| format!("list of {inode} failed"))?;
            for object in &objects {
                writeln!(
                    out,
                    "INODE={}\tTYPE={}\tNAME={}",
                    object.info.inode, object.info.kind, object.name
                )?;
            }
        }
        Command::Cat { inode } => {
            let data = client
                .read(inode)
                .with_context(|| format!("read of {inode} failed"))?;
            out.write_all(data.as_bytes())?;
        }
        Command::Put { inode, file } => {
            let bytes = read_payload(&file)?;
            client
                .write(inode, &bytes)
                .with_context(|| format!("write to {inode} failed"))?;
            writeln!(out, "WRITE_OK\tINODE={inode}\tLENGTH={}", bytes.len())?;
        }
        Command::Touch { name, parent } => {
            let inode = client
                .create_file(parent, &name)
                .with_context(|| format!("create of {name:?} in {parent} failed"))?;
            print_info(out, ObjectInfo::new(ObjectType::File, inode))?;
        }
        Command::Mkdir { name, parent } => {
            let inode = client
                .mkdir(parent, &name)
                .with_context(|| format!("mkdir of {name:?} in {parent} failed"))?;
            print_info(out, ObjectInfo::new(ObjectType::Directory, inode))?;
        }
        Command::Rmdir { name, parent } => {
            client
                .rmdir(parent, &name)
                .with_context(|| format!("rmdir of {name:?} in {parent} failed"))?;
            writeln!(out, "RMDIR_OK")?;
        }
        Command::Ln {
            source,
            name,
            parent,
        } => {
            client
                .link(source, parent, &name)
                .with_context(|| format!("link of {source} as {name:?} failed"))?;
            writeln!(out, "LINK_OK")?;
        }
        Command::Rm { name, parent } => {
            client
                .unlink(parent, &name)
                .with_context(|| format!("unlink of {name:?} in {parent} failed"))?;
            writeln!(out, "UNLINK_OK")?;
        }
    }
    Ok(())
}
