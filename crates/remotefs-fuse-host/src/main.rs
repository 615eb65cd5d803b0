// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RemoteFS FUSE Host: Linux filesystem front end
//!
//! Mounts the tree served by a RemoteFS object server at a local path
//! using libfuse.

#[cfg(all(feature = "fuse", target_os = "linux"))]
mod adapter;
// Only the adapter consumes these outside of tests.
#[cfg_attr(not(all(feature = "fuse", target_os = "linux")), allow(dead_code))]
mod config;
#[cfg_attr(not(all(feature = "fuse", target_os = "linux")), allow(dead_code))]
mod host;

#[cfg(all(feature = "fuse", target_os = "linux"))]
use adapter::RemoteFsFuse;
use anyhow::Result;
use clap::Parser;
use config::load_config;
use remotefs_client::Endpoint;
use remotefs_logging::CliLoggingArgs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Mount a RemoteFS object server with FUSE")]
struct Args {
    /// Object server address, `<ipv4>:<port>`
    endpoint: Endpoint,

    /// Mount point for the filesystem
    mount_point: PathBuf,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Allow other users to access the filesystem
    #[arg(long)]
    allow_other: bool,

    /// Allow root to access the filesystem
    #[arg(long)]
    allow_root: bool,

    /// Auto unmount on process exit
    #[arg(long)]
    auto_unmount: bool,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.logging.clone().init("remotefs-fuse-host", false)?;

    info!("Starting RemoteFS FUSE Host");
    info!("Mount point: {}", args.mount_point.display());

    let mut config = load_config(args.endpoint, args.config.as_deref())?;
    config.client.apply_env_overrides()?;
    info!(
        endpoint = %config.client.endpoint,
        wire_format = %config.client.wire_format,
        attr_ttl_ms = config.attr_ttl_ms,
        entry_ttl_ms = config.entry_ttl_ms,
        "Configuration loaded"
    );

    #[cfg(all(feature = "fuse", target_os = "linux"))]
    {
        use anyhow::Context;
        use remotefs_client::RemoteFsClient;

        let client = RemoteFsClient::from_config(&config.client);
        let filesystem = RemoteFsFuse::new(client, &config);

        let mut mount_options = vec![
            fuser::MountOption::FSName("remotefs".to_string()),
            fuser::MountOption::Subtype("remotefs".to_string()),
        ];

        if args.allow_other {
            mount_options.push(fuser::MountOption::AllowOther);
        }

        if args.allow_root {
            mount_options.push(fuser::MountOption::AllowRoot);
        }

        if args.auto_unmount {
            mount_options.push(fuser::MountOption::AutoUnmount);
        }

        info!("Mounting filesystem...");
        fuser::mount2(filesystem, &args.mount_point, &mount_options)
            .with_context(|| format!("failed to mount at {}", args.mount_point.display()))?;
        info!("RemoteFS unmounted");
    }

    #[cfg(not(all(feature = "fuse", target_os = "linux")))]
    {
        let _ = (args.allow_other, args.allow_root, args.auto_unmount);
        tracing::warn!("FUSE support not compiled in. This binary is for testing only.");
        info!("To enable FUSE support, compile with: cargo build --features fuse");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_endpoint_and_mount_point() {
        let args = Args::try_parse_from([
            "remotefs-fuse-host",
            "127.0.0.1:9000",
            "/mnt/remote",
            "--auto-unmount",
        ])
        .unwrap();
        assert_eq!(args.endpoint.port(), 9000);
        assert_eq!(args.mount_point, PathBuf::from("/mnt/remote"));
        assert!(args.auto_unmount);
        assert!(!args.allow_other);
    }

    #[test]
    fn test_args_reject_endpoint_without_port() {
        assert!(Args::try_parse_from(["remotefs-fuse-host", "127.0.0.1", "/mnt/remote"]).is_err());
        assert!(
            Args::try_parse_from(["remotefs-fuse-host", "127.0.0.1:", "/mnt/remote"]).is_err()
        );
    }
}
