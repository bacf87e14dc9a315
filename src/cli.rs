//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use vscod_core::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use vscod_core::marketplace::{DEFAULT_MARKETPLACE_URL, DEFAULT_UPDATE_URL};
use vscod_core::{Build, DEFAULT_CONCURRENCY, Platform};

/// Mirror VS Code builds and marketplace extensions for offline machines.
///
/// The output directory mirrors the shape of the configuration: every nested
/// key becomes a directory level, every extension id a `.vsix` file.
#[derive(Parser, Debug)]
#[command(name = "vscod")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, global = true, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// HTTP connect timeout in seconds
    #[arg(long, global = true, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: u64,

    /// Longest idle gap between body reads, in seconds
    #[arg(long, global = true, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout: u64,

    /// Extension marketplace base URL
    #[arg(long, global = true, default_value = DEFAULT_MARKETPLACE_URL)]
    pub marketplace_url: String,

    /// Editor update service base URL
    #[arg(long, global = true, default_value = DEFAULT_UPDATE_URL)]
    pub update_url: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download editor builds and/or extensions
    Download {
        #[command(subcommand)]
        target: DownloadTarget,
    },
    /// List supported platform and build identifiers
    ListOpts(ListOptsArgs),
}

/// What to download.
#[derive(Subcommand, Debug)]
pub enum DownloadTarget {
    /// Everything described by a JSON configuration file
    Config {
        /// Path to the configuration file
        config: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Extensions by id (`publisher.name` or `publisher.name@version`)
    Extensions {
        /// Extension ids
        #[arg(required = true)]
        ids: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Editor installers or archives
    Editor {
        /// Platforms to download (see `vscod list-opts --platforms`)
        #[arg(required = true, value_parser = parse_platform)]
        platforms: Vec<Platform>,

        /// Release channel
        #[arg(short, long, default_value = "stable", value_parser = parse_build)]
        build: Build,

        /// Editor version, or `latest`
        #[arg(short = 'r', long = "release", default_value = "latest")]
        release: String,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Shared output directory flag.
#[derive(ClapArgs, Debug)]
pub struct OutputArgs {
    /// Root directory of the mirrored tree
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

/// `list-opts` flags; both lists are printed when neither is given.
#[derive(ClapArgs, Debug)]
pub struct ListOptsArgs {
    /// Print supported platforms
    #[arg(short, long)]
    pub platforms: bool,

    /// Print supported builds
    #[arg(short, long)]
    pub builds: bool,
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    value.parse().map_err(|e: vscod_core::ConfigError| e.to_string())
}

fn parse_build(value: &str) -> Result<Build, String> {
    value.parse().map_err(|e: vscod_core::ConfigError| e.to_string())
}
