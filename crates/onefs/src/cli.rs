//! Clap derive structures for the `onefs` CLI.
//!
//! Only clap and clap_complete are used here; build.rs compiles this file
//! on its own to render man pages and completions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// onefs -- issue raw requests against a OneFS cluster's platform API
#[derive(Debug, Parser)]
#[command(
    name = "onefs",
    version,
    about = "Talk to the OneFS platform API from the command line",
    long_about = "Send authenticated requests to a OneFS cluster and print the JSON reply.\n\n\
        Paths are relative to the cluster endpoint, e.g. `/platform/1/protocols/nfs/exports`.\n\
        Connection settings come from a profile in the config file, overridable by flags.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config profile to use
    #[arg(long, short = 'p', env = "ONEFS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Cluster endpoint URL (overrides profile)
    #[arg(long, short = 'e', env = "ONEFS_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Username (overrides profile)
    #[arg(long, short = 'u', env = "ONEFS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password (prefer the keyring or ONEFS_PASSWORD)
    #[arg(long, env = "ONEFS_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// How requests are authenticated
    #[arg(long, value_enum, env = "ONEFS_AUTH_MODE", global = true)]
    pub auth_mode: Option<AuthModeArg>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ONEFS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout, e.g. "30s" or "2m"
    #[arg(long, env = "ONEFS_TIMEOUT", global = true)]
    pub timeout: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthModeArg {
    /// HTTP basic auth on every request
    Basic,
    /// Log in once and send the session cookie
    Session,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a resource
    Get(RequestArgs),

    /// Create a resource
    Post(RequestArgs),

    /// Modify a resource
    Put(RequestArgs),

    /// Delete a resource
    #[command(alias = "rm")]
    Delete(RequestArgs),

    /// Show the cluster's latest platform API version
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Resource path, e.g. /platform/1/protocols/nfs/exports
    pub path: String,

    /// Resource id appended after the path
    #[arg(long)]
    pub id: Option<String>,

    /// Query parameter as key=value (repeatable, order preserved)
    #[arg(long = "param", short = 'q', value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Extra request header as Name:Value (repeatable)
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Inline JSON request body
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the JSON request body from a file
    #[arg(long, short = 'f', value_name = "FILE")]
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
