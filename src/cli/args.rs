//! Command-line argument parsing

use crate::config::{CatalogQuery, DEFAULT_MAX_ENTRIES, DEFAULT_REGISTRY, REGISTRY_ENV, RegistryConfig};
use clap::{Parser, Subcommand};

/// Usage examples shown after `--help`
const EXAMPLES: &str = "\
Examples:
  # List every repository of the local registry
  registry-sweeper images list

  # Repositories containing 'app', with their tags
  registry-sweeper -r https://registry.example.com images ls --like app --tags

  # Delete two tags
  registry-sweeper images delete app-a:v1 app-b:old

  # Select the registry through the environment
  export SWEEPER_REGISTRY=https://registry.example.com
  registry-sweeper img l -e 100";

#[derive(Parser, Debug)]
#[command(name = "registry-sweeper")]
#[command(about = "Browse and prune images stored in a Docker registry")]
#[command(version, author)]
#[command(after_help = EXAMPLES)]
pub struct Args {
    /// Registry base URL
    #[arg(
        long = "registry",
        short = 'r',
        env = REGISTRY_ENV,
        default_value = DEFAULT_REGISTRY,
        global = true,
        help = "Registry base URL"
    )]
    pub registry: String,

    /// Timeout in seconds for network operations
    #[arg(
        long = "timeout",
        default_value = "30",
        global = true,
        help = "Timeout for network operations in seconds"
    )]
    pub timeout: u64,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        global = true,
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    /// Verbose output
    #[arg(
        long = "verbose",
        short = 'v',
        global = true,
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        conflicts_with = "verbose",
        help = "Print results only"
    )]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Work with images stored in the registry
    #[command(visible_aliases = ["img", "image", "i"])]
    Images {
        #[command(subcommand)]
        action: ImagesCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ImagesCommand {
    /// List repositories, optionally with their tags
    #[command(visible_aliases = ["l", "ls"])]
    List {
        #[arg(
            long = "like",
            default_value = "",
            help = "Only show repositories whose name contains this text"
        )]
        like: String,

        #[arg(
            long = "max-entries",
            short = 'e',
            default_value_t = DEFAULT_MAX_ENTRIES,
            help = "Maximum number of catalog entries to fetch"
        )]
        max_entries: usize,

        #[arg(long = "tags", help = "List every repository:tag instead of repositories")]
        tags: bool,
    },

    /// Delete images by repository:tag
    #[command(visible_aliases = ["d", "del"])]
    Delete {
        #[arg(required = true, value_name = "REPOSITORY:TAG")]
        refs: Vec<String>,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new(self.registry.as_str())
            .with_timeout(self.timeout)
            .with_skip_tls(self.skip_tls)
    }
}

impl ImagesCommand {
    /// Catalog parameters of a `list` command
    pub fn catalog_query(&self) -> Option<CatalogQuery> {
        match self {
            ImagesCommand::List {
                like, max_entries, ..
            } => Some(CatalogQuery::new(like.as_str(), *max_entries)),
            ImagesCommand::Delete { .. } => None,
        }
    }
}
