//! Clap derive structures for the `habsync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// habsync -- mirror and control openHAB items from the command line
#[derive(Debug, Parser)]
#[command(
    name = "habsync",
    version,
    about = "Mirror and control openHAB items from the command line",
    long_about = "Loads the item catalog from an openHAB server, keeps watched items\n\
        in sync through polling and the WebSocket event stream, and sends\n\
        state changes back to the server.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "HABSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// openHAB base URL (overrides profile)
    #[arg(long, short = 's', env = "HABSYNC_SERVER", global = true)]
    pub server: Option<String>,

    /// API token
    #[arg(long, env = "HABSYNC_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HABSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "HABSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HABSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the item catalog
    #[command(alias = "ls")]
    Items(ItemsArgs),

    /// Show one item's state
    Get {
        /// Item name or link
        item: String,

        /// Read the state from the server instead of the loaded catalog
        #[arg(long, short = 'r')]
        refresh: bool,
    },

    /// Send a new state to an item
    Set {
        /// Item name or link
        item: String,

        /// New state, e.g. ON, 42, "21.5 °C"
        value: String,
    },

    /// Flip a switch or dimmer
    Toggle {
        /// Item name or link
        item: String,
    },

    /// Change a numeric item by a relative amount
    Dim(DimArgs),

    /// Stream state changes of items
    Watch(WatchArgs),

    /// Download an item's icon
    Icon {
        /// Item name or link
        item: String,

        /// Output file (defaults to `<item>.svg`)
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Items ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ItemsArgs {
    /// Only items of this type (Switch, Dimmer, Number, String, ...)
    #[arg(long, short = 't')]
    pub kind: Option<String>,

    /// Only items whose name or label contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Group the listing by primary group
    #[arg(long, short = 'g')]
    pub grouped: bool,
}

// ── Dim ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DimArgs {
    /// Item name or link
    pub item: String,

    /// Amount to add (negative to lower)
    #[arg(allow_negative_numbers = true)]
    pub delta: f64,

    /// Lower bound
    #[arg(long, default_value = "0")]
    pub min: f64,

    /// Upper bound
    #[arg(long, default_value = "100")]
    pub max: f64,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Item names or links to watch
    #[arg(required = true)]
    pub items: Vec<String>,

    /// Exit after this many changes
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Refresh period in seconds (overrides profile)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Poll only, without the WebSocket event stream
    #[arg(long)]
    pub no_push: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or replace a profile
    Init {
        /// openHAB base URL
        #[arg(long)]
        server: String,

        /// API token
        #[arg(long)]
        token: Option<String>,

        /// Store the token in the config file instead of the system keyring
        #[arg(long, requires = "token")]
        plaintext: bool,
    },

    /// Display current configuration (tokens masked)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Point the active profile at another server
    SetUrl {
        /// New openHAB base URL
        url: String,
    },

    /// Store an API token for the active profile in the system keyring
    SetToken {
        /// API token
        token: String,
    },

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
