//! Clap derive structures for the `camlink` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use camlink_core::{AuthMode, Vendor};
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// camlink -- detect, inspect and configure IP cameras across vendors
#[derive(Debug, Parser)]
#[command(
    name = "camlink",
    version,
    about = "Detect, inspect and configure IP cameras from the command line",
    long_about = "Talks to Axis (VAPIX), Hikvision (ISAPI), Dahua (CGI) and ONVIF cameras\n\
        through one vendor-neutral model. The vendor is detected automatically\n\
        unless given with --vendor or in a profile.",
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
    /// Camera profile to use
    #[arg(long, short = 'p', env = "CAMLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Camera address (overrides profile)
    #[arg(long, short = 'H', env = "CAMLINK_HOST", global = true)]
    pub host: Option<String>,

    /// HTTP port; 443 selects HTTPS
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Camera username
    #[arg(long, short = 'u', env = "CAMLINK_USERNAME", global = true)]
    pub username: Option<String>,

    /// Camera password
    #[arg(long, env = "CAMLINK_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// HTTP authentication scheme (basic, digest)
    #[arg(long = "auth", global = true)]
    pub auth_mode: Option<AuthMode>,

    /// Skip detection and speak this vendor's protocol
    #[arg(long, global = true)]
    pub vendor: Option<Vendor>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAMLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Load/apply timeout in seconds
    #[arg(long, env = "CAMLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
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
    /// Detect which protocol the camera speaks and test credentials
    Check,

    /// Read identity, network and video settings
    #[command(alias = "show")]
    Info,

    /// Change IPv4 settings
    #[command(alias = "net")]
    Network(NetworkArgs),

    /// Change time synchronisation settings
    Ntp(NtpArgs),

    /// Print RTSP stream URLs (no request is made)
    Streams(StreamsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NETWORK
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Assign a static IPv4 configuration (only differing fields are written)
    Set(NetworkSetArgs),
}

#[derive(Debug, Args)]
pub struct NetworkSetArgs {
    /// New IPv4 address
    #[arg(long)]
    pub ip: String,

    /// Subnet mask, dotted or as a prefix length
    #[arg(long, default_value = "255.255.255.0")]
    pub mask: String,

    /// Default gateway
    #[arg(long, short = 'g', default_value = "")]
    pub gateway: String,

    /// Primary DNS server
    #[arg(long)]
    pub dns1: Option<String>,

    /// Secondary DNS server
    #[arg(long)]
    pub dns2: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NTP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NtpArgs {
    #[command(subcommand)]
    pub command: NtpCommand,
}

#[derive(Debug, Subcommand)]
pub enum NtpCommand {
    /// Point the camera at an NTP server
    Set(NtpSetArgs),
}

#[derive(Debug, Args)]
pub struct NtpSetArgs {
    /// NTP server address
    pub server: String,

    /// POSIX or vendor timezone string
    #[arg(long)]
    pub timezone: Option<String>,

    /// Store the server but leave synchronisation off
    #[arg(long)]
    pub disable: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STREAMS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StreamsArgs {
    /// Video channel (1-based)
    #[arg(long, short = 'c', value_parser = clap::value_parser!(u32).range(1..))]
    pub channel: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a camera profile with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a camera password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
