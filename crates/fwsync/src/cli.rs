//! Clap derive structures for the `fwsync` CLI.

use clap::{Args, Parser, Subcommand};
use fwsync_core::model::RecordId;

/// fwsync - keep cloud firewall rules pointed at your public IP
#[derive(Debug, Parser)]
#[command(
    name = "fwsync",
    version,
    about = "Manage IP-following cloud firewall rules from the command line",
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

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Console API base URL
    #[arg(
        long,
        env = "FWSYNC_API_URL",
        default_value = "http://127.0.0.1:8080/api/v1",
        global = true
    )]
    pub api_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "FWSYNC_TIMEOUT_SECS", default_value = "30", global = true)]
    pub timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FWSYNC_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage firewall rules
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Manage cloud provider configs
    #[command(subcommand)]
    Configs(ConfigsCommand),

    /// List known providers and their service subtypes
    Providers,

    /// List the regions of a provider
    Regions {
        /// Provider key (e.g. Aliyun)
        provider: String,
    },

    /// Show or change the IP-check settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List rules
    List,

    /// Show how a port specification would be created, without writing
    Preview(RuleTargetArgs),

    /// Create one or more rules from a port specification
    Add {
        #[command(flatten)]
        target: RuleTargetArgs,

        /// Operator remark
        #[arg(long)]
        remark: String,

        /// Create the rule disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Edit an existing rule (never splits)
    Edit {
        /// Rule id
        id: RecordId,

        /// New remark
        #[arg(long)]
        remark: Option<String>,

        /// New cloud config
        #[arg(long)]
        config: Option<RecordId>,

        /// New port specification
        #[arg(long)]
        port: Option<String>,

        /// New protocol
        #[arg(long)]
        protocol: Option<String>,

        /// Enable or disable the rule
        #[arg(long)]
        enabled: Option<bool>,
    },

    /// Delete a rule
    Delete {
        /// Rule id
        id: RecordId,
    },

    /// Apply the current public IP to a rule now
    Execute {
        /// Rule id
        id: RecordId,
    },
}

#[derive(Debug, Args)]
pub struct RuleTargetArgs {
    /// Cloud config the rule belongs to
    #[arg(long)]
    pub config: RecordId,

    /// Port specification (e.g. "22", "80,443", "8000-9000")
    #[arg(long, default_value = "")]
    pub port: String,

    /// Protocol (TCP, UDP, ICMP, ALL)
    #[arg(long, default_value = "TCP")]
    pub protocol: String,
}

#[derive(Debug, Subcommand)]
pub enum ConfigsCommand {
    /// List cloud configs
    List,

    /// Register a cloud config
    Add(ConfigArgs),

    /// Edit a cloud config; omit --secret-key to keep the stored one
    Edit {
        /// Config id
        id: RecordId,

        #[command(flatten)]
        fields: ConfigArgs,
    },

    /// Delete a cloud config
    Delete {
        /// Config id
        id: RecordId,
    },

    /// Check a config's credentials against the provider
    Test {
        /// Config id
        id: RecordId,
    },
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Provider key (Aliyun, TencentCloud, HuaweiCloud, ...)
    #[arg(long)]
    pub provider: String,

    /// Region code
    #[arg(long)]
    pub region: String,

    /// Instance or security-group id
    #[arg(long)]
    pub instance: String,

    /// Access key id
    #[arg(long)]
    pub secret_id: String,

    /// Access key secret
    #[arg(long, env = "FWSYNC_SECRET_KEY", hide_env_values = true, default_value = "")]
    pub secret_key: String,

    /// Service subtype value
    #[arg(long = "type")]
    pub service_type: Option<u32>,

    /// Region project id (HuaweiCloud)
    #[arg(long, default_value = "")]
    pub project_id: String,

    /// Description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Mark as the default config
    #[arg(long)]
    pub default: bool,

    /// Register the config disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show settings and the current public IP
    Show,

    /// Change settings
    Set {
        /// Service returning the public IP as plain text
        #[arg(long)]
        ip_fetch_url: Option<String>,

        /// Minutes between IP checks
        #[arg(long)]
        interval: Option<u32>,

        /// Enable or disable the scheduled check
        #[arg(long)]
        cron_enabled: Option<bool>,
    },

    /// Ask the backend to re-check the public IP now
    Sync,

    /// Restore and save the default settings
    Reset,
}
