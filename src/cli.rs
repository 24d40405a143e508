use clap::{ArgAction, Parser, ValueEnum};
use std::str::FromStr;

/// Rundeck node source for Proxmox VE: lists VMs and containers as nodes
///
/// Every option can also be supplied through the matching RD_CONFIG_*
/// environment variable, which takes precedence over the command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Proxmox hostname or IP address (RD_CONFIG_PROXMOX_HOST)
    #[arg(long)]
    pub proxmox_host: Option<String>,

    /// Proxmox user, including realm (root@pam) or API token id
    /// (root@pam!automation) (RD_CONFIG_PROXMOX_USER)
    #[arg(long)]
    pub proxmox_user: Option<String>,

    /// Proxmox password or API token secret (RD_CONFIG_PROXMOX_PASSWORD)
    #[arg(long)]
    pub proxmox_password: Option<String>,

    /// Password resolved from Rundeck key storage
    /// (RD_CONFIG_PROXMOX_PASSWORD_STORAGE_PATH)
    #[arg(long)]
    pub proxmox_password_storage_path: Option<String>,

    /// Proxmox API port (RD_CONFIG_PROXMOX_PORT)
    #[arg(long, default_value_t = 8006)]
    pub proxmox_port: u16,

    /// Verify TLS certificates
    #[arg(long)]
    pub verify_ssl: bool,

    /// Verify TLS certificates, as a true/false string (RD_CONFIG_VERIFY_SSL)
    #[arg(long, default_value = "false")]
    pub verify_ssl_flag: String,

    /// Include VMs, as a true/false string (RD_CONFIG_INCLUDE_VMS)
    #[arg(long, default_value = "true")]
    pub include_vms_flag: String,

    /// Include containers, as a true/false string (RD_CONFIG_INCLUDE_CONTAINERS)
    #[arg(long, default_value = "true")]
    pub include_containers_flag: String,

    /// Exclude VMs from the node list
    #[arg(long)]
    pub no_vms: bool,

    /// Exclude containers from the node list
    #[arg(long)]
    pub no_containers: bool,

    /// Include VMs in the node list (default)
    #[arg(long)]
    pub include_vms: bool,

    /// Include containers in the node list (default)
    #[arg(long)]
    pub include_containers: bool,

    /// Username assigned to every node (RD_CONFIG_DEFAULT_USERNAME)
    #[arg(long, default_value = "root")]
    pub default_username: String,

    /// Output format (RD_CONFIG_OUTPUT_FORMAT)
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output_format: OutputFormat,

    /// Node filter, e.g. "proxmox_status: running !tags: template"
    /// (RD_CONFIG_NODE_FILTER)
    #[arg(long)]
    pub node_filter: Option<String>,

    /// HTTP request timeout in seconds (RD_CONFIG_TIMEOUT)
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Rundeck resource model formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
    Xml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "xml" => Ok(OutputFormat::Xml),
            _ => Err(format!("invalid output format: {value}")),
        }
    }
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["proxmox-node-source"]);
        assert_eq!(cli.proxmox_port, 8006);
        assert_eq!(cli.default_username, "root");
        assert_eq!(cli.output_format, OutputFormat::Yaml);
        assert_eq!(cli.verify_ssl_flag, "false");
        assert_eq!(cli.include_vms_flag, "true");
        assert_eq!(cli.timeout, 30);
        assert!(cli.node_filter.is_none());
    }

    #[test]
    fn test_output_format_rejects_unknown_value() {
        let result = Cli::try_parse_from(["proxmox-node-source", "--output-format", "csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("yml".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert_eq!(" xml ".parse::<OutputFormat>(), Ok(OutputFormat::Xml));
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::parse_from(["proxmox-node-source", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
