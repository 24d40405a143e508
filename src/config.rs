use crate::cli::{Cli, OutputFormat};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const ENV_HOST: &str = "RD_CONFIG_PROXMOX_HOST";
pub const ENV_USER: &str = "RD_CONFIG_PROXMOX_USER";
pub const ENV_PASSWORD: &str = "RD_CONFIG_PROXMOX_PASSWORD";
pub const ENV_PASSWORD_STORAGE_PATH: &str = "RD_CONFIG_PROXMOX_PASSWORD_STORAGE_PATH";
pub const ENV_PORT: &str = "RD_CONFIG_PROXMOX_PORT";
pub const ENV_VERIFY_SSL: &str = "RD_CONFIG_VERIFY_SSL";
pub const ENV_INCLUDE_VMS: &str = "RD_CONFIG_INCLUDE_VMS";
pub const ENV_INCLUDE_CONTAINERS: &str = "RD_CONFIG_INCLUDE_CONTAINERS";
pub const ENV_DEFAULT_USERNAME: &str = "RD_CONFIG_DEFAULT_USERNAME";
pub const ENV_OUTPUT_FORMAT: &str = "RD_CONFIG_OUTPUT_FORMAT";
pub const ENV_NODE_FILTER: &str = "RD_CONFIG_NODE_FILTER";
pub const ENV_TIMEOUT: &str = "RD_CONFIG_TIMEOUT";

pub const DEFAULT_PORT: u16 = 8006;
pub const DEFAULT_USERNAME: &str = "root";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required (set {1} or pass the matching command-line option)")]
    Missing(&'static str, &'static str),
    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Fully resolved run configuration
#[derive(Clone)]
pub struct Settings {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub verify_ssl: bool,
    pub include_vms: bool,
    pub include_containers: bool,
    pub default_username: String,
    pub output_format: OutputFormat,
    pub node_filter: String,
    pub timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("verify_ssl", &self.verify_ssl)
            .field("include_vms", &self.include_vms)
            .field("include_containers", &self.include_containers)
            .field("default_username", &self.default_username)
            .field("output_format", &self.output_format)
            .field("node_filter", &self.node_filter)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Settings {
    /// Resolve settings from the process environment and the parsed CLI
    pub fn from_env(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |name| std::env::var(name).ok())
    }

    /// Resolve settings with an explicit environment lookup.
    ///
    /// Rundeck hands plugin configuration over as `RD_CONFIG_*` variables, so
    /// non-empty environment values win over command-line arguments.
    pub fn resolve<F>(cli: &Cli, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let host = env_value(ENV_HOST)
            .or_else(|| non_empty(cli.proxmox_host.as_deref()))
            .ok_or(ConfigError::Missing("Proxmox host", ENV_HOST))?;
        let user = env_value(ENV_USER)
            .or_else(|| non_empty(cli.proxmox_user.as_deref()))
            .ok_or(ConfigError::Missing("Proxmox user", ENV_USER))?;
        let password = env_value(ENV_PASSWORD_STORAGE_PATH)
            .or_else(|| env_value(ENV_PASSWORD))
            .or_else(|| non_empty(cli.proxmox_password_storage_path.as_deref()))
            .or_else(|| non_empty(cli.proxmox_password.as_deref()))
            .ok_or(ConfigError::Missing("Proxmox password", ENV_PASSWORD))?;

        let port = match env_value(ENV_PORT) {
            Some(raw) => parse_number(ENV_PORT, &raw)?,
            None if cli.proxmox_port == 0 => DEFAULT_PORT,
            None => cli.proxmox_port,
        };

        let timeout_secs: u64 = match env_value(ENV_TIMEOUT) {
            Some(raw) => parse_number(ENV_TIMEOUT, &raw)?,
            None => cli.timeout,
        };

        let default_username = env_value(ENV_DEFAULT_USERNAME)
            .or_else(|| non_empty(Some(&cli.default_username)))
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        let output_format = match env_value(ENV_OUTPUT_FORMAT) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{} from {}; falling back to json", e, ENV_OUTPUT_FORMAT);
                OutputFormat::Json
            }),
            None => cli.output_format,
        };

        let node_filter = env_value(ENV_NODE_FILTER)
            .or_else(|| cli.node_filter.clone())
            .unwrap_or_default();

        // An explicitly set variable is used even when empty, which leaves
        // the default in place.
        let flag_source = |name: &str, fallback: &str| env(name).unwrap_or_else(|| fallback.to_string());

        let include_vms = if cli.no_vms {
            false
        } else if cli.include_vms {
            true
        } else {
            parse_flag(&flag_source(ENV_INCLUDE_VMS, &cli.include_vms_flag)).unwrap_or(true)
        };

        let include_containers = if cli.no_containers {
            false
        } else if cli.include_containers {
            true
        } else {
            parse_flag(&flag_source(
                ENV_INCLUDE_CONTAINERS,
                &cli.include_containers_flag,
            ))
            .unwrap_or(true)
        };

        let verify_ssl = cli.verify_ssl
            || parse_flag(&flag_source(ENV_VERIFY_SSL, &cli.verify_ssl_flag)).unwrap_or(false);

        Ok(Settings {
            host,
            user,
            password,
            port,
            verify_ssl,
            include_vms,
            include_containers,
            default_username,
            output_format,
            node_filter,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Parse a string boolean as passed by Rundeck.
///
/// Returns `None` for an empty value so the caller's default applies.
/// Unrecognized text counts as `false`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    let value = raw.trim().to_ascii_lowercase();
    match value.as_str() {
        "" => None,
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!("Unrecognized boolean flag value '{}', treating as false", raw);
            Some(false)
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
