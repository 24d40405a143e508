use clap::Parser;
use proxmox_node_source::config::{
    ENV_DEFAULT_USERNAME, ENV_HOST, ENV_INCLUDE_CONTAINERS, ENV_INCLUDE_VMS, ENV_NODE_FILTER,
    ENV_OUTPUT_FORMAT, ENV_PASSWORD, ENV_PASSWORD_STORAGE_PATH, ENV_PORT, ENV_TIMEOUT, ENV_USER,
    ENV_VERIFY_SSL,
};
use proxmox_node_source::{Cli, ConfigError, OutputFormat, Settings};
use std::collections::HashMap;
use std::time::Duration;

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["proxmox-node-source"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("valid arguments")
}

fn resolve(args: &[&str], env: &[(&str, &str)]) -> Result<Settings, ConfigError> {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::resolve(&cli(args), |name| env.get(name).cloned())
}

const CREDENTIALS: [&str; 6] = [
    "--proxmox-host",
    "pve.example.com",
    "--proxmox-user",
    "root@pam",
    "--proxmox-password",
    "secret",
];

#[test]
fn test_defaults_from_cli_credentials() {
    let settings = resolve(&CREDENTIALS, &[]).expect("settings");
    assert_eq!(settings.host, "pve.example.com");
    assert_eq!(settings.user, "root@pam");
    assert_eq!(settings.password, "secret");
    assert_eq!(settings.port, 8006);
    assert!(!settings.verify_ssl);
    assert!(settings.include_vms);
    assert!(settings.include_containers);
    assert_eq!(settings.default_username, "root");
    assert_eq!(settings.output_format, OutputFormat::Yaml);
    assert_eq!(settings.node_filter, "");
    assert_eq!(settings.timeout, Duration::from_secs(30));
}

#[test]
fn test_environment_overrides_cli() {
    let settings = resolve(
        &CREDENTIALS,
        &[
            (ENV_HOST, "10.0.0.5"),
            (ENV_USER, "rundeck@pve"),
            (ENV_PORT, "443"),
            (ENV_OUTPUT_FORMAT, "xml"),
            (ENV_NODE_FILTER, "proxmox_status: running"),
            (ENV_DEFAULT_USERNAME, "ansible"),
            (ENV_TIMEOUT, "5"),
        ],
    )
    .expect("settings");
    assert_eq!(settings.host, "10.0.0.5");
    assert_eq!(settings.user, "rundeck@pve");
    assert_eq!(settings.port, 443);
    assert_eq!(settings.output_format, OutputFormat::Xml);
    assert_eq!(settings.node_filter, "proxmox_status: running");
    assert_eq!(settings.default_username, "ansible");
    assert_eq!(settings.timeout, Duration::from_secs(5));
}

#[test]
fn test_empty_environment_values_are_unset() {
    let settings = resolve(&CREDENTIALS, &[(ENV_HOST, ""), (ENV_PORT, "  ")]).expect("settings");
    assert_eq!(settings.host, "pve.example.com");
    assert_eq!(settings.port, 8006);
}

#[test]
fn test_password_precedence() {
    let settings = resolve(
        &[
            "--proxmox-host",
            "pve",
            "--proxmox-user",
            "root@pam",
            "--proxmox-password",
            "cli-password",
            "--proxmox-password-storage-path",
            "cli-storage",
        ],
        &[],
    )
    .expect("settings");
    assert_eq!(settings.password, "cli-storage");

    let settings = resolve(&CREDENTIALS, &[(ENV_PASSWORD, "env-password")]).expect("settings");
    assert_eq!(settings.password, "env-password");

    let settings = resolve(
        &CREDENTIALS,
        &[
            (ENV_PASSWORD, "env-password"),
            (ENV_PASSWORD_STORAGE_PATH, "env-storage"),
        ],
    )
    .expect("settings");
    assert_eq!(settings.password, "env-storage");
}

#[test]
fn test_cli_password_is_trimmed() {
    let settings = resolve(
        &[
            "--proxmox-host",
            "pve",
            "--proxmox-user",
            "root@pam",
            "--proxmox-password",
            "  padded  ",
        ],
        &[],
    )
    .expect("settings");
    assert_eq!(settings.password, "padded");
}

#[test]
fn test_missing_required_settings() {
    assert!(matches!(
        resolve(&[], &[]),
        Err(ConfigError::Missing(_, ENV_HOST))
    ));
    assert!(matches!(
        resolve(&["--proxmox-host", "pve"], &[]),
        Err(ConfigError::Missing(_, ENV_USER))
    ));
    assert!(matches!(
        resolve(&["--proxmox-host", "pve", "--proxmox-user", "root@pam"], &[]),
        Err(ConfigError::Missing(_, ENV_PASSWORD))
    ));
}

#[test]
fn test_invalid_port_and_timeout() {
    let err = resolve(&CREDENTIALS, &[(ENV_PORT, "eighty")]).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { name: ENV_PORT, .. }));

    let err = resolve(&CREDENTIALS, &[(ENV_TIMEOUT, "-1")]).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { name: ENV_TIMEOUT, .. }));
}

#[test]
fn test_unknown_output_format_from_env_falls_back_to_json() {
    let settings = resolve(&CREDENTIALS, &[(ENV_OUTPUT_FORMAT, "toml")]).expect("settings");
    assert_eq!(settings.output_format, OutputFormat::Json);
}

#[test]
fn test_include_flags() {
    let mut args = CREDENTIALS.to_vec();
    args.push("--no-vms");
    let settings = resolve(&args, &[]).expect("settings");
    assert!(!settings.include_vms);
    assert!(settings.include_containers);

    let settings = resolve(&CREDENTIALS, &[(ENV_INCLUDE_CONTAINERS, "false")]).expect("settings");
    assert!(settings.include_vms);
    assert!(!settings.include_containers);

    let settings = resolve(&CREDENTIALS, &[(ENV_INCLUDE_VMS, "")]).expect("settings");
    assert!(settings.include_vms);

    let mut args = CREDENTIALS.to_vec();
    args.extend(["--include-containers-flag", "no"]);
    let settings = resolve(&args, &[]).expect("settings");
    assert!(!settings.include_containers);
}

#[test]
fn test_no_flags_beat_environment() {
    let mut args = CREDENTIALS.to_vec();
    args.push("--no-containers");
    let settings = resolve(&args, &[(ENV_INCLUDE_CONTAINERS, "true")]).expect("settings");
    assert!(!settings.include_containers);
}

#[test]
fn test_verify_ssl_sources() {
    let settings = resolve(&CREDENTIALS, &[(ENV_VERIFY_SSL, "yes")]).expect("settings");
    assert!(settings.verify_ssl);

    let mut args = CREDENTIALS.to_vec();
    args.push("--verify-ssl");
    let settings = resolve(&args, &[(ENV_VERIFY_SSL, "false")]).expect("settings");
    assert!(settings.verify_ssl);

    let settings = resolve(&CREDENTIALS, &[(ENV_VERIFY_SSL, "maybe")]).expect("settings");
    assert!(!settings.verify_ssl);
}

#[test]
fn test_debug_output_redacts_password() {
    let settings = resolve(&CREDENTIALS, &[]).expect("settings");
    let debug = format!("{settings:?}");
    assert!(!debug.contains("secret"));
    assert!(debug.contains("<redacted>"));
}
