pub mod cli;
pub mod config;
pub mod fetch;
pub mod filter;
pub mod node;
pub mod output;
pub mod proxmox;

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, OutputFormat, cli_parse};
pub use config::{ConfigError, Settings, parse_flag};
pub use fetch::{FetchOptions, GuestKind, fetch_nodes};
pub use filter::{FilterClause, FilterExpression, evaluate, filter_nodes, parse_filter};
pub use node::NodeRecord;
pub use output::{OutputError, render};
pub use proxmox::{ApiError, ProxmoxApi, ProxmoxClient};

/// Install the stderr log subscriber. `RUST_LOG` directives override the
/// verbosity flag.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    init_tracing(cli.verbose);

    let settings = Settings::from_env(&cli).context("Invalid configuration")?;
    tracing::debug!("Resolved settings: {:?}", settings);

    let client = match ProxmoxClient::connect(&settings) {
        Ok(client) => client,
        Err(e) => {
            if e.is_authentication() {
                proxmox::log_auth_hints(&settings);
            }
            return Err(e).with_context(|| {
                format!("Failed to connect to Proxmox at {}", settings.host)
            });
        }
    };

    let options = FetchOptions {
        include_vms: settings.include_vms,
        include_containers: settings.include_containers,
    };
    let mut nodes = fetch_nodes(&client, &options).context("Failed to fetch nodes")?;

    if settings.default_username != config::DEFAULT_USERNAME {
        node::apply_default_username(&mut nodes, &settings.default_username);
    }

    let expression = FilterExpression::parse(&settings.node_filter);
    if !expression.is_empty() {
        let before = nodes.len();
        nodes = expression.apply(&nodes);
        tracing::info!(
            "Filter '{}' kept {} of {} nodes",
            expression,
            nodes.len(),
            before
        );
    }

    let rendered = render(&nodes, settings.output_format).context("Failed to render nodes")?;
    println!("{}", rendered.trim_end());

    Ok(())
}
