//! Walks the cluster and flattens every VM and container into a [`NodeRecord`]

mod network;
mod os_info;

pub use network::{address_from_config, address_from_interfaces};
pub use os_info::os_attributes;

use crate::node::NodeRecord;
use crate::proxmox::{ApiError, ProxmoxApi};
use serde_json::{Map, Value};

/// Guest types hosted by a Proxmox node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestKind {
    Qemu,
    Lxc,
}

impl GuestKind {
    /// Path segment and `proxmox_type` value
    pub fn api_name(self) -> &'static str {
        match self {
            GuestKind::Qemu => "qemu",
            GuestKind::Lxc => "lxc",
        }
    }

    fn label(self) -> &'static str {
        match self {
            GuestKind::Qemu => "VM",
            GuestKind::Lxc => "Container",
        }
    }

    fn fallback_name(self, vmid: &str) -> String {
        match self {
            GuestKind::Qemu => format!("vm-{vmid}"),
            GuestKind::Lxc => format!("ct-{vmid}"),
        }
    }

    fn type_tags(self) -> [&'static str; 2] {
        match self {
            GuestKind::Qemu => ["vm", "qemu"],
            GuestKind::Lxc => ["container", "lxc"],
        }
    }

    /// Config keys copied verbatim when set, with their attribute names
    fn config_attributes(self) -> &'static [(&'static str, &'static str)] {
        match self {
            GuestKind::Qemu => &[
                ("cores", "proxmox_cores"),
                ("sockets", "proxmox_sockets"),
                ("memory", "proxmox_memory_mb"),
                ("maxmem", "proxmox_maxmem_bytes"),
                ("maxdisk", "proxmox_maxdisk_bytes"),
            ],
            GuestKind::Lxc => &[
                ("cores", "proxmox_cores"),
                ("memory", "proxmox_memory_mb"),
                ("maxmem", "proxmox_maxmem_bytes"),
                ("maxdisk", "proxmox_maxdisk_bytes"),
                ("swap", "proxmox_swap_mb"),
            ],
        }
    }
}

/// Runtime metrics reported by `status/current` for running guests
const STATUS_ATTRIBUTES: [(&str, &str); 11] = [
    ("uptime", "proxmox_uptime_seconds"),
    ("cpu", "proxmox_cpu_usage"),
    ("mem", "proxmox_mem_used_bytes"),
    ("maxmem", "proxmox_maxmem_bytes"),
    ("cpus", "proxmox_cpus"),
    ("maxcpu", "proxmox_maxcpu"),
    ("netin", "proxmox_netin_bytes"),
    ("netout", "proxmox_netout_bytes"),
    ("diskread", "proxmox_diskread_bytes"),
    ("diskwrite", "proxmox_diskwrite_bytes"),
    ("disk", "proxmox_disk_used_bytes"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub include_vms: bool,
    pub include_containers: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            include_vms: true,
            include_containers: true,
        }
    }
}

impl FetchOptions {
    fn kinds(&self) -> Vec<GuestKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.include_vms {
            kinds.push(GuestKind::Qemu);
        }
        if self.include_containers {
            kinds.push(GuestKind::Lxc);
        }
        kinds
    }
}

/// Fetch every guest in the cluster as a node record.
///
/// Failing to list the cluster nodes is fatal. A failure listing one host's
/// guests is logged and that host is skipped; failures on per-guest detail
/// calls only drop the attributes they would have provided.
pub fn fetch_nodes(
    api: &impl ProxmoxApi,
    options: &FetchOptions,
) -> Result<Vec<NodeRecord>, ApiError> {
    let cluster = api.get("/nodes")?;
    let hosts = cluster.as_array().ok_or_else(|| ApiError::Decode {
        path: "/nodes".to_string(),
        reason: "expected a list of cluster nodes".to_string(),
    })?;

    let mut records = Vec::new();
    for host in hosts {
        let Some(host_name) = host.get("node").and_then(Value::as_str) else {
            tracing::warn!("Skipping cluster node entry without a name: {}", host);
            continue;
        };

        for kind in options.kinds() {
            let path = format!("/nodes/{host_name}/{}", kind.api_name());
            let guests = match api.get(&path) {
                Ok(Value::Array(guests)) => guests,
                Ok(other) => {
                    tracing::warn!("Unexpected guest list from {}: {}", path, other);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        "Error fetching {} from node {}: {}",
                        kind.api_name(),
                        host_name,
                        e
                    );
                    continue;
                }
            };

            for guest in &guests {
                match describe_guest(api, host_name, kind, guest) {
                    Some(record) => records.push(record),
                    None => tracing::warn!("Skipping guest without a vmid on {}: {}", host_name, guest),
                }
            }
        }
    }

    tracing::info!("Fetched {} nodes from Proxmox", records.len());
    Ok(records)
}

/// Flatten one guest from a `/nodes/{node}/{kind}` listing
fn describe_guest(
    api: &impl ProxmoxApi,
    host: &str,
    kind: GuestKind,
    guest: &Value,
) -> Option<NodeRecord> {
    let vmid = guest.get("vmid").and_then(value_to_string)?;
    let name = guest
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| kind.fallback_name(&vmid));
    let status = guest
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let running = status == "running";

    let guest_path = format!("/nodes/{host}/{}/{vmid}", kind.api_name());
    let config = fetch_object(api, &format!("{guest_path}/config"));
    let status_data = if running {
        fetch_object(api, &format!("{guest_path}/status/current"))
    } else {
        Map::new()
    };

    let os_info = os_attributes(api, &guest_path, kind, running, &config);
    let ip_address = network::discover_address(api, &guest_path, kind, running, &config);

    let mut tags = vec!["proxmox".to_string()];
    tags.extend(kind.type_tags().iter().map(|t| t.to_string()));
    tags.push(host.to_string());
    if let Some(own) = config.get("tags").and_then(Value::as_str) {
        tags.extend(
            own.split([';', ','])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
    }

    let description = config
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Proxmox {} {vmid} on node {host}", kind.label()));

    let mut record = NodeRecord::new();
    record.insert("nodename", name.as_str());
    record.insert(
        "hostname",
        ip_address.clone().unwrap_or_else(|| format!("{name}.local")),
    );
    record.insert("username", "root");
    record.insert("osFamily", "unix");
    record.insert("tags", tags.join(","));
    record.insert("description", description);
    record.insert("proxmox_node", host);
    record.insert("proxmox_vmid", vmid.as_str());
    record.insert("proxmox_type", kind.api_name());
    record.insert("proxmox_status", status);
    record.insert(
        "proxmox_running_status",
        if running { "running" } else { "stopped" },
    );
    if let Some(ip) = ip_address {
        record.insert("ip_address", ip);
    }

    for (key, attribute) in kind.config_attributes() {
        if let Some(value) = truthy_string(config.get(*key)) {
            record.insert(*attribute, value);
        }
    }
    if kind == GuestKind::Qemu {
        if let Some(template) = config.get("template").filter(|v| is_truthy(v)) {
            record.insert("proxmox_template", if is_one(template) { "true" } else { "false" });
        }
        if let Some(agent) = config.get("agent").filter(|v| is_truthy(v)) {
            record.insert(
                "proxmox_agent",
                if agent_enabled(agent) { "enabled" } else { "disabled" },
            );
        }
    }
    if let Some(ostype) = truthy_string(config.get("ostype")) {
        record.insert("proxmox_ostype", ostype);
    }
    if let Some(description) = truthy_string(config.get("description")) {
        record.insert("proxmox_description", description);
    }
    if kind == GuestKind::Lxc {
        if let Some(hostname) = truthy_string(config.get("hostname")) {
            record.insert("proxmox_hostname", hostname);
        }
    }

    for (key, value) in os_info {
        record.insert(key, value);
    }

    if running {
        for (key, attribute) in STATUS_ATTRIBUTES {
            if let Some(value) = status_data.get(key).and_then(value_to_string) {
                record.insert(attribute, value);
            }
        }
    }

    Some(record)
}

/// GET a path expected to return an object; a failure is logged and yields
/// an empty map
fn fetch_object(api: &impl ProxmoxApi, path: &str) -> Map<String, Value> {
    match api.get(path) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => {
            tracing::warn!("Skipping {}: {}", path, e);
            Map::new()
        }
    }
}

/// Render a scalar JSON value as an attribute string
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Unset, zero, false and empty values are skipped like missing keys
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn truthy_string(value: Option<&Value>) -> Option<String> {
    value.filter(|v| is_truthy(v)).and_then(value_to_string)
}

fn is_one(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_u64() == Some(1),
        Value::String(s) => s.trim() == "1",
        Value::Bool(b) => *b,
        _ => false,
    }
}

/// QEMU `agent` is either `1`/`0` or an option string such as
/// `enabled=1,fstrim_cloned_disks=1`; the leading option decides.
pub(crate) fn agent_enabled(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            let first = s.split(',').next().unwrap_or("").trim();
            matches!(first, "1" | "enabled=1")
        }
        other => is_one(other),
    }
}
