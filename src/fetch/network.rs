use super::{GuestKind, agent_enabled};
use crate::proxmox::ProxmoxApi;
use serde_json::{Map, Value};

/// Values of `ip=` that do not name a static address
const NON_ADDRESSES: [&str; 4] = ["dhcp", "dhcp6", "manual", "auto"];

/// Best-effort address for a guest.
///
/// The guest agent is authoritative for running QEMU guests; otherwise the
/// static network configuration is used.
pub(super) fn discover_address(
    api: &impl ProxmoxApi,
    guest_path: &str,
    kind: GuestKind,
    running: bool,
    config: &Map<String, Value>,
) -> Option<String> {
    if kind == GuestKind::Qemu && running && config.get("agent").is_some_and(agent_enabled) {
        match api.get(&format!("{guest_path}/agent/network-get-interfaces")) {
            Ok(data) => {
                if let Some(address) = address_from_interfaces(&data) {
                    return Some(address);
                }
            }
            Err(e) => tracing::debug!("Guest agent network data unavailable for {}: {}", guest_path, e),
        }
    }

    address_from_config(config)
}

/// First usable address reported by the guest agent.
///
/// Loopback interfaces are skipped, as are loopback and link-local
/// addresses. Addresses are taken in reported order.
pub fn address_from_interfaces(data: &Value) -> Option<String> {
    let interfaces = data.get("result").unwrap_or(data).as_array()?;

    for interface in interfaces {
        let name = interface.get("name").and_then(Value::as_str).unwrap_or("");
        if name.starts_with("lo") {
            continue;
        }
        let Some(addresses) = interface.get("ip-addresses").and_then(Value::as_array) else {
            continue;
        };
        for entry in addresses {
            let address = entry.get("ip-address").and_then(Value::as_str).unwrap_or("");
            let family = entry
                .get("ip-address-type")
                .and_then(Value::as_str)
                .unwrap_or("");
            let usable = match family {
                "ipv4" => !address.starts_with("127.") && !address.starts_with("169.254."),
                "ipv6" => !address.starts_with("::1") && !address.starts_with("fe80:"),
                _ => false,
            };
            if usable && !address.is_empty() {
                return Some(address.to_string());
            }
        }
    }

    None
}

/// Static address from the guest config.
///
/// `ipconfig0` is checked first; then every `net*`/`ipconfig*` key in sorted
/// order whose `ip=` option carries a prefix length.
pub fn address_from_config(config: &Map<String, Value>) -> Option<String> {
    if let Some(address) = config
        .get("ipconfig0")
        .and_then(Value::as_str)
        .and_then(ip_option)
        .and_then(strip_prefix_len)
    {
        return Some(address);
    }

    let mut keys: Vec<&String> = config
        .keys()
        .filter(|k| k.starts_with("net") || k.starts_with("ipconfig"))
        .collect();
    keys.sort();

    keys.into_iter()
        .filter_map(|key| config.get(key.as_str()).and_then(Value::as_str))
        .filter_map(ip_option)
        .filter(|ip| ip.contains('/'))
        .find_map(strip_prefix_len)
}

/// The `ip=` option of a comma-separated `key=value` list
fn ip_option(value: &str) -> Option<&str> {
    value
        .split(',')
        .filter_map(|option| option.trim().split_once('='))
        .find(|(key, _)| *key == "ip")
        .map(|(_, ip)| ip.trim())
}

fn strip_prefix_len(ip: &str) -> Option<String> {
    let address = ip.split('/').next().unwrap_or("").trim();
    if address.is_empty() || NON_ADDRESSES.contains(&address.to_ascii_lowercase().as_str()) {
        return None;
    }
    Some(address.to_string())
}
