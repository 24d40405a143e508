use super::{GuestKind, agent_enabled, value_to_string};
use crate::proxmox::ProxmoxApi;
use serde_json::{Map, Value};

/// Guest agent `get-osinfo` fields and the attributes they populate
const AGENT_OS_FIELDS: [(&str, &str); 7] = [
    ("name", "os_name"),
    ("version", "os_version"),
    ("version-id", "os_version_id"),
    ("pretty-name", "os_pretty_name"),
    ("id", "os_id"),
    ("kernel-release", "os_kernel"),
    ("kernel-version", "os_kernel_version"),
];

/// Operating system attributes for a guest.
///
/// Running QEMU guests with the guest agent enabled report detailed OS data;
/// containers derive a distribution name from their config. Without an
/// `os_name`, the Proxmox `ostype` is mapped to a readable `os_family`.
pub fn os_attributes(
    api: &impl ProxmoxApi,
    guest_path: &str,
    kind: GuestKind,
    running: bool,
    config: &Map<String, Value>,
) -> Vec<(&'static str, String)> {
    let mut attributes = Vec::new();
    let ostype = config
        .get("ostype")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    if let Some(ostype) = ostype {
        attributes.push(("proxmox_ostype", ostype.to_string()));
    }

    match kind {
        GuestKind::Qemu if running && config.get("agent").is_some_and(agent_enabled) => {
            match api.get(&format!("{guest_path}/agent/get-osinfo")) {
                Ok(data) => {
                    // The agent wraps its answer in `result`
                    let info = data.get("result").unwrap_or(&data);
                    for (field, attribute) in AGENT_OS_FIELDS {
                        if let Some(value) = info.get(field).and_then(value_to_string) {
                            attributes.push((attribute, value));
                        }
                    }
                }
                Err(e) => tracing::debug!("Guest agent OS info unavailable for {}: {}", guest_path, e),
            }
        }
        GuestKind::Lxc => {
            if let Some(ostype) = ostype {
                attributes.push(("os_name", distribution_name(ostype)));
            }
            if let Some(hostname) = config
                .get("hostname")
                .and_then(Value::as_str)
                .filter(|h| !h.is_empty())
            {
                attributes.push(("os_hostname", hostname.to_string()));
            }
        }
        GuestKind::Qemu => {}
    }

    let has_name = attributes.iter().any(|(key, _)| *key == "os_name");
    if let (false, Some(ostype)) = (has_name, ostype) {
        attributes.push(("os_family", os_family(ostype)));
    }

    attributes
}

/// LXC `ostype` to distribution name
fn distribution_name(ostype: &str) -> String {
    match ostype.to_lowercase().as_str() {
        "ubuntu" => "Ubuntu".to_string(),
        "debian" => "Debian".to_string(),
        "centos" => "CentOS".to_string(),
        "fedora" => "Fedora".to_string(),
        "archlinux" => "Arch Linux".to_string(),
        "alpine" => "Alpine Linux".to_string(),
        "opensuse" => "openSUSE".to_string(),
        "gentoo" => "Gentoo".to_string(),
        other => capitalize(other),
    }
}

/// QEMU `ostype` to a readable OS family
fn os_family(ostype: &str) -> String {
    match ostype.to_lowercase().as_str() {
        "l26" => "Linux".to_string(),
        "win7" => "Windows 7".to_string(),
        "win8" => "Windows 8".to_string(),
        "win10" => "Windows 10".to_string(),
        "win11" => "Windows 11".to_string(),
        "w2k" => "Windows 2000".to_string(),
        "w2k3" => "Windows 2003".to_string(),
        "w2k8" => "Windows 2008".to_string(),
        "wvista" => "Windows Vista".to_string(),
        "winxp" => "Windows XP".to_string(),
        "other" => "Other".to_string(),
        _ => ostype.to_uppercase(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
