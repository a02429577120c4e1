//! Network interface enumeration and classification.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Friendly interface classification, derived from the adapter name and
/// description by case-insensitive substring match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FriendlyClass {
    Ethernet,
    WiFi,
    Bluetooth,
    Loopback,
    HyperV,
    TunTap,
    Vpn,
    Other,
}

impl FriendlyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendlyClass::Ethernet => "Ethernet",
            FriendlyClass::WiFi => "WiFi",
            FriendlyClass::Bluetooth => "Bluetooth",
            FriendlyClass::Loopback => "Loopback",
            FriendlyClass::HyperV => "Hyper-V",
            FriendlyClass::TunTap => "TUN/TAP",
            FriendlyClass::Vpn => "VPN",
            FriendlyClass::Other => "Other",
        }
    }
}

/// Substring -> class table, checked in order. VPN brands come before the
/// generic classes so "TAP-Windows OpenVPN" classifies as Vpn.
const CLASS_RULES: [(&str, FriendlyClass); 16] = [
    ("loopback", FriendlyClass::Loopback),
    ("openvpn", FriendlyClass::Vpn),
    ("wireguard", FriendlyClass::Vpn),
    ("tailscale", FriendlyClass::Vpn),
    ("zerotier", FriendlyClass::Vpn),
    ("hamachi", FriendlyClass::Vpn),
    ("radmin", FriendlyClass::Vpn),
    ("nordlynx", FriendlyClass::Vpn),
    ("hyper-v", FriendlyClass::HyperV),
    ("vethernet", FriendlyClass::HyperV),
    ("tun", FriendlyClass::TunTap),
    ("tap", FriendlyClass::TunTap),
    ("bluetooth", FriendlyClass::Bluetooth),
    ("wi-fi", FriendlyClass::WiFi),
    ("wireless", FriendlyClass::WiFi),
    ("ethernet", FriendlyClass::Ethernet),
];

/// Classes that mark an adapter as virtual.
fn is_virtual(class: FriendlyClass, haystack: &str) -> bool {
    matches!(
        class,
        FriendlyClass::Loopback | FriendlyClass::HyperV | FriendlyClass::TunTap | FriendlyClass::Vpn
    ) || ["vmware", "virtualbox", "wsl", "npcap loopback"]
        .iter()
        .any(|kw| haystack.contains(kw))
}

/// Classify an adapter from its name and description.
pub fn classify(name: &str, description: &str) -> FriendlyClass {
    let haystack = format!("{} {}", name, description).to_lowercase();
    for (needle, class) in CLASS_RULES {
        if haystack.contains(needle) {
            return class;
        }
    }
    FriendlyClass::Other
}

/// One IPv4 address bound to an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddr {
    pub addr: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
}

/// A capture-capable network interface.
///
/// Created at enumeration time and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Kernel-level device name, as accepted by the capture backend.
    pub name: String,
    /// Human-readable description, when the backend provides one.
    pub description: String,
    pub friendly: FriendlyClass,
    pub addrs: Vec<InterfaceAddr>,
    pub virtual_adapter: bool,
}

impl NetworkInterface {
    /// Does this interface carry at least one non-loopback IPv4 address?
    pub fn has_routable_v4(&self) -> bool {
        self.addrs.iter().any(|a| !a.addr.is_loopback())
    }
}

/// Capture backend availability report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub available: bool,
}

/// Probe whether the capture backend can enumerate devices at all.
pub fn check_capture_backend() -> BackendStatus {
    BackendStatus {
        available: pcap::Device::list().is_ok(),
    }
}

/// Enumerate IPv4-bearing interfaces.
///
/// Fails soft: a backend error logs a warning and yields an empty list, so
/// callers can still render the control surface and report degraded state.
pub fn list_interfaces() -> Vec<NetworkInterface> {
    let devices = match pcap::Device::list() {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "capture backend unavailable, interface list degraded");
            return Vec::new();
        }
    };

    devices
        .into_iter()
        .filter_map(|dev| {
            let addrs: Vec<InterfaceAddr> = dev
                .addresses
                .iter()
                .filter_map(|a| match (a.addr, a.netmask) {
                    (IpAddr::V4(addr), Some(IpAddr::V4(mask))) => Some(InterfaceAddr {
                        addr,
                        netmask: Some(mask),
                    }),
                    (IpAddr::V4(addr), _) => Some(InterfaceAddr { addr, netmask: None }),
                    _ => None,
                })
                .collect();
            if addrs.is_empty() {
                return None;
            }
            let description = dev.desc.clone().unwrap_or_default();
            let friendly = classify(&dev.name, &description);
            let haystack = format!("{} {}", dev.name, description).to_lowercase();
            Some(NetworkInterface {
                virtual_adapter: is_virtual(friendly, &haystack),
                name: dev.name,
                description,
                friendly,
                addrs,
            })
        })
        .collect()
}

/// Pick the default interface from an enumeration.
///
/// Preference order: first Ethernet adapter with a non-loopback address,
/// then any adapter with a non-loopback address, then index 0.
pub fn default_interface(interfaces: &[NetworkInterface]) -> Option<&NetworkInterface> {
    interfaces
        .iter()
        .find(|i| i.friendly == FriendlyClass::Ethernet && i.has_routable_v4())
        .or_else(|| interfaces.iter().find(|i| i.has_routable_v4()))
        .or_else(|| interfaces.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, desc: &str, addrs: &[[u8; 4]]) -> NetworkInterface {
        let description = desc.to_string();
        let friendly = classify(name, desc);
        let haystack = format!("{} {}", name, desc).to_lowercase();
        NetworkInterface {
            virtual_adapter: is_virtual(friendly, &haystack),
            name: name.to_string(),
            description,
            friendly,
            addrs: addrs
                .iter()
                .map(|&o| InterfaceAddr {
                    addr: Ipv4Addr::from(o),
                    netmask: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_classify_common_adapters() {
        assert_eq!(classify("eth0", "Intel(R) Ethernet Connection"), FriendlyClass::Ethernet);
        assert_eq!(classify("wlan0", "Wireless LAN adapter"), FriendlyClass::WiFi);
        assert_eq!(classify("lo", "Software Loopback Interface"), FriendlyClass::Loopback);
        assert_eq!(classify("vEthernet (WSL)", ""), FriendlyClass::HyperV);
        assert_eq!(classify("tun0", ""), FriendlyClass::TunTap);
        assert_eq!(classify("utun3", "Tailscale Tunnel"), FriendlyClass::Vpn);
        assert_eq!(classify("enp3s0", ""), FriendlyClass::Other);
    }

    #[test]
    fn test_vpn_brand_beats_generic_tap() {
        // "TAP-Windows Adapter V9 (OpenVPN)" must classify as Vpn, not TunTap
        assert_eq!(classify("tap0", "TAP-Windows Adapter V9 (OpenVPN)"), FriendlyClass::Vpn);
    }

    #[test]
    fn test_virtual_flagging() {
        let vm = iface("eth1", "VMware Virtual Ethernet Adapter", &[[192, 168, 56, 1]]);
        assert!(vm.virtual_adapter);
        assert_eq!(vm.friendly, FriendlyClass::Ethernet);

        let phys = iface("eth0", "Intel(R) Ethernet Connection", &[[192, 168, 1, 2]]);
        assert!(!phys.virtual_adapter);
    }

    #[test]
    fn test_default_prefers_routable_ethernet() {
        let interfaces = vec![
            iface("lo", "Software Loopback Interface", &[[127, 0, 0, 1]]),
            iface("wlan0", "Wireless LAN adapter", &[[192, 168, 1, 7]]),
            iface("eth0", "Intel(R) Ethernet Connection", &[[192, 168, 1, 2]]),
        ];
        let picked = default_interface(&interfaces).unwrap();
        assert_eq!(picked.name, "eth0");
    }

    #[test]
    fn test_default_falls_back_to_any_routable() {
        let interfaces = vec![
            iface("lo", "Software Loopback Interface", &[[127, 0, 0, 1]]),
            iface("wlan0", "Wireless LAN adapter", &[[10, 0, 0, 3]]),
        ];
        assert_eq!(default_interface(&interfaces).unwrap().name, "wlan0");
    }

    #[test]
    fn test_default_falls_back_to_first() {
        let interfaces = vec![iface("lo", "Software Loopback Interface", &[[127, 0, 0, 1]])];
        assert_eq!(default_interface(&interfaces).unwrap().name, "lo");
        assert!(default_interface(&[]).is_none());
    }
}
