//! Host topology.
//!
//! The table of simulated hosts is built once at startup and shared
//! read-only (`Arc<Topology>`) by every component. Each host owns one local
//! interface inside its execution context; the peer end of that link is the
//! switch-facing interface handed to the switch under test.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::selector::InterfaceSelector;

// ── MAC address ─────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl FromStr for MacAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidMac(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddr(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// ── Host ────────────────────────────────────────────────────────────

/// A simulated host attached to one switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub id: u32,
    /// Execution-context identifier passed to the host wrapper.
    pub name: String,
    pub iface: String,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub switch_iface: String,
}

impl Host {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        iface: impl Into<String>,
        mac: MacAddr,
        ip: Ipv4Addr,
    ) -> Self {
        let iface = iface.into();
        Self {
            id,
            name: name.into(),
            switch_iface: default_switch_iface(&iface),
            iface,
            mac,
            ip,
        }
    }

    pub fn with_switch_iface(mut self, switch_iface: impl Into<String>) -> Self {
        self.switch_iface = switch_iface.into();
        self
    }

    /// The host's interface, or its `<iface>.<vlan>` sub-interface.
    pub fn selector(&self, vlan: Option<u16>) -> InterfaceSelector {
        InterfaceSelector::new(self.iface.clone(), vlan)
    }
}

/// Switch-side peer name for a host interface: `if3-host3` → `if3-sw`.
pub fn default_switch_iface(iface: &str) -> String {
    let prefix = iface.split('-').next().unwrap_or(iface);
    format!("{prefix}-sw")
}

// ── Topology ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    hosts: Vec<Host>,
}

impl Topology {
    /// Validate and build a topology. Hosts are ordered by id, which is also
    /// the order of the switch's positional interface arguments.
    pub fn new(mut hosts: Vec<Host>) -> Result<Self, ConfigError> {
        if hosts.is_empty() {
            return Err(ConfigError::Topology("no hosts defined".into()));
        }
        hosts.sort_by_key(|h| h.id);

        let mut ids = HashSet::new();
        let mut ifaces = HashSet::new();
        for host in &hosts {
            if !ids.insert(host.id) {
                return Err(ConfigError::Topology(format!(
                    "duplicate host id {}",
                    host.id
                )));
            }
            if host.name.trim().is_empty() || host.iface.trim().is_empty() {
                return Err(ConfigError::Topology(format!(
                    "host {} needs a name and an interface",
                    host.id
                )));
            }
            for name in [&host.iface, &host.switch_iface] {
                if !ifaces.insert(name.clone()) {
                    return Err(ConfigError::Topology(format!(
                        "interface {name} used twice"
                    )));
                }
            }
        }
        Ok(Self { hosts })
    }

    pub fn host(&self, id: u32) -> Result<&Host, ConfigError> {
        self.hosts
            .iter()
            .find(|h| h.id == id)
            .ok_or(ConfigError::UnknownHost(id))
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.hosts.iter().map(|h| h.id)
    }

    /// Switch-facing interface names, ordered by host id.
    pub fn switch_interfaces(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.switch_iface.clone()).collect()
    }
}

impl Default for Topology {
    /// Five hosts `host1`..`host5` on `192.168.10.0/24`.
    fn default() -> Self {
        let last_octets = [0xaa, 0xbb, 0xcc, 0xdd, 0xee];
        let hosts = (1..=5u32)
            .zip(last_octets)
            .map(|(id, last)| {
                Host::new(
                    id,
                    format!("host{id}"),
                    format!("if{id}-host{id}"),
                    MacAddr::new([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, last]),
                    Ipv4Addr::new(192, 168, 10, 10 + id as u8),
                )
            })
            .collect();
        Self { hosts }
    }
}
