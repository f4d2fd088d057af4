//! Switch CLI vocabulary.
//!
//! The switch under test is configured through a line-oriented shell on its
//! stdin. It has two modes: general mode, and interface mode entered with
//! `interface <name>` and left with `exit`. Nothing is acknowledged; the
//! harness only renders text.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCommand {
    /// Enter interface configuration mode.
    Interface(String),
    /// Leave interface mode (or the shell, from general mode).
    Exit,
    AccessMode,
    AccessVlan(u16),
    NoAccessVlan,
    TrunkMode,
    TrunkAddVlan(u16),
    TrunkRemoveVlan(u16),
    NoTrunkVlans,
    /// Mirror the traffic of the named interface onto the current one.
    MonitorMode(String),
    /// Stop ingress and egress on the current interface.
    Shutdown,
    NoShutdown,
    /// Interface mode: state of the current interface.
    Show,
    ShowInterfaces,
    ShowFib,
    ShowConfig,
    ConfigSave(String),
    ConfigLoad(String),
    CountersReset,
    Debug,
    NoDebug,
    Help,
}

impl fmt::Display for SwitchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchCommand::Interface(name) => write!(f, "interface {name}"),
            SwitchCommand::Exit => write!(f, "exit"),
            SwitchCommand::AccessMode => write!(f, "switchport mode access"),
            SwitchCommand::AccessVlan(vlan) => write!(f, "switchport access vlan {vlan}"),
            SwitchCommand::NoAccessVlan => write!(f, "no switchport access vlan"),
            SwitchCommand::TrunkMode => write!(f, "switchport mode trunk"),
            SwitchCommand::TrunkAddVlan(vlan) => write!(f, "switchport trunk vlans add {vlan}"),
            SwitchCommand::TrunkRemoveVlan(vlan) => {
                write!(f, "switchport trunk vlans remove {vlan}")
            }
            SwitchCommand::NoTrunkVlans => write!(f, "no switchport trunk vlans"),
            SwitchCommand::MonitorMode(target) => write!(f, "switchport mode monitor {target}"),
            SwitchCommand::Shutdown => write!(f, "shutdown"),
            SwitchCommand::NoShutdown => write!(f, "no shutdown"),
            SwitchCommand::Show => write!(f, "show"),
            SwitchCommand::ShowInterfaces => write!(f, "show interfaces"),
            SwitchCommand::ShowFib => write!(f, "show fib"),
            SwitchCommand::ShowConfig => write!(f, "show config"),
            SwitchCommand::ConfigSave(file) => write!(f, "config save {file}"),
            SwitchCommand::ConfigLoad(file) => write!(f, "config load {file}"),
            SwitchCommand::CountersReset => write!(f, "counters reset"),
            SwitchCommand::Debug => write!(f, "debug"),
            SwitchCommand::NoDebug => write!(f, "no debug"),
            SwitchCommand::Help => write!(f, "help"),
        }
    }
}

/// Put `iface` in access mode on `vlan`.
pub fn access_port(iface: &str, vlan: u16) -> Vec<SwitchCommand> {
    vec![
        SwitchCommand::Interface(iface.to_string()),
        SwitchCommand::AccessMode,
        SwitchCommand::AccessVlan(vlan),
        SwitchCommand::Exit,
    ]
}

/// Put `iface` in trunk mode allowing `vlans`.
pub fn trunk_port(iface: &str, vlans: &[u16]) -> Vec<SwitchCommand> {
    let mut cmds = vec![
        SwitchCommand::Interface(iface.to_string()),
        SwitchCommand::TrunkMode,
    ];
    cmds.extend(vlans.iter().map(|v| SwitchCommand::TrunkAddVlan(*v)));
    cmds.push(SwitchCommand::Exit);
    cmds
}

/// Mirror `target`'s traffic onto `iface`.
pub fn monitor_port(iface: &str, target: &str) -> Vec<SwitchCommand> {
    vec![
        SwitchCommand::Interface(iface.to_string()),
        SwitchCommand::MonitorMode(target.to_string()),
        SwitchCommand::Exit,
    ]
}

/// Administratively disable (`up == false`) or re-enable `iface`.
pub fn port_admin(iface: &str, up: bool) -> Vec<SwitchCommand> {
    vec![
        SwitchCommand::Interface(iface.to_string()),
        if up {
            SwitchCommand::NoShutdown
        } else {
            SwitchCommand::Shutdown
        },
        SwitchCommand::Exit,
    ]
}

pub fn render(cmds: &[SwitchCommand]) -> Vec<String> {
    cmds.iter().map(ToString::to_string).collect()
}
