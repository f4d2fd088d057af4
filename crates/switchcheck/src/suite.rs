//! Built-in conformance suite.
//!
//! Each scenario is plain data over host ids; switch-facing interface names
//! come from the topology, so the suite runs on any topology with at least
//! five hosts numbered 1 to 5.

use std::time::Duration;

use switchcheck_common::command::{
    access_port, monitor_port, port_admin, trunk_port, SwitchCommand,
};
use switchcheck_common::error::ConfigError;
use switchcheck_common::scenario::{
    FrameSpec, Policy, Scenario, VerifyStep, TOPOLOGY_CHANGE_SETTLE,
};
use switchcheck_common::topology::Topology;

pub const NAMES: [&str; 8] = [
    "basic",
    "flooding",
    "unicast",
    "vlan-isolation",
    "trunk-tagging",
    "idempotence",
    "mirroring",
    "port-shutdown",
];

/// Local experimental EtherType used for non-ARP broadcasts.
const ETHERTYPE_LOCAL: u16 = 0x88b5;

/// Payload of the tagged broadcast in `trunk-tagging`.
const TAGGED_PAYLOAD: &[u8] = b"switchcheck trunk frame";

/// Payload of the default-VLAN broadcast in `idempotence`.
const DEFAULT_VLAN_PAYLOAD: &[u8] = b"switchcheck default vlan";

pub fn builtin(topology: &Topology) -> Result<Vec<Scenario>, ConfigError> {
    NAMES.iter().map(|name| build(name, topology)).collect()
}

/// Look up one built-in scenario. `None` for an unknown name.
pub fn by_name(name: &str, topology: &Topology) -> Option<Result<Scenario, ConfigError>> {
    NAMES
        .contains(&name)
        .then(|| build(name, topology))
}

fn build(name: &str, topology: &Topology) -> Result<Scenario, ConfigError> {
    let scenario = match name {
        "basic" => basic(),
        "flooding" => flooding(),
        "unicast" => unicast(),
        "vlan-isolation" => vlan_isolation(topology)?,
        "trunk-tagging" => trunk_tagging(topology)?,
        "idempotence" => idempotence(topology)?,
        "mirroring" => mirroring(topology)?,
        "port-shutdown" => port_shutdown(topology)?,
        other => {
            return Err(ConfigError::Invalid(format!(
                "unknown built-in scenario \"{other}\""
            )))
        }
    };
    scenario.validate(topology)?;
    Ok(scenario)
}

fn arp(src: u32, target: u32) -> FrameSpec {
    FrameSpec::ArpRequest { src, target }
}

fn icmp(src: u32, dst: u32) -> FrameSpec {
    FrameSpec::IcmpEcho { src, dst }
}

fn local_broadcast(src: u32, payload: &[u8]) -> FrameSpec {
    FrameSpec::Broadcast {
        src,
        ethertype: ETHERTYPE_LOCAL,
        payload: payload.to_vec(),
    }
}

fn basic() -> Scenario {
    Scenario::new("basic")
        .describe("ARP flood from host1, then ICMP reply reaches only host1")
        .verify(
            VerifyStep::new("arp host1 -> host2 floods", arp(1, 2), 1)
                .expect(2)
                .expect(3)
                .expect(4),
        )
        .verify(
            VerifyStep::new("icmp host2 -> host1 is unicast", icmp(2, 1), 2)
                .expect(1)
                .expect_absent(3)
                .expect_absent(4),
        )
}

fn flooding() -> Scenario {
    Scenario::new("flooding")
        .describe("broadcast from host1 reaches every other host byte-identical")
        .verify(
            VerifyStep::new("arp from host1", arp(1, 2), 1)
                .expect(2)
                .expect(3)
                .expect(4)
                .expect(5),
        )
}

fn unicast() -> Scenario {
    Scenario::new("unicast")
        .describe("frame to a learned MAC leaves only on that host's port")
        .verify(
            VerifyStep::new("host3 announces itself", arp(3, 1), 3)
                .expect(1)
                .expect(2),
        )
        .verify(
            VerifyStep::new("icmp host1 -> host3", icmp(1, 3), 1)
                .expect(3)
                .expect_absent(2)
                .expect_absent(4)
                .expect_absent(5),
        )
}

fn vlan10_access(topology: &Topology) -> Result<Vec<SwitchCommand>, ConfigError> {
    let mut cmds = access_port(&topology.host(1)?.switch_iface, 10);
    cmds.extend(access_port(&topology.host(2)?.switch_iface, 10));
    Ok(cmds)
}

fn isolation_check(label: &str) -> VerifyStep {
    VerifyStep::new(label, arp(1, 2), 1)
        .expect(2)
        .expect_absent(3)
        .expect_absent(4)
        .expect_absent(5)
}

fn vlan_isolation(topology: &Topology) -> Result<Scenario, ConfigError> {
    Ok(Scenario::new("vlan-isolation")
        .describe("hosts 1 and 2 on access VLAN 10 are cut off from the rest")
        .configure(
            "hosts 1,2 access vlan 10",
            &vlan10_access(topology)?,
            TOPOLOGY_CHANGE_SETTLE,
        )
        .verify(isolation_check("broadcast stays in vlan 10")))
}

fn trunk_tagging(topology: &Topology) -> Result<Scenario, ConfigError> {
    let mut cmds = trunk_port(&topology.host(1)?.switch_iface, &[10, 20]);
    cmds.extend(access_port(&topology.host(2)?.switch_iface, 10));
    cmds.extend(access_port(&topology.host(3)?.switch_iface, 20));

    let tagged = |src| local_broadcast(src, TAGGED_PAYLOAD);

    Ok(Scenario::new("trunk-tagging")
        .describe("trunk on host1 carries vlans 10 and 20 without leaking between them")
        .configure("trunk host1, access hosts 2,3", &cmds, TOPOLOGY_CHANGE_SETTLE)
        .verify(
            VerifyStep::new("vlan 10 from trunk", tagged(1), 1)
                .inject_vlan(10)
                .expect(2)
                .expect_on(1, Some(20), Policy::MustNotAppear)
                .expect_absent(3)
                .expect_absent(4),
        )
        .verify(
            VerifyStep::new("vlan 20 to trunk", tagged(3), 3)
                .expect_on(1, Some(20), Policy::MustAppear)
                .expect_on(1, Some(10), Policy::MustNotAppear)
                .expect_absent(2),
        ))
}

fn idempotence(topology: &Topology) -> Result<Scenario, ConfigError> {
    let cmds = vlan10_access(topology)?;
    let other = local_broadcast(3, DEFAULT_VLAN_PAYLOAD);
    Ok(Scenario::new("idempotence")
        .describe("repeating the vlan 10 configuration changes nothing")
        .configure("hosts 1,2 access vlan 10", &cmds, Duration::from_millis(500))
        .configure("same again", &cmds, TOPOLOGY_CHANGE_SETTLE)
        .verify(isolation_check("vlan 10 still isolated"))
        .verify(
            VerifyStep::new("default vlan still floods", other, 3)
                .expect(4)
                .expect(5)
                .expect_absent(1)
                .expect_absent(2),
        ))
}

fn mirroring(topology: &Topology) -> Result<Scenario, ConfigError> {
    let cmds = monitor_port(
        &topology.host(5)?.switch_iface,
        &topology.host(1)?.switch_iface,
    );
    Ok(Scenario::new("mirroring")
        .describe("host5's port mirrors unicast traffic entering host1's port")
        .configure("host5 monitors host1", &cmds, TOPOLOGY_CHANGE_SETTLE)
        .verify(
            VerifyStep::new("host3 announces itself", arp(3, 1), 3)
                .expect(1)
                .expect(2),
        )
        .verify(
            VerifyStep::new("icmp host1 -> host3 is mirrored", icmp(1, 3), 1)
                .expect(3)
                .expect(5)
                .expect_absent(2)
                .expect_absent(4),
        ))
}

fn port_shutdown(topology: &Topology) -> Result<Scenario, ConfigError> {
    let iface = &topology.host(2)?.switch_iface;
    Ok(Scenario::new("port-shutdown")
        .describe("a shut down port neither floods nor receives until re-enabled")
        .configure("shut down host2", &port_admin(iface, false), TOPOLOGY_CHANGE_SETTLE)
        .verify(
            VerifyStep::new("flood skips host2", arp(1, 3), 1)
                .expect(3)
                .expect(4)
                .expect_absent(2),
        )
        .configure("re-enable host2", &port_admin(iface, true), TOPOLOGY_CHANGE_SETTLE)
        .verify(
            VerifyStep::new("flood reaches host2 again", arp(1, 3), 1)
                .expect(2)
                .expect(3),
        ))
}
