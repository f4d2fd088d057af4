//! Scenario model.
//!
//! A scenario is an ordered list of steps run against one switch session.
//! Configuration steps push CLI commands and wait for the switch to settle;
//! verification steps arm listeners, fire one stimulus and check every
//! listener against its policy.

use std::fmt;
use std::time::Duration;

use crate::command::{render, SwitchCommand};
use crate::error::ConfigError;
use crate::frame::{self, Frame};
use crate::topology::{MacAddr, Topology};

/// Settle delay after a configuration batch that changes VLAN membership.
pub const TOPOLOGY_CHANGE_SETTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    MustAppear,
    MustNotAppear,
}

impl Policy {
    pub fn from_absent(absent: bool) -> Self {
        if absent {
            Policy::MustNotAppear
        } else {
            Policy::MustAppear
        }
    }

    /// `fail ⇔ observed == (policy == MustNotAppear)`
    pub fn fails(self, observed: bool) -> bool {
        observed == (self == Policy::MustNotAppear)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::MustAppear => write!(f, "must appear"),
            Policy::MustNotAppear => write!(f, "must not appear"),
        }
    }
}

/// How the stimulus bytes are produced. Host references are resolved against
/// the topology when the step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSpec {
    Raw(Frame),
    /// Ethernet broadcast from `src` with an arbitrary payload.
    Broadcast {
        src: u32,
        ethertype: u16,
        payload: Vec<u8>,
    },
    ArpRequest {
        src: u32,
        target: u32,
    },
    IcmpEcho {
        src: u32,
        dst: u32,
    },
}

impl FrameSpec {
    pub fn build(&self, topology: &Topology) -> Result<Frame, ConfigError> {
        Ok(match self {
            FrameSpec::Raw(frame) => frame.clone(),
            FrameSpec::Broadcast {
                src,
                ethertype,
                payload,
            } => {
                let src = topology.host(*src)?;
                frame::ethernet(MacAddr::BROADCAST, src.mac, *ethertype, payload)
            }
            FrameSpec::ArpRequest { src, target } => {
                let src = topology.host(*src)?;
                let target = topology.host(*target)?;
                frame::arp_request(src.mac, src.ip, target.ip)
            }
            FrameSpec::IcmpEcho { src, dst } => {
                let src = topology.host(*src)?;
                let dst = topology.host(*dst)?;
                frame::icmp_echo(src.mac, src.ip, dst.mac, dst.ip)
            }
        })
    }

    fn host_refs(&self) -> Vec<u32> {
        match self {
            FrameSpec::Raw(_) => Vec::new(),
            FrameSpec::Broadcast { src, .. } => vec![*src],
            FrameSpec::ArpRequest { src, target } => vec![*src, *target],
            FrameSpec::IcmpEcho { src, dst } => vec![*src, *dst],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectSpec {
    pub host: u32,
    pub vlan: Option<u16>,
    pub policy: Policy,
    /// Overrides the harness default listener timeout.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectSpec {
    pub host: u32,
    pub vlan: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureStep {
    pub label: String,
    pub commands: Vec<String>,
    pub settle: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyStep {
    pub label: String,
    pub frame: FrameSpec,
    pub inject: InjectSpec,
    pub expect: Vec<ExpectSpec>,
}

impl VerifyStep {
    pub fn new(label: impl Into<String>, frame: FrameSpec, inject_host: u32) -> Self {
        Self {
            label: label.into(),
            frame,
            inject: InjectSpec {
                host: inject_host,
                vlan: None,
            },
            expect: Vec::new(),
        }
    }

    /// Inject on the `<iface>.<vlan>` view of the sending host.
    pub fn inject_vlan(mut self, vlan: u16) -> Self {
        self.inject.vlan = Some(vlan);
        self
    }

    pub fn expect(self, host: u32) -> Self {
        self.expect_on(host, None, Policy::MustAppear)
    }

    pub fn expect_absent(self, host: u32) -> Self {
        self.expect_on(host, None, Policy::MustNotAppear)
    }

    pub fn expect_on(mut self, host: u32, vlan: Option<u16>, policy: Policy) -> Self {
        self.expect.push(ExpectSpec {
            host,
            vlan,
            policy,
            timeout: None,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Configure(ConfigureStep),
    Verify(VerifyStep),
}

impl Step {
    pub fn label(&self) -> &str {
        match self {
            Step::Configure(step) => &step.label,
            Step::Verify(step) => &step.label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn configure(
        mut self,
        label: impl Into<String>,
        commands: &[SwitchCommand],
        settle: Duration,
    ) -> Self {
        self.steps.push(Step::Configure(ConfigureStep {
            label: label.into(),
            commands: render(commands),
            settle,
        }));
        self
    }

    pub fn verify(mut self, step: VerifyStep) -> Self {
        self.steps.push(Step::Verify(step));
        self
    }

    /// Check every host reference against `topology` and reject verification
    /// steps without expectations.
    pub fn validate(&self, topology: &Topology) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Scenario {
            scenario: self.name.clone(),
            reason,
        };
        if self.steps.is_empty() {
            return Err(invalid("no steps".into()));
        }
        for step in &self.steps {
            let Step::Verify(verify) = step else {
                continue;
            };
            if verify.expect.is_empty() {
                return Err(invalid(format!(
                    "verification step \"{}\" has no expectations",
                    verify.label
                )));
            }
            let refs = verify
                .frame
                .host_refs()
                .into_iter()
                .chain(std::iter::once(verify.inject.host))
                .chain(verify.expect.iter().map(|e| e.host));
            for id in refs {
                if topology.host(id).is_err() {
                    return Err(invalid(format!(
                        "step \"{}\" references unknown host {id}",
                        verify.label
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn verify_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::Verify(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::access_port;

    #[test]
    fn policy_evaluation_table() {
        assert!(!Policy::MustAppear.fails(true));
        assert!(Policy::MustAppear.fails(false));
        assert!(Policy::MustNotAppear.fails(true));
        assert!(!Policy::MustNotAppear.fails(false));
    }

    #[test]
    fn frame_specs_resolve_against_topology() {
        let topo = Topology::default();
        let arp = FrameSpec::ArpRequest { src: 1, target: 2 }
            .build(&topo)
            .unwrap();
        assert_eq!(&arp.as_bytes()[0..6], &[0xff; 6]);
        assert_eq!(&arp.as_bytes()[6..12], &topo.host(1).unwrap().mac.octets());

        let err = FrameSpec::IcmpEcho { src: 1, dst: 42 }.build(&topo);
        assert!(matches!(err, Err(ConfigError::UnknownHost(42))));
    }

    #[test]
    fn builder_collects_steps() {
        let scenario = Scenario::new("isolation")
            .configure("vlan 10", &access_port("if1-sw", 10), TOPOLOGY_CHANGE_SETTLE)
            .verify(
                VerifyStep::new("flood", FrameSpec::ArpRequest { src: 1, target: 2 }, 1)
                    .expect(2)
                    .expect_absent(3),
            );
        assert_eq!(scenario.steps.len(), 2);
        assert_eq!(scenario.verify_steps(), 1);
        let Step::Verify(verify) = &scenario.steps[1] else {
            panic!("expected verify step");
        };
        assert_eq!(verify.expect[1].policy, Policy::MustNotAppear);
        scenario.validate(&Topology::default()).unwrap();
    }

    #[test]
    fn validation_rejects_bad_references() {
        let topo = Topology::default();
        let scenario = Scenario::new("bad")
            .verify(VerifyStep::new("x", FrameSpec::ArpRequest { src: 1, target: 2 }, 1).expect(8));
        assert!(scenario.validate(&topo).is_err());

        let empty = Scenario::new("empty")
            .verify(VerifyStep::new("y", FrameSpec::ArpRequest { src: 1, target: 2 }, 1));
        assert!(empty.validate(&topo).is_err());
        assert!(Scenario::new("nothing").validate(&topo).is_err());
    }
}
