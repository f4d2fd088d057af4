use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::frame::{decode_hex, Frame};
use crate::scenario::{
    ConfigureStep, ExpectSpec, FrameSpec, InjectSpec, Policy, Scenario, Step, VerifyStep,
};
use crate::selector::validate_vlan;
use crate::topology::{Host, MacAddr, Topology};

pub const CONFIG_VERSION: u32 = 1;

// ── Resolved settings ───────────────────────────────────────────────

/// Fixed delays and bounds used by the orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Pause after each switch command.
    pub command_settle: Duration,
    /// Wait between arming listeners and firing the stimulus.
    pub readiness_delay: Duration,
    /// Default listener capture window.
    pub expect_timeout: Duration,
    /// Quiet period that ends a switch output drain.
    pub poll_window: Duration,
    /// Default settle after a configuration step.
    pub configure_settle: Duration,
    /// Wait after the switch process starts, before the first step.
    pub startup_settle: Duration,
    /// How long `terminate` waits for the switch to exit.
    pub terminate_grace: Duration,
    /// Bound on the listener ready handshake.
    pub ready_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_settle: Duration::from_millis(150),
            readiness_delay: Duration::from_secs(1),
            expect_timeout: Duration::from_secs(5),
            poll_window: Duration::from_millis(100),
            configure_settle: Duration::from_millis(500),
            startup_settle: Duration::from_millis(500),
            terminate_grace: Duration::from_millis(200),
            ready_timeout: Duration::from_secs(2),
        }
    }
}

/// How the driver makes sure listeners are live before injecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
    /// Sleep `readiness_delay` only.
    #[default]
    FixedDelay,
    /// Wait for each listener's `READY` line, then sleep `readiness_delay`.
    Handshake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Privileged wrapper argv; the host name and the command follow it.
    pub exec_wrapper: Vec<String>,
    /// Frame helper program run inside host contexts.
    pub probe: String,
    pub switch_binary: String,
    /// Execution context the switch runs in.
    pub switch_context: String,
    pub timing: Timing,
    pub readiness: Readiness,
    /// Introspection commands sent before the switch is terminated.
    pub teardown_commands: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            exec_wrapper: vec!["sudo".into(), "scripts/host-exec".into()],
            probe: "frame-probe".into(),
            switch_binary: "target/debug/blair_switch".into(),
            switch_context: "sw".into(),
            timing: Timing::default(),
            readiness: Readiness::default(),
            teardown_commands: vec!["show interfaces".into(), "show fib".into()],
        }
    }
}

/// A fully resolved suite file.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub version: u32,
    pub harness: HarnessConfig,
    pub topology: Topology,
    pub scenarios: Vec<Scenario>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            harness: HarnessConfig::default(),
            topology: Topology::default(),
            scenarios: Vec::new(),
        }
    }
}

// ── TOML input ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SuiteConfigInput {
    pub version: u32,
    pub harness: HarnessConfigInput,
    pub hosts: Vec<HostInput>,
    pub scenarios: Vec<ScenarioInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarnessConfigInput {
    pub exec_wrapper: Option<Vec<String>>,
    pub probe: Option<String>,
    pub switch_binary: Option<String>,
    pub switch_context: Option<String>,
    pub readiness: Option<Readiness>,
    pub teardown_commands: Option<Vec<String>>,
    pub timing: TimingInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimingInput {
    pub command_settle_ms: Option<u64>,
    pub readiness_delay_ms: Option<u64>,
    pub expect_timeout_ms: Option<u64>,
    pub poll_window_ms: Option<u64>,
    pub configure_settle_ms: Option<u64>,
    pub startup_settle_ms: Option<u64>,
    pub terminate_grace_ms: Option<u64>,
    pub ready_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostInput {
    pub id: u32,
    pub name: String,
    pub iface: String,
    pub mac: String,
    pub ip: String,
    pub switch_iface: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioInput {
    pub name: String,
    pub description: String,
    pub steps: Vec<StepInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepInput {
    Configure {
        #[serde(default)]
        label: Option<String>,
        commands: Vec<String>,
        #[serde(default)]
        settle_ms: Option<u64>,
    },
    Verify {
        #[serde(default)]
        label: Option<String>,
        frame: FrameInput,
        inject: InjectInput,
        expect: Vec<ExpectInput>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FrameInput {
    Raw {
        hex: String,
    },
    Broadcast {
        src: u32,
        #[serde(default)]
        ethertype: Option<u16>,
        #[serde(default)]
        payload_hex: String,
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

#[derive(Debug, Clone, Deserialize)]
pub struct InjectInput {
    pub host: u32,
    #[serde(default)]
    pub vlan: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpectInput {
    pub host: u32,
    #[serde(default)]
    pub vlan: Option<u32>,
    #[serde(default)]
    pub absent: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn ms_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

impl TimingInput {
    pub fn resolve(self) -> Timing {
        let d = Timing::default();
        Timing {
            command_settle: ms_or(self.command_settle_ms, d.command_settle),
            readiness_delay: ms_or(self.readiness_delay_ms, d.readiness_delay),
            expect_timeout: ms_or(self.expect_timeout_ms, d.expect_timeout),
            poll_window: ms_or(self.poll_window_ms, d.poll_window).max(Duration::from_millis(1)),
            configure_settle: ms_or(self.configure_settle_ms, d.configure_settle),
            startup_settle: ms_or(self.startup_settle_ms, d.startup_settle),
            terminate_grace: ms_or(self.terminate_grace_ms, d.terminate_grace),
            ready_timeout: ms_or(self.ready_timeout_ms, d.ready_timeout),
        }
    }
}

impl HarnessConfigInput {
    pub fn resolve(self) -> Result<HarnessConfig, ConfigError> {
        let d = HarnessConfig::default();
        let exec_wrapper = match self.exec_wrapper {
            Some(argv) => argv
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            None => d.exec_wrapper,
        };
        let teardown_commands = self
            .teardown_commands
            .unwrap_or(d.teardown_commands)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
        Ok(HarnessConfig {
            exec_wrapper,
            probe: non_empty(self.probe).unwrap_or(d.probe),
            switch_binary: non_empty(self.switch_binary).unwrap_or(d.switch_binary),
            switch_context: non_empty(self.switch_context).unwrap_or(d.switch_context),
            timing: self.timing.resolve(),
            readiness: self.readiness.unwrap_or_default(),
            teardown_commands,
        })
    }
}

impl HostInput {
    pub fn resolve(self) -> Result<Host, ConfigError> {
        let mac: MacAddr = self.mac.parse()?;
        let ip: Ipv4Addr = self.ip.trim().parse().map_err(|_| {
            ConfigError::Topology(format!("host {}: invalid IPv4 address \"{}\"", self.id, self.ip))
        })?;
        let host = Host::new(self.id, self.name.trim(), self.iface.trim(), mac, ip);
        Ok(match non_empty(self.switch_iface) {
            Some(iface) => host.with_switch_iface(iface),
            None => host,
        })
    }
}

fn resolve_vlan(vlan: Option<u32>) -> Result<Option<u16>, ConfigError> {
    vlan.map(validate_vlan).transpose()
}

impl FrameInput {
    pub fn resolve(self) -> Result<FrameSpec, ConfigError> {
        Ok(match self {
            FrameInput::Raw { hex } => FrameSpec::Raw(Frame::from_hex(&hex)?),
            FrameInput::Broadcast {
                src,
                ethertype,
                payload_hex,
            } => FrameSpec::Broadcast {
                src,
                ethertype: ethertype.unwrap_or(0x88b5),
                payload: decode_hex(&payload_hex)?,
            },
            FrameInput::ArpRequest { src, target } => FrameSpec::ArpRequest { src, target },
            FrameInput::IcmpEcho { src, dst } => FrameSpec::IcmpEcho { src, dst },
        })
    }
}

impl StepInput {
    pub fn resolve(self, index: usize, timing: &Timing) -> Result<Step, ConfigError> {
        let default_label = |kind: &str| format!("{kind} #{}", index + 1);
        Ok(match self {
            StepInput::Configure {
                label,
                commands,
                settle_ms,
            } => Step::Configure(ConfigureStep {
                label: non_empty(label).unwrap_or_else(|| default_label("configure")),
                commands: commands
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
                settle: ms_or(settle_ms, timing.configure_settle),
            }),
            StepInput::Verify {
                label,
                frame,
                inject,
                expect,
            } => {
                let expect = expect
                    .into_iter()
                    .map(|e| {
                        Ok(ExpectSpec {
                            host: e.host,
                            vlan: resolve_vlan(e.vlan)?,
                            policy: Policy::from_absent(e.absent),
                            timeout: e.timeout_ms.map(Duration::from_millis),
                        })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Step::Verify(VerifyStep {
                    label: non_empty(label).unwrap_or_else(|| default_label("verify")),
                    frame: frame.resolve()?,
                    inject: InjectSpec {
                        host: inject.host,
                        vlan: resolve_vlan(inject.vlan)?,
                    },
                    expect,
                })
            }
        })
    }
}

impl SuiteConfigInput {
    pub fn resolve(self) -> Result<SuiteConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {version}"
            )));
        }

        let harness = self.harness.resolve()?;

        let topology = if self.hosts.is_empty() {
            Topology::default()
        } else {
            let hosts = self
                .hosts
                .into_iter()
                .map(HostInput::resolve)
                .collect::<Result<Vec<_>, _>>()?;
            Topology::new(hosts)?
        };

        let mut scenarios = Vec::with_capacity(self.scenarios.len());
        for (idx, input) in self.scenarios.into_iter().enumerate() {
            let name = non_empty(Some(input.name)).unwrap_or_else(|| format!("scenario-{}", idx + 1));
            if scenarios.iter().any(|s: &Scenario| s.name == name) {
                return Err(ConfigError::Invalid(format!("duplicate scenario name \"{name}\"")));
            }
            let steps = input
                .steps
                .into_iter()
                .enumerate()
                .map(|(i, step)| step.resolve(i, &harness.timing))
                .collect::<Result<Vec<_>, _>>()?;
            let scenario = Scenario {
                name,
                description: input.description.trim().to_string(),
                steps,
            };
            scenario.validate(&topology)?;
            scenarios.push(scenario);
        }

        Ok(SuiteConfig {
            version,
            harness,
            topology,
            scenarios,
        })
    }
}

impl SuiteConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(SuiteConfig::default());
        }
        let parsed: SuiteConfigInput = toml::from_str(input)
            .map_err(|e| ConfigError::Invalid(format!("invalid config TOML: {e}")))?;
        parsed.resolve()
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            hosts = config.topology.hosts().len(),
            scenarios = config.scenarios.len(),
            "loaded suite config"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let cfg = SuiteConfig::from_toml_str("  \n").unwrap();
        assert_eq!(cfg.version, CONFIG_VERSION);
        assert_eq!(cfg.harness, HarnessConfig::default());
        assert_eq!(cfg.topology.hosts().len(), 5);
        assert!(cfg.scenarios.is_empty());
        assert_eq!(cfg.harness.timing.command_settle, Duration::from_millis(150));
        assert_eq!(cfg.harness.timing.readiness_delay, Duration::from_secs(1));
        assert_eq!(cfg.harness.timing.expect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.harness.timing.poll_window, Duration::from_millis(100));
    }

    #[test]
    fn parse_full_suite() {
        let toml = r#"
            version = 1

            [harness]
            exec_wrapper = ["sudo", "ip", "netns", "exec"]
            probe = "/usr/local/bin/frame-probe"
            switch_binary = "./switch"
            readiness = "handshake"
            teardown_commands = ["show fib"]

            [harness.timing]
            readiness_delay_ms = 250
            expect_timeout_ms = 3000

            [[hosts]]
            id = 1
            name = "h1"
            iface = "eth1-h1"
            mac = "02:00:00:00:00:01"
            ip = "10.0.0.1"

            [[hosts]]
            id = 2
            name = "h2"
            iface = "eth2-h2"
            mac = "02:00:00:00:00:02"
            ip = "10.0.0.2"
            switch_iface = "swp2"

            [[scenarios]]
            name = "vlan"
            description = "two ports in vlan 30"

            [[scenarios.steps]]
            type = "configure"
            commands = ["interface eth1-sw", "switchport access vlan 30", "exit"]
            settle_ms = 1000

            [[scenarios.steps]]
            type = "verify"
            label = "arp"
            frame = { kind = "arp-request", src = 1, target = 2 }
            inject = { host = 1, vlan = 30 }
            expect = [
                { host = 2 },
                { host = 2, vlan = 40, absent = true, timeout_ms = 1500 },
            ]
        "#;

        let cfg = SuiteConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.harness.exec_wrapper, vec!["sudo", "ip", "netns", "exec"]);
        assert_eq!(cfg.harness.probe, "/usr/local/bin/frame-probe");
        assert_eq!(cfg.harness.switch_context, "sw");
        assert_eq!(cfg.harness.readiness, Readiness::Handshake);
        assert_eq!(cfg.harness.teardown_commands, vec!["show fib"]);
        assert_eq!(cfg.harness.timing.readiness_delay, Duration::from_millis(250));
        assert_eq!(cfg.harness.timing.command_settle, Duration::from_millis(150));

        assert_eq!(cfg.topology.switch_interfaces(), vec!["eth1-sw", "swp2"]);

        let scenario = &cfg.scenarios[0];
        assert_eq!(scenario.name, "vlan");
        let Step::Configure(configure) = &scenario.steps[0] else {
            panic!("expected configure step");
        };
        assert_eq!(configure.settle, Duration::from_secs(1));
        assert_eq!(configure.commands.len(), 3);

        let Step::Verify(verify) = &scenario.steps[1] else {
            panic!("expected verify step");
        };
        assert_eq!(verify.inject.vlan, Some(30));
        assert_eq!(verify.expect[0].policy, Policy::MustAppear);
        assert_eq!(verify.expect[1].policy, Policy::MustNotAppear);
        assert_eq!(verify.expect[1].vlan, Some(40));
        assert_eq!(verify.expect[1].timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn raw_frames_and_default_labels() {
        let toml = r#"
            [[scenarios]]
            name = "raw"
            [[scenarios.steps]]
            type = "verify"
            frame = { kind = "raw", hex = "ffffffffffffaaaaaaaaaaaa88b5ff" }
            inject = { host = 3 }
            expect = [{ host = 4 }]
        "#;
        let cfg = SuiteConfig::from_toml_str(toml).unwrap();
        let Step::Verify(verify) = &cfg.scenarios[0].steps[0] else {
            panic!("expected verify step");
        };
        assert_eq!(verify.label, "verify #1");
        let FrameSpec::Raw(frame) = &verify.frame else {
            panic!("expected raw frame");
        };
        assert_eq!(frame.len(), 15);
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(SuiteConfig::from_toml_str("version = 2").is_err());
        assert!(SuiteConfig::from_toml_str("version = ").is_err());

        let bad_vlan = r#"
            [[scenarios]]
            name = "x"
            [[scenarios.steps]]
            type = "verify"
            frame = { kind = "arp-request", src = 1, target = 2 }
            inject = { host = 1, vlan = 5000 }
            expect = [{ host = 2 }]
        "#;
        assert!(matches!(
            SuiteConfig::from_toml_str(bad_vlan),
            Err(ConfigError::InvalidVlan(5000))
        ));

        let unknown_host = r#"
            [[scenarios]]
            name = "x"
            [[scenarios.steps]]
            type = "verify"
            frame = { kind = "icmp-echo", src = 1, dst = 2 }
            inject = { host = 1 }
            expect = [{ host = 9 }]
        "#;
        assert!(matches!(
            SuiteConfig::from_toml_str(unknown_host),
            Err(ConfigError::Scenario { .. })
        ));

        let bad_mac = r#"
            [[hosts]]
            id = 1
            name = "h1"
            iface = "if1-h1"
            mac = "nope"
            ip = "10.0.0.1"
        "#;
        assert!(matches!(
            SuiteConfig::from_toml_str(bad_mac),
            Err(ConfigError::InvalidMac(_))
        ));
    }
}
