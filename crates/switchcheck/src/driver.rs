//! Scenario driver.
//!
//! Lifecycle per scenario: start a fresh switch session, settle, run the
//! steps in order, then tear down. Teardown runs on failure too. A run over
//! several scenarios stops at the first failing one.
//!
//! A verification step arms every expectation in declared order, optionally
//! waits for listener readiness, injects exactly one frame and resolves the
//! expectations in arming order. The first failed resolution ends the step.
//! Listeners still armed at that point are left to exit at their own timeout.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use switchcheck_common::config::{HarnessConfig, Readiness};
use switchcheck_common::scenario::{ConfigureStep, Scenario, Step, VerifyStep};
use switchcheck_common::topology::Topology;

use crate::error::HarnessError;
use crate::evaluate;
use crate::expect::Listener;
use crate::host::HostContext;
use crate::inject::Injector;
use crate::switch::SwitchSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    NotRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    pub steps_total: usize,
    pub steps_completed: usize,
    pub expectations_passed: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Everything the switch printed during the scenario, teardown included.
    pub switch_output: String,
}

impl ScenarioReport {
    fn new(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.clone(),
            status: ScenarioStatus::NotRun,
            steps_total: scenario.steps.len(),
            steps_completed: 0,
            expectations_passed: 0,
            elapsed_ms: 0,
            error: None,
            switch_output: String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioReport>,
    pub elapsed_ms: u64,
    /// The error that stopped the run.
    #[serde(skip)]
    pub failure: Option<HarnessError>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        for s in &self.scenarios {
            let status = match s.status {
                ScenarioStatus::Passed => "PASS",
                ScenarioStatus::Failed => "FAIL",
                ScenarioStatus::NotRun => "SKIP",
            };
            let _ = writeln!(
                out,
                "{status:<4} {:<16} steps {}/{} expectations {} ({} ms)",
                s.name, s.steps_completed, s.steps_total, s.expectations_passed, s.elapsed_ms
            );
            if let Some(error) = &s.error {
                let _ = writeln!(out, "     {error}");
            }
        }
        let passed = self
            .scenarios
            .iter()
            .filter(|s| s.status == ScenarioStatus::Passed)
            .count();
        let _ = write!(
            out,
            "{passed}/{} scenarios passed in {} ms",
            self.scenarios.len(),
            self.elapsed_ms
        );
        out
    }
}

pub struct ScenarioDriver {
    config: HarnessConfig,
    topology: Arc<Topology>,
    ctx: Arc<HostContext>,
    listener: Listener,
    injector: Injector,
}

impl ScenarioDriver {
    pub fn new(config: HarnessConfig, topology: Arc<Topology>) -> Self {
        let ctx = Arc::new(HostContext::new(config.exec_wrapper.clone()));
        let listener = Listener::new(ctx.clone(), config.probe.clone());
        let injector = Injector::new(ctx.clone(), config.probe.clone(), config.timing.readiness_delay);
        Self {
            config,
            topology,
            ctx,
            listener,
            injector,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Run every scenario in order, stopping at the first failure. Scenarios
    /// after it are reported as not run.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> RunReport {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(scenarios.len());
        let mut failure = None;

        for scenario in scenarios {
            if failure.is_some() {
                reports.push(ScenarioReport::new(scenario));
                continue;
            }
            let mut report = ScenarioReport::new(scenario);
            if let Err(e) = self.execute(scenario, &mut report).await {
                tracing::error!(scenario = %scenario.name, error = %e, "scenario failed");
                failure = Some(e);
            }
            reports.push(report);
        }

        RunReport {
            scenarios: reports,
            elapsed_ms: started.elapsed().as_millis() as u64,
            failure,
        }
    }

    /// Run one scenario against a fresh switch session.
    pub async fn run_scenario(&self, scenario: &Scenario) -> Result<ScenarioReport, HarnessError> {
        let mut report = ScenarioReport::new(scenario);
        self.execute(scenario, &mut report).await?;
        Ok(report)
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        report: &mut ScenarioReport,
    ) -> Result<(), HarnessError> {
        let started = Instant::now();
        tracing::info!(
            scenario = %scenario.name,
            steps = scenario.steps.len(),
            description = %scenario.description,
            "scenario starting"
        );

        let result = self.execute_inner(scenario, report).await;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => {
                report.status = ScenarioStatus::Passed;
                tracing::info!(scenario = %scenario.name, elapsed_ms = report.elapsed_ms, "scenario passed");
            }
            Err(e) => {
                report.status = ScenarioStatus::Failed;
                report.error = Some(e.to_string());
            }
        }
        result
    }

    async fn execute_inner(
        &self,
        scenario: &Scenario,
        report: &mut ScenarioReport,
    ) -> Result<(), HarnessError> {
        scenario.validate(&self.topology)?;

        let mut session = SwitchSession::start(&self.config, &self.ctx, &self.topology)?;
        let result = self.run_steps(&mut session, scenario, report).await;
        self.teardown(&mut session, report).await;
        result
    }

    async fn run_steps(
        &self,
        session: &mut SwitchSession,
        scenario: &Scenario,
        report: &mut ScenarioReport,
    ) -> Result<(), HarnessError> {
        tokio::time::sleep(self.config.timing.startup_settle).await;
        report.switch_output.push_str(&session.read_output().await);

        for (index, step) in scenario.steps.iter().enumerate() {
            tracing::info!(
                scenario = %scenario.name,
                step = index + 1,
                label = step.label(),
                "step"
            );
            match step {
                Step::Configure(configure) => self.configure(session, configure, report).await?,
                Step::Verify(verify) => self.verify(verify, report).await?,
            }
            report.steps_completed += 1;
        }
        Ok(())
    }

    async fn configure(
        &self,
        session: &mut SwitchSession,
        step: &ConfigureStep,
        report: &mut ScenarioReport,
    ) -> Result<(), HarnessError> {
        session.send_commands(&step.commands[..]).await?;
        tokio::time::sleep(step.settle).await;
        let output = session.read_output().await;
        if !output.is_empty() {
            tracing::debug!(label = %step.label, output = %output.trim_end(), "switch output");
        }
        report.switch_output.push_str(&output);
        Ok(())
    }

    async fn verify(&self, step: &VerifyStep, report: &mut ScenarioReport) -> Result<(), HarnessError> {
        let frame = step.frame.build(&self.topology)?;
        let inject_host = self.topology.host(step.inject.host)?;

        let mut armed = Vec::with_capacity(step.expect.len());
        for expect in &step.expect {
            let host = self.topology.host(expect.host)?;
            let timeout = expect.timeout.unwrap_or(self.config.timing.expect_timeout);
            armed.push(
                self.listener
                    .arm(host, &frame, expect.vlan, expect.policy, timeout)?,
            );
        }

        if self.config.readiness == Readiness::Handshake {
            for expectation in &mut armed {
                if !expectation.wait_ready(self.config.timing.ready_timeout).await {
                    tracing::warn!(
                        host = %expectation.host,
                        selector = %expectation.selector,
                        "listener did not report ready"
                    );
                }
            }
        }

        self.injector
            .inject(inject_host, &frame, step.inject.vlan)
            .await?;

        for expectation in armed {
            evaluate::resolve(expectation).await?;
            report.expectations_passed += 1;
        }
        Ok(())
    }

    async fn teardown(&self, session: &mut SwitchSession, report: &mut ScenarioReport) {
        for command in &self.config.teardown_commands {
            if let Err(e) = session.send_command(command).await {
                tracing::warn!(command = %command, error = %e, "teardown command not delivered");
                break;
            }
            tokio::time::sleep(self.config.timing.command_settle).await;
        }
        let output = session.read_output().await;
        if !output.is_empty() {
            tracing::info!("switch state at teardown:\n{}", output.trim_end());
        }
        report.switch_output.push_str(&output);

        if let Err(e) = session.terminate().await {
            tracing::warn!(error = %e, "switch termination failed");
        }
    }
}
