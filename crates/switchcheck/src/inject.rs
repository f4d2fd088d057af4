use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use switchcheck_common::frame::Frame;
use switchcheck_common::topology::Host;

use crate::error::HarnessError;
use crate::host::HostContext;

/// Fires stimulus frames through the frame helper.
#[derive(Debug, Clone)]
pub struct Injector {
    ctx: Arc<HostContext>,
    probe: String,
    readiness_delay: Duration,
}

impl Injector {
    pub fn new(ctx: Arc<HostContext>, probe: impl Into<String>, readiness_delay: Duration) -> Self {
        Self {
            ctx,
            probe: probe.into(),
            readiness_delay,
        }
    }

    /// Sleep the readiness delay, then transmit `frame` once on the host's
    /// interface (or its VLAN view) and wait for the helper to finish.
    ///
    /// A nonzero helper exit is only logged: a lost stimulus shows up as
    /// failed expectations.
    pub async fn inject(
        &self,
        host: &Host,
        frame: &Frame,
        vlan: Option<u16>,
    ) -> Result<(), HarnessError> {
        let selector = host.selector(vlan);
        tokio::time::sleep(self.readiness_delay).await;

        let mut cmd = self.ctx.command(&host.name, &self.probe);
        cmd.arg("send")
            .arg("--iface")
            .arg(selector.name())
            .arg("--frame")
            .arg(frame.to_hex())
            .stdin(Stdio::null());

        let output = cmd.output().await.map_err(|source| HarnessError::Spawn {
            what: format!("injector on {selector}@{}", host.name),
            source,
        })?;

        if output.status.success() {
            tracing::debug!(host = %host.name, %selector, len = frame.len(), "frame injected");
        } else {
            tracing::warn!(
                host = %host.name,
                %selector,
                status = %output.status,
                stdout = %String::from_utf8_lossy(&output.stdout).trim_end(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                "injection helper failed"
            );
        }
        Ok(())
    }
}
