//! Frame expectations: background listeners armed before a stimulus.
//!
//! Arming spawns one `frame-probe expect` per expectation and returns at
//! once. The listener decides match or timeout on its own; the handle is
//! consumed when the outcome is resolved.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use switchcheck_common::frame::Frame;
use switchcheck_common::protocol::READY_LINE;
use switchcheck_common::scenario::Policy;
use switchcheck_common::selector::InterfaceSelector;
use switchcheck_common::topology::Host;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Diagnostics, HarnessError};
use crate::host::HostContext;

#[derive(Debug, Clone)]
pub struct Listener {
    ctx: Arc<HostContext>,
    probe: String,
}

impl Listener {
    pub fn new(ctx: Arc<HostContext>, probe: impl Into<String>) -> Self {
        Self {
            ctx,
            probe: probe.into(),
        }
    }

    /// Start capturing on the host's interface (or its VLAN view) for
    /// `frame`, for at most `timeout`.
    pub fn arm(
        &self,
        host: &Host,
        frame: &Frame,
        vlan: Option<u16>,
        policy: Policy,
        timeout: Duration,
    ) -> Result<ArmedExpectation, HarnessError> {
        let selector = host.selector(vlan);
        let mut cmd = self.ctx.command(&host.name, &self.probe);
        cmd.arg("expect")
            .arg("--iface")
            .arg(selector.name())
            .arg("--frame")
            .arg(frame.to_hex())
            .arg("--timeout-ms")
            .arg(timeout.as_millis().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            what: format!("listener on {selector}@{}", host.name),
            source,
        })?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let stdout = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let mut ready_tx = Some(ready_tx);
                let mut reader = BufReader::new(stdout);
                let mut raw = Vec::new();
                let mut collected = Vec::new();
                loop {
                    raw.clear();
                    match reader.read_until(b'\n', &mut raw).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    // Helper output is not guaranteed to be UTF-8.
                    let line = String::from_utf8_lossy(&raw)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if line.trim() == READY_LINE {
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(());
                        }
                        continue;
                    }
                    collected.push(line);
                }
                collected
            })
        });
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        tracing::debug!(
            host = %host.name,
            %selector,
            %policy,
            timeout_ms = timeout.as_millis() as u64,
            "listener armed"
        );

        Ok(ArmedExpectation {
            host: host.name.clone(),
            host_id: host.id,
            selector,
            policy,
            child,
            ready: Some(ready_rx),
            stdout,
            stderr,
        })
    }
}

/// A live listener awaiting resolution.
pub struct ArmedExpectation {
    pub host: String,
    pub host_id: u32,
    pub selector: InterfaceSelector,
    pub policy: Policy,
    child: Child,
    ready: Option<oneshot::Receiver<()>>,
    stdout: Option<JoinHandle<Vec<String>>>,
    stderr: Option<JoinHandle<String>>,
}

impl ArmedExpectation {
    /// Wait up to `limit` for the listener's `READY` line. Returns `false`
    /// if it did not arrive, including when the listener exited first.
    pub async fn wait_ready(&mut self, limit: Duration) -> bool {
        let Some(rx) = self.ready.take() else {
            return true;
        };
        matches!(tokio::time::timeout(limit, rx).await, Ok(Ok(())))
    }

    /// Wait for the listener to exit and collect what it printed.
    pub(crate) async fn finish(mut self) -> std::io::Result<(ExitStatus, Diagnostics)> {
        let status = self.child.wait().await?;
        let stdout = match self.stdout.take() {
            Some(task) => task.await.unwrap_or_default().join("\n"),
            None => String::new(),
        };
        let stderr = match self.stderr.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        Ok((status, Diagnostics { stdout, stderr }))
    }
}
