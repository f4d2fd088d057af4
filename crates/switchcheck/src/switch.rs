//! Switch controller: owns the switch-under-test process.
//!
//! The switch is configured through a line-oriented shell on its stdin.
//! Commands are not acknowledged and output is not correlated with the
//! command that produced it; callers drain whatever arrived within a quiet
//! window.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use switchcheck_common::config::HarnessConfig;
use switchcheck_common::topology::Topology;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;

use crate::error::HarnessError;
use crate::host::HostContext;

const READ_CHUNK: usize = 4096;

pub struct SwitchSession {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    command_settle: Duration,
    poll_window: Duration,
    terminate_grace: Duration,
}

impl SwitchSession {
    /// Spawn the switch with one positional argument per switch-facing
    /// interface, ordered by host id.
    pub fn start(
        config: &HarnessConfig,
        ctx: &HostContext,
        topology: &Topology,
    ) -> Result<Self, HarnessError> {
        let interfaces = topology.switch_interfaces();
        let mut cmd = ctx.command(&config.switch_context, &config.switch_binary);
        cmd.args(&interfaces)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            what: format!("switch {}", config.switch_binary),
            source,
        })?;
        let stdin = child.stdin.take();
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::io("switch stdout", io::ErrorKind::BrokenPipe.into()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "switch stdout read failed");
                        break;
                    }
                }
            }
        });

        tracing::info!(
            binary = %config.switch_binary,
            context = %config.switch_context,
            pid = ?child.id(),
            interfaces = %interfaces.join(" "),
            "switch started"
        );

        Ok(Self {
            child: Some(child),
            stdin,
            output: rx,
            command_settle: config.timing.command_settle,
            poll_window: config.timing.poll_window,
            terminate_grace: config.timing.terminate_grace,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Write one command line and flush. Nothing is read back.
    pub async fn send_command(&mut self, text: &str) -> Result<(), HarnessError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            HarnessError::Channel(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "switch session terminated",
            ))
        })?;
        let line = format!("{}\n", text.trim());
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(HarnessError::Channel)?;
        stdin.flush().await.map_err(HarnessError::Channel)?;
        tracing::debug!(command = text.trim(), "switch command sent");
        Ok(())
    }

    /// Send each command followed by the inter-command settle delay.
    pub async fn send_commands<S: AsRef<str>>(
        &mut self,
        commands: &[S],
    ) -> Result<(), HarnessError> {
        for command in commands {
            self.send_command(command.as_ref()).await?;
            tokio::time::sleep(self.command_settle).await;
        }
        Ok(())
    }

    /// Drain output using the configured poll window.
    pub async fn read_output(&mut self) -> String {
        self.read_output_within(self.poll_window).await
    }

    /// Collect chunks until `window` passes without new data or the stream
    /// closes.
    pub async fn read_output_within(&mut self, window: Duration) -> String {
        let mut collected = Vec::new();
        while let Ok(Some(chunk)) = tokio::time::timeout(window, self.output.recv()).await {
            collected.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&collected).into_owned()
    }

    /// Close stdin, ask the switch to exit and reap it. Returns `None` when
    /// the session was already terminated.
    pub async fn terminate(&mut self) -> Result<Option<ExitStatus>, HarnessError> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };

        if let Some(pid) = child.id() {
            // SAFETY: `pid` is the id of a child we have not reaped yet, so it
            // cannot have been recycled. A process that already exited makes
            // this a no-op.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }

        let status = match tokio::time::timeout(self.terminate_grace, child.wait()).await {
            Ok(result) => result.map_err(|e| HarnessError::io("wait for switch", e))?,
            Err(_) => {
                tracing::warn!(
                    grace_ms = self.terminate_grace.as_millis() as u64,
                    "switch did not exit in time, killing"
                );
                let _ = child.start_kill();
                child
                    .wait()
                    .await
                    .map_err(|e| HarnessError::io("reap switch", e))?
            }
        };
        tracing::info!(%status, "switch exited");
        Ok(Some(status))
    }
}
