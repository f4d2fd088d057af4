//! Outcome evaluation.
//!
//! `fail ⇔ observed == (policy == MustNotAppear)`, where `observed` is the
//! listener exiting 0. A listener that neither matched nor timed out cleanly
//! is fatal whatever the policy.

use std::process::ExitStatus;

use switchcheck_common::protocol::{EXIT_NO_MATCH, EXIT_OK};

use crate::error::HarnessError;
use crate::expect::ArmedExpectation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Observed,
    NotObserved,
    Crashed,
}

pub fn classify(status: &ExitStatus) -> ListenerExit {
    match status.code() {
        Some(code) if code == i32::from(EXIT_OK) => ListenerExit::Observed,
        Some(code) if code == i32::from(EXIT_NO_MATCH) => ListenerExit::NotObserved,
        _ => ListenerExit::Crashed,
    }
}

/// Block on one listener and judge it against its policy.
pub async fn resolve(armed: ArmedExpectation) -> Result<(), HarnessError> {
    let host = armed.host.clone();
    let host_id = armed.host_id;
    let selector = armed.selector.to_string();
    let policy = armed.policy;

    let (status, diagnostics) = armed
        .finish()
        .await
        .map_err(|e| HarnessError::io(format!("wait for listener {selector}@{host}"), e))?;

    let observed = match classify(&status) {
        ListenerExit::Observed => true,
        ListenerExit::NotObserved => false,
        ListenerExit::Crashed => {
            tracing::error!(
                host = %host,
                host_id,
                %selector,
                %policy,
                %status,
                stdout = %diagnostics.stdout,
                stderr = %diagnostics.stderr,
                "listener failed"
            );
            return Err(HarnessError::ListenerCrashed {
                host,
                selector,
                status: status.to_string(),
                diagnostics,
            });
        }
    };

    if policy.fails(observed) {
        tracing::error!(
            host = %host,
            host_id,
            %selector,
            %policy,
            %status,
            stdout = %diagnostics.stdout,
            stderr = %diagnostics.stderr,
            "expectation failed"
        );
        return Err(HarnessError::MatchFailure {
            host,
            selector,
            policy,
            status: status.to_string(),
            diagnostics,
        });
    }

    tracing::info!("{selector}@{host} OK");
    Ok(())
}
