//! Per-host execution boundary.
//!
//! Hosts live in externally provisioned, isolated network contexts. A
//! command reaches one through a privileged wrapper that takes the context
//! name followed by the command line, e.g. `sudo scripts/host-exec host2 …`
//! or `sudo ip netns exec host2 …`.

use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    wrapper: Vec<String>,
}

impl HostContext {
    pub fn new(wrapper: Vec<String>) -> Self {
        Self { wrapper }
    }

    pub fn wrapper(&self) -> &[String] {
        &self.wrapper
    }

    /// Build `wrapper… <context> <program>`. Arguments are appended by the
    /// caller. With an empty wrapper the program runs directly and `context`
    /// is ignored.
    pub fn command(&self, context: &str, program: &str) -> Command {
        match self.wrapper.split_first() {
            Some((head, rest)) => {
                let mut cmd = Command::new(head);
                cmd.args(rest).arg(context).arg(program);
                cmd
            }
            None => Command::new(program),
        }
    }
}
