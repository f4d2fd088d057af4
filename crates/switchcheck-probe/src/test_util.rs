use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonically increasing counter for generating unique interface names.
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Raw sockets and veth creation need root (CAP_NET_RAW + CAP_NET_ADMIN)
/// and the `ip` tool.
pub fn check_privileges() -> bool {
    // SAFETY: geteuid has no preconditions.
    if unsafe { libc::geteuid() } != 0 {
        return false;
    }
    match Command::new("ip").arg("link").output() {
        Ok(o) => o.status.success(),
        Err(_) => false,
    }
}

/// A veth pair in the current namespace, deleted on drop.
pub struct VethPair {
    pub a: String,
    pub b: String,
}

impl VethPair {
    pub fn create(prefix: &str) -> std::io::Result<Self> {
        let seq = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tag = format!("{:x}{}", std::process::id() % 0xFFFF, seq);
        // Interface names are limited to 15 characters.
        let a: String = format!("{prefix}a{tag}").chars().take(15).collect();
        let b: String = format!("{prefix}b{tag}").chars().take(15).collect();

        let _ = Command::new("ip").args(["link", "del", &a]).output();
        let output = Command::new("ip")
            .args(["link", "add", &a, "type", "veth", "peer", "name", &b])
            .output()?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "Failed to create veth pair: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let pair = VethPair { a, b };
        for name in [&pair.a, &pair.b] {
            let output = Command::new("ip").args(["link", "set", name, "up"]).output()?;
            if !output.status.success() {
                return Err(std::io::Error::other(format!(
                    "Failed to set {name} up: {}",
                    String::from_utf8_lossy(&output.stderr)
                )));
            }
        }
        Ok(pair)
    }
}

impl Drop for VethPair {
    fn drop(&mut self) {
        let _ = Command::new("ip").args(["link", "del", &self.a]).status();
    }
}
