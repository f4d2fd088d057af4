//! Unprivileged stand-ins for the switch and the frame helper.
//!
//! [`FakeLab`] writes a few shell scripts to a scratch directory:
//!
//! - a **hub helper** speaking the frame helper protocol, where `send`
//!   delivers the frame to every listener on another host (a switch that
//!   always floods and ignores VLANs)
//! - a **switched helper** whose `send` forwards like a learning switch,
//!   using the port state the fake switch keeps
//! - a **fake switch** that logs its arguments and commands, tracks access,
//!   trunk, monitor and shutdown state per port and answers the show
//!   commands
//! - a **crashing helper** that exits with a helper error, and a
//!   **garbled helper** whose output is not UTF-8
//!
//! The host wrapper drops the context name and runs the program under `sh`,
//! so the scripts never need to be executable.

#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use switchcheck_common::config::{HarnessConfig, Readiness, Timing};
use tempfile::TempDir;

/// Argument parsing and `expect`, shared by both forwarding helpers. The
/// helper body defines `send_frame`.
const HELPER_MAIN: &str = r#"
mode=$1; shift
while [ $# -gt 0 ]; do
  case "$1" in
    --iface) iface=$2; shift 2 ;;
    --frame) frame=$2; shift 2 ;;
    --timeout-ms) timeout=$2; shift 2 ;;
    *) echo "unknown argument $1" >&2; exit 2 ;;
  esac
done
box="$LAB/listen/$iface"
case "$mode" in
  send)
    send_frame
    echo "$iface $frame" >> "$LAB/sent.log"
    exit 0
    ;;
  expect)
    : > "$box"
    echo READY
    ticks=$((timeout / 50))
    i=0
    while [ "$i" -le "$ticks" ]; do
      if grep -qxF "$frame" "$box"; then
        rm -f "$box"
        echo MATCH
        exit 0
      fi
      sleep 0.05
      i=$((i + 1))
    done
    if [ -s "$box" ]; then cat "$box"; else echo "No packets received"; fi
    rm -f "$box"
    exit 1
    ;;
  *)
    echo "unknown mode $mode" >&2
    exit 2
    ;;
esac
"#;

const HUB_SEND: &str = r#"
send_frame() {
  base=${iface%%.*}
  for b in "$LAB"/listen/*; do
    [ -e "$b" ] || continue
    name=$(basename "$b")
    [ "${name%%.*}" = "$base" ] && continue
    echo "$frame" >> "$b"
  done
}
"#;

/// Host interface `ifN-hostN[.V]` sits on switch port `ifN-sw`.
const SWITCHED_SEND: &str = r#"
STATE="$LAB/state"

port_of() { _base=${1%%.*}; echo "${_base%%-*}-sw"; }
tag_of() { case "$1" in *.*) echo "${1##*.}" ;; esac; }
in_list() { case " $2 " in *" $1 "*) return 0 ;; esac; return 1; }

# VLAN of a frame carrying tag $2 on port $1; empty when the port drops it.
vlan_on() {
  d="$STATE/port/$1"
  [ -d "$d" ] || return 0
  [ -e "$d/down" ] && return 0
  case "$(cat "$d/mode")" in
    access) [ -z "$2" ] && cat "$d/access" ;;
    trunk) [ -n "$2" ] && in_list "$2" "$(cat "$d/trunk")" && echo "$2" ;;
  esac
  return 0
}

send_frame() {
  in_port=$(port_of "$iface")
  vlan=$(vlan_on "$in_port" "$(tag_of "$iface")")
  [ -n "$vlan" ] || return 0
  dst=$(printf %s "$frame" | cut -c1-12)
  src=$(printf %s "$frame" | cut -c13-24)
  echo "$in_port" > "$STATE/fib/${src}_$vlan"
  out=""
  [ -e "$STATE/fib/${dst}_$vlan" ] && out=$(cat "$STATE/fib/${dst}_$vlan")

  egress=""
  for b in "$LAB"/listen/*; do
    [ -e "$b" ] || continue
    name=$(basename "$b")
    port=$(port_of "$name")
    [ "$port" = "$in_port" ] && continue
    [ -n "$out" ] && [ "$port" != "$out" ] && continue
    [ "$(vlan_on "$port" "$(tag_of "$name")")" = "$vlan" ] || continue
    echo "$frame" >> "$b"
    egress="$egress $port"
  done

  # Monitor ports copy what enters their target, or leaves it towards a
  # listener.
  for b in "$LAB"/listen/*; do
    [ -e "$b" ] || continue
    d="$STATE/port/$(port_of "$(basename "$b")")"
    [ -e "$d/target" ] && [ ! -e "$d/down" ] || continue
    target=$(cat "$d/target")
    if [ "$target" = "$in_port" ] || in_list "$target" "$egress"; then
      echo "$frame" >> "$b"
    fi
  done
}
"#;

const FAKE_SWITCH: &str = r#"
STATE="$LAB/state"
rm -rf "$STATE"
mkdir -p "$STATE/fib"
for p in "$@"; do
  mkdir -p "$STATE/port/$p"
  echo access > "$STATE/port/$p/mode"
  echo 1 > "$STATE/port/$p/access"
  : > "$STATE/port/$p/trunk"
done
ports="$*"

clear_fib() {
  for f in "$STATE"/fib/*; do
    [ -e "$f" ] || continue
    [ "$(cat "$f")" = "$1" ] && rm -f "$f"
  done
}

echo "args $*" >> "$LAB/switch.log"
echo "switch up on $*"
cur=""
while IFS= read -r line; do
  echo "cmd $line" >> "$LAB/switch.log"
  d="$STATE/port/$cur"
  arg=${line##* }
  case "$line" in
    "interface "*)
      cur=${line#interface }
      [ -d "$STATE/port/$cur" ] || { echo "no such interface $cur"; cur=""; }
      ;;
    exit) cur="" ;;
    "show interfaces") echo "interfaces: $ports" ;;
    "show fib")
      n=0
      for f in "$STATE"/fib/*; do [ -e "$f" ] && n=$((n + 1)); done
      echo "fib: $n entries"
      ;;
    *)
      [ -n "$cur" ] || continue
      case "$line" in
        "switchport mode access")
          echo access > "$d/mode"; rm -f "$d/target"; clear_fib "$cur" ;;
        "switchport access vlan "*)
          echo "$arg" > "$d/access"; clear_fib "$cur" ;;
        "no switchport access vlan")
          echo 1 > "$d/access"; clear_fib "$cur" ;;
        "switchport mode trunk")
          echo trunk > "$d/mode"; rm -f "$d/target"; clear_fib "$cur" ;;
        "switchport trunk vlans add "*)
          vlans=$(cat "$d/trunk"); echo "$vlans $arg" > "$d/trunk" ;;
        "switchport trunk vlans remove "*)
          keep=""
          for v in $(cat "$d/trunk"); do [ "$v" = "$arg" ] || keep="$keep $v"; done
          echo "$keep" > "$d/trunk"
          ;;
        "no switchport trunk vlans") : > "$d/trunk" ;;
        "switchport mode monitor "*)
          echo monitor > "$d/mode"; echo "$arg" > "$d/target"; clear_fib "$cur" ;;
        shutdown) : > "$d/down"; clear_fib "$cur" ;;
        "no shutdown") rm -f "$d/down" ;;
      esac
      ;;
  esac
done
"#;

const CRASH_HELPER: &str = r#"
echo READY
echo "helper exploded" >&2
exit 3
"#;

const GARBLED_HELPER: &str = r#"
echo READY
printf 'captured \377\376 bytes\n'
echo "ffffffffffff020000000001"
exit 1
"#;

/// Scratch directory holding the fake helpers, removed on drop.
pub struct FakeLab {
    dir: TempDir,
}

impl FakeLab {
    pub fn new(prefix: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        fs::create_dir(dir.path().join("listen"))?;
        let lab = FakeLab { dir };
        lab.write_script("hub-helper.sh", &[HUB_SEND, HELPER_MAIN])?;
        lab.write_script("switched-helper.sh", &[SWITCHED_SEND, HELPER_MAIN])?;
        lab.write_script("fake-switch.sh", &[FAKE_SWITCH])?;
        lab.write_script("crash-helper.sh", &[CRASH_HELPER])?;
        lab.write_script("garbled-helper.sh", &[GARBLED_HELPER])?;
        Ok(lab)
    }

    fn write_script(&self, name: &str, parts: &[&str]) -> io::Result<()> {
        let mut body = format!("LAB='{}'\n", self.root().display());
        body.extend(parts.iter().copied());
        fs::write(self.root().join(name), body)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn script(&self, name: &str) -> String {
        self.root().join(name).display().to_string()
    }

    pub fn wrapper(&self) -> Vec<String> {
        vec![
            "sh".into(),
            "-c".into(),
            r#"shift; exec sh "$@""#.into(),
            "switchcheck-wrap".into(),
        ]
    }

    pub fn hub_helper(&self) -> String {
        self.script("hub-helper.sh")
    }

    pub fn switched_helper(&self) -> String {
        self.script("switched-helper.sh")
    }

    pub fn crash_helper(&self) -> String {
        self.script("crash-helper.sh")
    }

    pub fn garbled_helper(&self) -> String {
        self.script("garbled-helper.sh")
    }

    pub fn fake_switch(&self) -> String {
        self.script("fake-switch.sh")
    }

    /// Lines the fake switch logged: `args …` once per start, then
    /// `cmd …` per command received.
    pub fn switch_log(&self) -> Vec<String> {
        read_lines(&self.root().join("switch.log"))
    }

    /// `<iface> <hex>` per frame a helper transmitted.
    pub fn sent_log(&self) -> Vec<String> {
        read_lines(&self.root().join("sent.log"))
    }

    /// Harness settings pointing at the hub helper and the fake switch, with
    /// delays short enough for tests.
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            exec_wrapper: self.wrapper(),
            probe: self.hub_helper(),
            switch_binary: self.fake_switch(),
            switch_context: "sw".into(),
            timing: Timing {
                command_settle: Duration::from_millis(10),
                readiness_delay: Duration::from_millis(500),
                expect_timeout: Duration::from_millis(1500),
                poll_window: Duration::from_millis(50),
                configure_settle: Duration::from_millis(50),
                startup_settle: Duration::from_millis(50),
                terminate_grace: Duration::from_millis(500),
                ready_timeout: Duration::from_secs(2),
            },
            readiness: Readiness::FixedDelay,
            teardown_commands: vec!["show interfaces".into(), "show fib".into()],
        }
    }

    /// As [`harness_config`](Self::harness_config), forwarding through the
    /// switched helper.
    pub fn switched_config(&self) -> HarnessConfig {
        HarnessConfig {
            probe: self.switched_helper(),
            ..self.harness_config()
        }
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
