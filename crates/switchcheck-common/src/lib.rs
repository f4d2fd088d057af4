//! Shared types for the switchcheck harness.
//!
//! This crate contains:
//! - **Topology**: the immutable host table and switch-facing interface names
//! - **Frames**: exact byte sequences, hex wire form, stimulus builders
//! - **Selectors**: `base` / `base.vlan` interface views
//! - **Switch commands**: typed rendering of the switch CLI vocabulary
//! - **Scenarios**: configuration and verification steps
//! - **Config**: TOML suite files and harness settings
//! - **Protocol**: lines and exit codes spoken by the frame helper

pub mod command;
pub mod config;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod scenario;
pub mod selector;
pub mod topology;
