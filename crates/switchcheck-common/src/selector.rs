//! Interface selectors: a base interface, optionally viewed through a VLAN
//! sub-interface named `<base>.<vlan>`.

use std::fmt;

use crate::error::ConfigError;

/// Highest usable 802.1Q VLAN id.
pub const MAX_VLAN: u16 = 4095;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceSelector {
    pub base: String,
    pub vlan: Option<u16>,
}

impl InterfaceSelector {
    pub fn new(base: impl Into<String>, vlan: Option<u16>) -> Self {
        Self {
            base: base.into(),
            vlan,
        }
    }

    /// Kernel name of the selected view.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InterfaceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vlan {
            Some(vlan) => write!(f, "{}.{}", self.base, vlan),
            None => write!(f, "{}", self.base),
        }
    }
}

/// Check that `vlan` is within 1..=4095.
pub fn validate_vlan(vlan: u32) -> Result<u16, ConfigError> {
    if vlan == 0 || vlan > MAX_VLAN as u32 {
        return Err(ConfigError::InvalidVlan(vlan));
    }
    Ok(vlan as u16)
}
