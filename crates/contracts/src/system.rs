//! SystemId - detector subsystem identifiers
//!
//! The set of subsystems is fixed at build time. The position of a system in
//! [`SYSTEMS`] is its split-target index in per-system mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric subsystem identifier as found in microslice descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(pub u16);

/// Known subsystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    pub name: &'static str,
    pub id: SystemId,
}

/// Known subsystems, in target order
pub const SYSTEMS: [SystemInfo; 8] = [
    SystemInfo { name: "MVD", id: SystemId(0x20) },
    SystemInfo { name: "STS", id: SystemId(0x10) },
    SystemInfo { name: "RICH", id: SystemId(0x30) },
    SystemInfo { name: "MUCH", id: SystemId(0x50) },
    SystemInfo { name: "TRD", id: SystemId(0x40) },
    SystemInfo { name: "TOF", id: SystemId(0x60) },
    SystemInfo { name: "PSD", id: SystemId(0x80) },
    SystemInfo { name: "T0", id: SystemId(0x90) },
];

impl SystemId {
    /// Parse a decimal or `0x`-prefixed hexadecimal id
    ///
    /// Surrounding whitespace and trailing NUL bytes are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        let value = match text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
        {
            Some(hex) => u16::from_str_radix(hex, 16).ok()?,
            None => text.parse::<u16>().ok()?,
        };
        Some(Self(value))
    }

    /// Position in [`SYSTEMS`], `None` for unknown ids
    pub fn position(self) -> Option<usize> {
        SYSTEMS.iter().position(|s| s.id == self)
    }

    /// Look up a known system by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        SYSTEMS
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.id)
    }

    /// Name of a known system
    pub fn name(self) -> Option<&'static str> {
        SYSTEMS.iter().find(|s| s.id == self).map(|s| s.name)
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_and_hex() {
        assert_eq!(SystemId::parse("16"), Some(SystemId(0x10)));
        assert_eq!(SystemId::parse("0x60"), Some(SystemId(0x60)));
        assert_eq!(SystemId::parse(" 0X90\0"), Some(SystemId(0x90)));
        assert_eq!(SystemId::parse("sts"), None);
        assert_eq!(SystemId::parse("0x"), None);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(SystemId(0x10).position(), Some(1));
        assert_eq!(SystemId(0x11).position(), None);
        assert_eq!(SystemId::from_name("tof"), Some(SystemId(0x60)));
        assert_eq!(SystemId(0x90).name(), Some("T0"));
        assert_eq!(SystemId(0x20).to_string(), "0x20");
    }
}
