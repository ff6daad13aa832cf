//! Status flag interpretation
//!
//! Every record carries a 32-bit status mask. Bits are positionally named
//! `bit0..bit31` by default; an optional external name table (supplied by a
//! configuration collaborator, typically as a JSON keyed mapping) overrides
//! the display names only. Interpolation semantics always key off fixed bit
//! positions, never off configured names: renaming bit 1 does not change
//! which samples the analog interpolator treats as change-flagged.
//!
//! Name lookups are memoized per distinct status value because status values
//! repeat heavily across a series. The cache is an explicit, constructed
//! object with a construct-once/read-many contract: reads are safe
//! concurrently once an entry is populated, and first-touch population is
//! serialized by the cache lock. Embedders that want contention-free reads
//! can pre-warm with [`StatusBits::warm`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Number of flag bits in a status mask
pub const STATUS_BIT_COUNT: u8 = 32;

/// Fixed position of the change flag (bit index 1).
///
/// The analog interpolator keys off this position regardless of any
/// configured name table.
const CHANGE_BIT: u8 = 1;

/// External display-name table for status bits.
///
/// Consumed as a keyed mapping `bit0..bit31 -> name`; absence of any key is
/// legal and falls back to the positional name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct BitNames {
    names: HashMap<String, String>,
}

impl BitNames {
    /// Create an empty name table (every lookup falls back to positional)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a name table from a JSON object such as
    /// `{"bit0": "Manual", "bit1": "Change"}`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid status name table: {}", e)))
    }

    /// Set the display name for one bit index
    pub fn set(&mut self, bit: u8, name: impl Into<String>) {
        self.names.insert(format!("bit{}", bit), name.into());
    }

    /// Display name for a bit index, if one is configured
    pub fn name_for_bit(&self, bit: u8) -> Option<&str> {
        self.names.get(&format!("bit{}", bit)).map(String::as_str)
    }
}

/// Positional fallback name for a bit index
pub fn positional_name(bit: u8) -> String {
    format!("bit{}", bit)
}

/// Interprets status masks as sets of active flag names
pub struct StatusBits {
    names: Option<BitNames>,
    cache: RwLock<HashMap<u32, Arc<BTreeSet<String>>>>,
}

impl Default for StatusBits {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBits {
    /// Create an interpreter using positional names only
    pub fn new() -> Self {
        Self {
            names: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create an interpreter with an external display-name table
    pub fn with_names(names: BitNames) -> Self {
        Self {
            names: Some(names),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Test the fixed-position change flag (bit index 1).
    ///
    /// Positional on purpose: configured names never alter this test.
    pub fn is_change_flag(status: u32) -> bool {
        status & (1 << CHANGE_BIT) != 0
    }

    /// Names of all flags active in `status`, memoized per distinct value
    pub fn active_names(&self, status: u32) -> Arc<BTreeSet<String>> {
        if let Some(cached) = self.cache.read().get(&status) {
            return Arc::clone(cached);
        }

        let mut names = BTreeSet::new();
        for bit in 0..STATUS_BIT_COUNT {
            if status & (1u32 << bit) == 0 {
                continue;
            }
            let name = self
                .names
                .as_ref()
                .and_then(|table| table.name_for_bit(bit))
                .map(str::to_owned)
                .unwrap_or_else(|| positional_name(bit));
            names.insert(name);
        }

        let entry = Arc::new(names);
        self.cache
            .write()
            .entry(status)
            .or_insert_with(|| Arc::clone(&entry))
            .clone()
    }

    /// Pre-populate the cache for the given status values
    pub fn warm(&self, statuses: impl IntoIterator<Item = u32>) {
        for status in statuses {
            self.active_names(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_names() {
        let bits = StatusBits::new();
        let names = bits.active_names(0b101);
        assert_eq!(
            names.iter().cloned().collect::<Vec<_>>(),
            vec!["bit0".to_string(), "bit2".to_string()]
        );
        assert!(bits.active_names(0).is_empty());
    }

    #[test]
    fn test_named_bits_override_display_only() {
        let mut table = BitNames::new();
        table.set(0, "Manual");
        table.set(1, "Change");
        let bits = StatusBits::with_names(table);

        let names = bits.active_names(0b11);
        assert!(names.contains("Manual"));
        assert!(names.contains("Change"));
        assert!(!names.contains("bit0"));

        // Unnamed bits still fall back to positional names
        let names = bits.active_names(0b1000);
        assert!(names.contains("bit3"));
    }

    #[test]
    fn test_change_flag_is_positional() {
        // No name table involved at all
        assert!(StatusBits::is_change_flag(0b10));
        assert!(!StatusBits::is_change_flag(0b01));
        assert!(StatusBits::is_change_flag(0xFFFF_FFFF));

        // A table renaming bit 1 does not move the change flag
        let mut table = BitNames::new();
        table.set(7, "Change");
        let _bits = StatusBits::with_names(table);
        assert!(!StatusBits::is_change_flag(1 << 7));
    }

    #[test]
    fn test_memoization_returns_shared_entry() {
        let bits = StatusBits::new();
        let first = bits.active_names(0b110);
        let second = bits.active_names(0b110);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_from_json() {
        let table = BitNames::from_json(r#"{"bit0": "Manual", "bit31": "Fault"}"#).unwrap();
        assert_eq!(table.name_for_bit(0), Some("Manual"));
        assert_eq!(table.name_for_bit(31), Some("Fault"));
        assert_eq!(table.name_for_bit(5), None);

        assert!(BitNames::from_json("not json").is_err());
    }

    #[test]
    fn test_warm() {
        let bits = StatusBits::new();
        bits.warm([1, 2, 3]);
        let warmed = bits.active_names(2);
        let again = bits.active_names(2);
        assert!(Arc::ptr_eq(&warmed, &again));
    }
}
