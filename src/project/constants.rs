//! Bidirectional symbolic-constant mapping.
//!
//! Maps constant names (as they appear in source arguments, e.g. `MUS_OVERWORLD` or
//! `INTERAC_CHEST`) to numeric values and back. The reverse direction supplies the
//! *preferred* display name for a value: the first name registered for a value wins, so
//! canonical names stay stable when aliases are added later.

use dashmap::DashMap;

/// A shared name/value table for symbolic constants.
///
/// Internally concurrent so one table can be shared by `Arc` between the
/// project, its evaluator and any number of codecs; all ordinary use is still
/// single-threaded.
#[derive(Debug, Default)]
pub struct ConstantsMapping {
    by_name: DashMap<String, i64>,
    by_value: DashMap<i64, String>,
}

impl ConstantsMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constant.
    ///
    /// Re-registering a name overwrites its value; the reverse mapping keeps
    /// the first name registered for any given value as the preferred name.
    pub fn define(&self, name: &str, value: i64) {
        self.by_name.insert(name.to_string(), value);
        self.by_value.entry(value).or_insert_with(|| name.to_string());
    }

    /// Looks up the numeric value of a constant name.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).map(|entry| *entry)
    }

    /// Looks up the preferred symbolic name for a value.
    pub fn name_of(&self, value: i64) -> Option<String> {
        self.by_value.get(&value).map(|entry| entry.clone())
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True if no constant has been registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
