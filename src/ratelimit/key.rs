//! Admission key scoping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key shared by every request when limiting globally.
pub const GLOBAL_KEY: &str = "global";

/// How admission keys are derived for incoming requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// All requests draw from one process-wide quota.
    #[default]
    Global,
    /// Each caller (by network address) gets its own quota.
    Caller,
}

impl KeyScope {
    /// Whether keys are derived per caller.
    pub fn is_keyed_by_caller(&self) -> bool {
        matches!(self, KeyScope::Caller)
    }

    /// Resolve the admission key for a request.
    ///
    /// The caller address is only computed in [`KeyScope::Caller`] mode.
    pub fn resolve<F>(&self, caller: F) -> String
    where
        F: FnOnce() -> String,
    {
        match self {
            KeyScope::Global => GLOBAL_KEY.to_string(),
            KeyScope::Caller => caller(),
        }
    }
}

impl From<bool> for KeyScope {
    fn from(keyed_by_caller: bool) -> Self {
        if keyed_by_caller {
            KeyScope::Caller
        } else {
            KeyScope::Global
        }
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScope::Global => write!(f, "global"),
            KeyScope::Caller => write!(f, "caller"),
        }
    }
}
