//! Admission control trait used by the HTTP middleware.

use super::key::KeyScope;

/// Trait for admission decision makers.
///
/// The middleware is generic over this trait so it does not depend on how
/// decisions are reached.
pub trait AdmissionControl: Send + Sync {
    /// How admission keys should be derived for incoming requests.
    fn scope(&self) -> KeyScope;

    /// Decide whether a request for `key` is admitted, recording it if so.
    fn try_admit(&self, key: &str) -> bool;
}
