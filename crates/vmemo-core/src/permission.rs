//! Microphone permission gate.
//!
//! The platform decides whether the microphone may be used; the core only
//! sees the answer.

/// Outcome of a microphone permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

impl Permission {
    pub fn is_granted(self) -> bool {
        self == Permission::Granted
    }
}

/// Source of truth for microphone access.
///
/// Queried once at startup and again before every recording start.
pub trait PermissionGate {
    fn microphone(&self) -> Permission;
}

/// A gate with a fixed answer. Desktop hosts where the OS prompts on first
/// capture use `StaticPermission::granted()`.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub Permission);

impl StaticPermission {
    pub fn granted() -> Self {
        Self(Permission::Granted)
    }

    pub fn denied() -> Self {
        Self(Permission::Denied)
    }
}

impl PermissionGate for StaticPermission {
    fn microphone(&self) -> Permission {
        self.0
    }
}
