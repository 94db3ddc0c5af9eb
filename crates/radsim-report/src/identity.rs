//! Learner identity sources.

/// Supplies the identifier of the current learner at export time.
///
/// No identity is a normal condition: the report is exported anonymously.
pub trait IdentitySource: Send + Sync {
    /// Returns the current user identifier, if any.
    fn current_user(&self) -> Option<String>;
}

/// Identity source for sessions without a signed-in learner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentitySource for Anonymous {
    fn current_user(&self) -> Option<String> {
        None
    }
}

/// Identity source returning a fixed identifier.
#[derive(Debug, Clone)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    /// Creates a source that always reports `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }
}

impl IdentitySource for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
