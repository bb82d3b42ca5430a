//! Identity and document paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The signed-in user, as supplied by the authentication collaborator.
///
/// Absence of an identity (`Option::None`) means local-only mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user ID issued by the identity provider.
    pub uid: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    /// Returns the path of this user's remote document.
    pub fn document_path(&self) -> DocumentPath {
        DocumentPath::for_user(&self.uid)
    }
}

/// Path of a document in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Collection holding one document per user.
    pub const USERS: &'static str = "users";

    /// Returns `users/{uid}`.
    pub fn for_user(uid: &str) -> Self {
        Self(format!("{}/{uid}", Self::USERS))
    }

    /// Wraps an arbitrary path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_document_path() {
        let identity = Identity::new("abc123");
        assert_eq!(identity.document_path().as_str(), "users/abc123");
        assert_eq!(identity.document_path().to_string(), "users/abc123");
    }

    #[test]
    fn identity_serde() {
        let identity: Identity = serde_json::from_str(r#"{"uid":"u-9"}"#).unwrap();
        assert_eq!(identity, Identity::new("u-9"));
    }
}
