//! Credential validation collaborator.

use async_trait::async_trait;

/// Decides whether a name/secret pair may play. Implementations own any
/// connection handle they need; the session receives one through its
/// context rather than reaching for a global.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, name: &str, secret: &str) -> bool;
}
