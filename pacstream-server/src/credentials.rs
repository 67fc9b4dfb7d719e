//! Preloaded credential table.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use pacstream_core::CredentialValidator;

/// Validates against a fixed name → secret table. Only blake3 digests
/// of the secrets are kept in memory.
pub struct StaticCredentials {
    digests: HashMap<String, blake3::Hash>,
}

impl StaticCredentials {
    pub fn new(users: &BTreeMap<String, String>) -> Self {
        let digests = users
            .iter()
            .map(|(name, secret)| (name.clone(), blake3::hash(secret.as_bytes())))
            .collect();
        Self { digests }
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

#[async_trait]
impl CredentialValidator for StaticCredentials {
    async fn validate(&self, name: &str, secret: &str) -> bool {
        // `Hash` equality is constant-time.
        self.digests
            .get(name)
            .is_some_and(|digest| *digest == blake3::hash(secret.as_bytes()))
    }
}
