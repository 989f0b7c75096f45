use std::collections::HashMap;

use async_trait::async_trait;

/// Display-name stand-in for an id the directory could not resolve.
pub const UNKNOWN_USER: &str = "(unknown)";

/// Maps opaque user ids to display names. Implementations must return an
/// entry for every requested id, substituting [`UNKNOWN_USER`] on failure;
/// callers never see a partial map and never see an error.
#[async_trait]
pub trait UsernameResolver: Send + Sync {
    async fn resolve(&self, ids: &[String]) -> HashMap<String, String>;
}

/// Resolver for contexts with no chat directory attached (operator CLI,
/// offline exports): every id displays as itself.
pub struct EchoResolver;

#[async_trait]
impl UsernameResolver for EchoResolver {
    async fn resolve(&self, ids: &[String]) -> HashMap<String, String> {
        ids.iter().map(|id| (id.clone(), id.clone())).collect()
    }
}
