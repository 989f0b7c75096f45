use serde::{Deserialize, Serialize};

/// A command caller as delivered by the chat gateway: the opaque user id
/// plus the role ids the platform reports for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    pub roles: Vec<String>,
}

impl ActorRef {
    pub fn new(id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }
}
