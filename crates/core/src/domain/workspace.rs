// Workspace Domain Model (tenant boundary)

use serde::{Deserialize, Serialize};

/// Workspace identifier
pub type WorkspaceId = String;

/// Tenant boundary. Every subscription and delivery is partitioned by workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub created_at: i64, // epoch ms
}

impl Workspace {
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at,
        }
    }
}
