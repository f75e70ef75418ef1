// Workspace Repository Port (Interface)

use crate::domain::Workspace;
use crate::error::Result;
use async_trait::async_trait;

/// Enumerates tenant workspaces
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// List every workspace. Called once per polling cycle, never cached.
    async fn list_all(&self) -> Result<Vec<Workspace>>;
}
