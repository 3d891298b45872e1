use std::sync::Arc;

use pilot_process::CommandRunner;

use crate::{
    config::{VaultConfig, WorktreeConfig},
    vault::VaultService,
    worktree::WorktreeService,
};

/// Shared by every handler. Both services run their commands through the
/// same runner.
pub struct AppState<R> {
    pub vault: Arc<VaultService<R>>,
    pub worktree: Arc<WorktreeService<R>>,
}

impl<R: CommandRunner> AppState<R> {
    pub fn new(runner: Arc<R>, vault: VaultConfig, worktree: WorktreeConfig) -> Self {
        Self {
            vault: Arc::new(VaultService::new(Arc::clone(&runner), vault)),
            worktree: Arc::new(WorktreeService::new(runner, worktree)),
        }
    }
}

// Derived Clone would require `R: Clone`.
impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            vault: Arc::clone(&self.vault),
            worktree: Arc::clone(&self.worktree),
        }
    }
}
