//! Infrastructure adapters for external systems.

pub mod file_state_store;
pub mod fs_rule_library;
pub mod git_worktree_manager;
pub mod memory_state_store;
pub mod sqlite;

pub use file_state_store::FileStateStore;
pub use fs_rule_library::FsRuleLibrary;
pub use git_worktree_manager::GitWorktreeManager;
pub use memory_state_store::InMemoryStateStore;
