//! Git operations abstraction (SystemGit)

mod system_git;

pub use system_git::SystemGit;
