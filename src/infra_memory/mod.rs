mod refresh_token_guard_memory;
mod user_repo_memory;

pub use refresh_token_guard_memory::*;
pub use user_repo_memory::*;
