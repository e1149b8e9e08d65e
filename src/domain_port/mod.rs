// store

mod refresh_token_guard;

pub use refresh_token_guard::*;

// repo

mod user_repo;

pub use user_repo::*;
