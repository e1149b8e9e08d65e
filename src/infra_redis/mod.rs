mod refresh_token_guard_redis;

pub use refresh_token_guard_redis::*;
