use argon2::password_hash::rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

const TOKEN_ID_BYTES: usize = 32;

/// Random identifier embedded in a refresh token as its `jti` claim.
///
/// The value stored for a user in the refresh guard is the single source of
/// truth for whether a given refresh token may still be redeemed.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// 256 bits from the OS CSPRNG, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        TokenId(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        TokenId(value)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        TokenId(value.to_owned())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Token ids are bearer secrets; keep them out of logs.
impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "TokenId({}…)", prefix)
    }
}
