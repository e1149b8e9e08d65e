use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id as string
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
    kind: TokenKind,
}

fn encode_claims(claims: &Claims, cfg: &JwtConfig) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::InternalError(e.to_string()))
}

fn encode_token(
    uid: UserId,
    jti: &TokenId,
    kind: TokenKind,
    ttl: Duration,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| AuthError::InternalError(e.to_string()))?;
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + ttl;
    let claims = Claims {
        sub: uid.to_string(),
        exp: exp_dt.timestamp(),
        iat: iat_dt.timestamp(),
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
        jti: jti.to_string(),
        kind,
    };
    let token = encode_claims(&claims, cfg)?;
    Ok((token, exp_dt))
}

fn decode_token(token: &str, expected: TokenKind, cfg: &JwtConfig) -> Result<Claims, AuthError> {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = true;
    v.set_audience(&[cfg.audience.clone()]);
    v.set_issuer(&[cfg.issuer.clone()]);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&cfg.signing_key), &v)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        })?;
    if data.claims.kind != expected {
        return Err(AuthError::TokenInvalid);
    }
    Ok(data.claims)
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    #[inline]
    fn parse_user_id(sub: &str) -> Result<UserId, AuthError> {
        sub.parse::<UserId>().map_err(|_| AuthError::TokenInvalid)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenVerifyResult, AuthError> {
        let claims = decode_token(token, kind, &self.cfg)?;
        let user_id = Self::parse_user_id(&claims.sub)?;
        Ok(TokenVerifyResult {
            user_id,
            jti: TokenId::from(claims.jti),
        })
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_access_token(
        &self,
        user: UserId,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let jti = TokenId::generate();
        let (token, exp_dt) =
            encode_token(user, &jti, TokenKind::Access, self.cfg.access_ttl, &self.cfg)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn issue_refresh_token(
        &self,
        user: UserId,
        jti: &TokenId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) =
            encode_token(user, jti, TokenKind::Refresh, self.cfg.refresh_ttl, &self.cfg)?;
        Ok((RefreshToken(token), exp_dt))
    }

    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<TokenVerifyResult, AuthError> {
        self.verify(&token.0, TokenKind::Access)
    }

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenVerifyResult, AuthError> {
        self.verify(&token.0, TokenKind::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: &str) -> JwtConfig {
        JwtConfig {
            issuer: "easeread.auth".to_string(),
            audience: "easeread-client".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            signing_key: key.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn refresh_token_carries_the_given_jti() {
        let codec = JwtHs256Codec::new(config("k1"));
        let user = UserId::new_random();
        let jti = TokenId::generate();

        let (token, exp) = codec.issue_refresh_token(user, &jti).await.unwrap();
        assert!(exp > Utc::now() + chrono::Duration::days(6));

        let verified = codec.verify_refresh_token(&token).await.unwrap();
        assert_eq!(verified.user_id, user);
        assert_eq!(verified.jti, jti);
    }

    #[tokio::test]
    async fn kinds_are_not_interchangeable() {
        let codec = JwtHs256Codec::new(config("k1"));
        let user = UserId::new_random();
        let (access, _) = codec.issue_access_token(user).await.unwrap();
        let (refresh, _) = codec
            .issue_refresh_token(user, &TokenId::generate())
            .await
            .unwrap();

        assert_eq!(codec.verify_access_token(&access).await.unwrap().user_id, user);
        assert!(matches!(
            codec.verify_refresh_token(&RefreshToken(access.0.clone())).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            codec.verify_access_token(&AccessToken(refresh.0.clone())).await,
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let ours = JwtHs256Codec::new(config("k1"));
        let theirs = JwtHs256Codec::new(config("k2"));
        let (token, _) = theirs
            .issue_refresh_token(UserId::new_random(), &TokenId::generate())
            .await
            .unwrap();
        assert!(matches!(
            ours.verify_refresh_token(&token).await,
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let cfg = config("k1");
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: UserId::new_random().to_string(),
            exp: now - 3600,
            iat: now - 7200,
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            jti: TokenId::generate().to_string(),
            kind: TokenKind::Refresh,
        };
        let token = encode_claims(&claims, &cfg).unwrap();
        let codec = JwtHs256Codec::new(cfg);
        assert!(matches!(
            codec.verify_refresh_token(&RefreshToken(token)).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn debug_hides_signing_key() {
        let rendered = format!("{:?}", config("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
