use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::Clock;
use crate::logger::*;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub leeway_secs: u64,
    pub signing_key: Vec<u8>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway_secs", &self.leeway_secs)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl JwtConfig {
    /// A codec must never come up with an empty secret or a non-positive
    /// lifetime; either one is a startup failure.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.signing_key.iter().all(u8::is_ascii_whitespace) {
            return Err(AuthError::Configuration(
                "JWT signing secret is missing".to_string(),
            ));
        }
        if self.access_ttl <= Duration::zero() || self.refresh_ttl <= Duration::zero() {
            return Err(AuthError::Configuration(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.refresh_ttl < self.access_ttl {
            return Err(AuthError::Configuration(
                "refresh token lifetime is shorter than access token lifetime".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    typ: TokenKind,
    jti: String,
    iat: i64,
    /// `iat` in microseconds, so a user epoch can split tokens issued within
    /// the same second.
    #[serde(default)]
    iat_us: Option<i64>,
    exp: i64,
    iss: String,
    aud: String,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Codec {
    pub fn try_new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        cfg.validate()?;
        let encoding_key = EncodingKey::from_secret(&cfg.signing_key);
        let decoding_key = DecodingKey::from_secret(&cfg.signing_key);
        Ok(JwtHs256Codec {
            cfg,
            encoding_key,
            decoding_key,
            clock,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.cfg
    }

    fn encode(
        &self,
        uid: UserId,
        role: Role,
        kind: TokenKind,
        jti: TokenId,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let iat_dt = self.clock.now();
        let ttl = match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        };
        let exp_dt = iat_dt + ttl;
        let claims = Claims {
            sub: uid.to_string(),
            role,
            typ: kind,
            jti: jti.0,
            iat: iat_dt.timestamp(),
            iat_us: Some(iat_dt.timestamp_micros()),
            exp: exp_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok((token, exp_dt))
    }

    fn validation(&self, check_exp: bool) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = check_exp;
        v.leeway = self.cfg.leeway_secs;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        v
    }

    fn decode(&self, token: &str, check_exp: bool) -> Result<TokenVerifyResult, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation(check_exp))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                other => {
                    debug!(reason = ?other, "rejected token");
                    AuthError::InvalidToken
                }
            })?;
        Self::into_result(data.claims)
    }

    fn into_result(claims: Claims) -> Result<TokenVerifyResult, AuthError> {
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidToken)?;
        let issued_at = match claims.iat_us {
            Some(micros) => DateTime::<Utc>::from_timestamp_micros(micros),
            None => DateTime::<Utc>::from_timestamp(claims.iat, 0),
        }
        .ok_or(AuthError::InvalidToken)?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidToken)?;
        if claims.jti.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(TokenVerifyResult {
            user_id,
            role: claims.role,
            kind: claims.typ,
            jti: TokenId(claims.jti),
            issued_at,
            expires_at,
        })
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access_token(
        &self,
        user: UserId,
        role: Role,
        jti: TokenId,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = self.encode(user, role, TokenKind::Access, jti)?;
        Ok((AccessToken(token), exp_dt))
    }

    fn issue_refresh_token(
        &self,
        user: UserId,
        role: Role,
        jti: TokenId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = self.encode(user, role, TokenKind::Refresh, jti)?;
        Ok((RefreshToken(token), exp_dt))
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenVerifyResult, AuthError> {
        let result = self.decode(token, true)?;
        if result.kind != expected {
            debug!(expected = %expected, found = %result.kind, "token kind mismatch");
            return Err(AuthError::InvalidToken);
        }
        Ok(result)
    }

    fn inspect(&self, token: &str) -> Result<TokenVerifyResult, AuthError> {
        self.decode(token, false)
    }

    fn leeway(&self) -> Duration {
        Duration::seconds(self.cfg.leeway_secs as i64)
    }
}
