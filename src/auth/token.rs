use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and checks HS256 session tokens with a single server-held secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime_secs: i64,
}

impl TokenService {
    pub fn new(secret: &[u8], lifetime_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime_secs,
        }
    }

    /// Use the configured secret, or a fresh random one if none is set.
    /// A random secret invalidates every outstanding session on restart.
    pub fn from_config(secret: Option<&str>, lifetime_secs: i64) -> Self {
        match secret {
            Some(secret) if !secret.is_empty() => Self::new(secret.as_bytes(), lifetime_secs),
            _ => {
                tracing::warn!("No token secret configured; generating a random one for this run");
                Self::new(&generate_secret(), lifetime_secs)
            }
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            user_id,
            iat: now,
            exp: now + self.lifetime_secs,
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Returns the claims of a well-formed, correctly signed, unexpired token.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }
}

fn generate_secret() -> [u8; 32] {
    rand::thread_rng().gen()
}
