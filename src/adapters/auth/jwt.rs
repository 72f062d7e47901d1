//! HS256 JWT session validation.
//!
//! The auth collaborator issues HS256 tokens over a shared secret; the
//! engine only consumes them. Claims carry the user's pubkey as `sub` and
//! an `admin` role flag.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{AuthError, AuthenticatedUser, Pubkey};
use crate::ports::SessionValidator;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    admin: bool,
    #[allow(dead_code)]
    exp: i64,
}

pub struct JwtSessionValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Tokens are issued without an audience claim.
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        let pubkey = Pubkey::new(data.claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(if data.claims.admin {
            AuthenticatedUser::admin(pubkey)
        } else {
            AuthenticatedUser::new(pubkey)
        })
    }
}
