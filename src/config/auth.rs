//! Authentication configuration
//!
//! Authentication itself is an external collaborator; the engine only
//! validates bearer tokens issued by it.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret for bearer token validation
    #[serde(default = "empty_secret")]
    pub jwt_secret: SecretString,
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: empty_secret(),
        }
    }
}

impl AuthConfig {
    /// Validate auth configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if secret.len() < 32 {
            return Err(ValidationError::JwtSecretTooShort);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_is_rejected() {
        let config = AuthConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_secret_is_rejected() {
        let config = AuthConfig {
            jwt_secret: SecretString::new("short".to_string()),
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::JwtSecretTooShort)
        ));
    }

    #[test]
    fn long_secret_is_accepted() {
        let config = AuthConfig {
            jwt_secret: SecretString::new("0123456789abcdef0123456789abcdef".to_string()),
        };
        assert!(config.validate().is_ok());
    }
}
