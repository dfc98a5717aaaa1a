// Authentication configuration loaded from environment variables.
// Decision: AUTH_ prefix for all auth config
// Decision: Bearer tokens only; a SUPERADMIN account is bootstrapped from env

use std::time::Duration;

use crate::config::env_parse;

/// Bootstrap superadmin credentials
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWTs (HS256)
    pub secret: String,
    /// Access token lifetime
    pub access_token_lifetime: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_lifetime: Duration::from_secs(60 * 60), // 1 hour
        }
    }
}

/// Complete authentication configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Superadmin created at startup if absent
    pub superadmin: Option<AdminConfig>,
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let secret = std::env::var("AUTH_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!(
                    "AUTH_JWT_SECRET not set, using a random secret; tokens will not survive a restart"
                );
                random_secret()
            });

        let access_token_lifetime = Duration::from_secs(env_parse(
            "AUTH_JWT_ACCESS_TOKEN_LIFETIME",
            60 * 60u64,
        ));

        let superadmin = match (
            std::env::var("AUTH_SUPERADMIN_EMAIL"),
            std::env::var("AUTH_SUPERADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminConfig { email, password })
            }
            _ => None,
        };

        Self {
            jwt: JwtConfig {
                secret,
                access_token_lifetime,
            },
            superadmin,
        }
    }
}

/// Generate a random 256-bit secret (64 hex characters)
pub fn random_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
