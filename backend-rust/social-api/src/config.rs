use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "default_jwt_secret_change_me";
const DEFAULT_BCRYPT_COST: u32 = 10;

/// Server settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    pub policy: InteractionPolicy,
}

/// Whether users may follow themselves or engage with their own content.
/// Both default to allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionPolicy {
    pub allow_self_follow: bool,
    pub allow_self_engagement: bool,
}

impl Default for InteractionPolicy {
    fn default() -> Self {
        Self {
            allow_self_follow: true,
            allow_self_engagement: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8069,
            database_path: "social.db".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl_hours: 24,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            cors_origin: None,
            policy: InteractionPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Config::default();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, using default (not secure for production!)");
            defaults.jwt_secret.clone()
        });

        Ok(Self {
            port: parse_var("PORT", defaults.port)?,
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            jwt_secret,
            jwt_ttl_hours: parse_var("JWT_TTL_HOURS", defaults.jwt_ttl_hours)?,
            bcrypt_cost: parse_var("BCRYPT_COST", defaults.bcrypt_cost)?,
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty() && o != "*"),
            policy: InteractionPolicy {
                allow_self_follow: parse_var("ALLOW_SELF_FOLLOW", defaults.policy.allow_self_follow)?,
                allow_self_engagement: parse_var(
                    "ALLOW_SELF_ENGAGEMENT",
                    defaults.policy.allow_self_engagement,
                )?,
            },
        })
    }

    /// Settings for tests: in-memory database and the cheapest bcrypt cost.
    pub fn for_tests() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            jwt_secret: "test_secret".to_string(),
            bcrypt_cost: 4,
            ..Self::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", name, raw)),
        _ => Ok(default),
    }
}
