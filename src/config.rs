use anyhow::{ensure, Context};

const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";
const MAX_JWT_TTL_MINUTES: i64 = 60 * 24 * 365;
const MAX_RESET_TTL_MINUTES: i64 = 60 * 24;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub api_url: String,
    pub from: String,
    /// Receives a notice for every new registration when set.
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub frontend_url: String,
    pub reset_token_ttl_minutes: i64,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| var(key).with_context(|| format!("{key} must be set"));
        let minutes = |key: &str, default: i64, max: i64| -> anyhow::Result<i64> {
            let Some(raw) = var(key) else {
                return Ok(default);
            };
            let value: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number of minutes"))?;
            ensure!((1..=max).contains(&value), "{key} must be between 1 and {max}");
            Ok(value)
        };

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "authsvc".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "authsvc-users".into()),
            ttl_minutes: minutes("JWT_TTL_MINUTES", 60 * 24 * 30, MAX_JWT_TTL_MINUTES)?,
        };
        let mail = MailConfig {
            api_key: required("RESEND_API_KEY")?,
            api_url: var("RESEND_API_URL")
                .unwrap_or_else(|| DEFAULT_RESEND_API_URL.into())
                .trim_end_matches('/')
                .to_string(),
            from: required("MAIL_FROM")?,
            admin_email: var("ADMIN_EMAIL").filter(|v| !v.trim().is_empty()),
        };
        let frontend_url = required("FRONTEND_URL")?
            .trim_end_matches('/')
            .to_string();
        let cors_origins = var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            jwt,
            mail,
            frontend_url,
            reset_token_ttl_minutes: minutes(
                "RESET_TOKEN_TTL_MINUTES",
                10,
                MAX_RESET_TTL_MINUTES,
            )?,
            cors_origins,
        })
    }
}
