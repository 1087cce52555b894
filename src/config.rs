use std::str::FromStr;

use anyhow::Context;
use jsonwebtoken::Algorithm;

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

/// Argon2 cost parameters used for password hashing.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // argon2 crate defaults (~19 MiB, t=2, p=1)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub cors_origins: Vec<String>,
    pub host: String,
    pub port: u16,
    /// `None` means avatars are returned inline as data URLs.
    pub avatar_s3: Option<S3Config>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match env_opt("STORE").as_deref() {
            None | Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!("unknown STORE '{}', expected postgres or memory", other),
        };
        let database_url = env_opt("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORE=postgres");
        }

        let secret = env_opt("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using the built-in development secret");
            DEFAULT_JWT_SECRET.into()
        });
        let jwt = JwtConfig {
            secret,
            algorithm: parse_algorithm(&env_or("JWT_ALGORITHM", "HS256"))?,
            access_ttl_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
            refresh_ttl_days: env_parse("REFRESH_TOKEN_EXPIRE_DAYS", 7)?,
        };

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_parse("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_parse("ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: env_parse("ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let cors_origins = parse_origins(&env_or(
            "CORS_ORIGINS",
            "http://localhost:5173,http://localhost:3000",
        ));

        Ok(Self {
            store,
            database_url,
            jwt,
            password,
            cors_origins,
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_parse("APP_PORT", 8000)?,
            avatar_s3: s3_from_env(),
        })
    }
}

fn s3_from_env() -> Option<S3Config> {
    let endpoint = env_opt("AVATAR_S3_ENDPOINT")?;
    let bucket = env_opt("AVATAR_S3_BUCKET")?;
    let access_key = env_opt("AVATAR_S3_ACCESS_KEY")?;
    let secret_key = env_opt("AVATAR_S3_SECRET_KEY")?;
    let public_base_url = env_opt("AVATAR_PUBLIC_BASE_URL").unwrap_or_else(|| endpoint.clone());
    Some(S3Config {
        endpoint,
        bucket,
        access_key,
        secret_key,
        region: env_or("AVATAR_S3_REGION", "us-east-1"),
        public_base_url,
    })
}

/// Only HMAC algorithms make sense with a shared secret.
pub(crate) fn parse_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    let alg = Algorithm::from_str(raw.trim())
        .with_context(|| format!("unknown JWT_ALGORITHM '{}'", raw))?;
    match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(alg),
        other => anyhow::bail!("JWT_ALGORITHM {:?} needs a key pair; only HS256/HS384/HS512 are supported", other),
    }
}

pub(crate) fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_opt(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: '{}'", key, v)),
        None => Ok(default),
    }
}
