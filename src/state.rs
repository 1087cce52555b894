use std::sync::Arc;

use crate::avatars::services::{AvatarStore, InlineAvatarStore, S3AvatarStore};
use crate::auth::{jwt::JwtKeys, password::PasswordHasher};
use crate::config::{AppConfig, StoreKind};
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: JwtKeys,
    pub passwords: PasswordHasher,
    pub avatars: Arc<dyn AvatarStore>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.store {
            StoreKind::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pg = PgStore::connect(url).await?;
                pg.migrate().await?;
                Arc::new(pg)
            }
            StoreKind::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let avatars: Arc<dyn AvatarStore> = match &config.avatar_s3 {
            Some(s3) => {
                tracing::info!(bucket = %s3.bucket, "avatars stored in S3");
                Arc::new(S3AvatarStore::new(s3).await?)
            }
            None => Arc::new(InlineAvatarStore),
        };

        let tokens = JwtKeys::new(&config.jwt);
        let passwords = PasswordHasher::new(&config.password)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            tokens,
            passwords,
            avatars,
        })
    }

    /// State backed by a fresh in-memory store and cheap hashing.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, PasswordConfig};

        let config = AppConfig {
            store: StoreKind::Memory,
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                algorithm: jsonwebtoken::Algorithm::HS256,
                access_ttl_minutes: 30,
                refresh_ttl_days: 7,
            },
            password: PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            cors_origins: vec!["http://localhost:5173".into()],
            host: "127.0.0.1".into(),
            port: 0,
            avatar_s3: None,
        };

        Self {
            tokens: JwtKeys::new(&config.jwt),
            passwords: PasswordHasher::new(&config.password).expect("cheap argon2 params are valid"),
            store: Arc::new(MemoryStore::new()),
            avatars: Arc::new(InlineAvatarStore),
            config: Arc::new(config),
        }
    }
}
