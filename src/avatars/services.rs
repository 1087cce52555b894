use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use uuid::Uuid;

use crate::config::S3Config;

pub const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Persists an avatar image and returns the URL clients should store.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn store(&self, user_id: Uuid, body: Bytes, content_type: &str) -> anyhow::Result<String>;
}

/// No external storage: the image travels back as a data URL.
pub struct InlineAvatarStore;

#[async_trait]
impl AvatarStore for InlineAvatarStore {
    async fn store(&self, _user_id: Uuid, body: Bytes, content_type: &str) -> anyhow::Result<String> {
        Ok(format!("data:{};base64,{}", content_type, Base64::encode_string(&body)))
    }
}

#[derive(Clone)]
pub struct S3AvatarStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3AvatarStore {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }
}

#[async_trait]
impl AvatarStore for S3AvatarStore {
    async fn store(&self, user_id: Uuid, body: Bytes, content_type: &str) -> anyhow::Result<String> {
        let key = avatar_key(user_id, content_type);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        Ok(self.object_url(&key))
    }
}

fn avatar_key(user_id: Uuid, content_type: &str) -> String {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    format!("avatars/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/gif"), None);
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn avatar_keys_are_scoped_per_user() {
        let user_id = Uuid::new_v4();
        let key = avatar_key(user_id, "image/png");
        assert!(key.starts_with(&format!("avatars/{}/", user_id)));
        assert!(key.ends_with(".png"));
        assert_ne!(key, avatar_key(user_id, "image/png"));
    }

    #[tokio::test]
    async fn inline_store_returns_data_url() {
        let url = InlineAvatarStore
            .store(Uuid::new_v4(), Bytes::from_static(b"hi!"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,aGkh");
    }
}
