use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AvatarUploadResponse {
    pub url: String,
    pub success: bool,
    pub size: usize,
    #[serde(rename = "type")]
    pub content_type: String,
}
