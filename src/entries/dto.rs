use serde::Deserialize;

use crate::error::ApiError;

pub const MAX_FEELINGS: usize = 10;
pub const FEELING_MAX_CHARS: usize = 50;
pub const REFLECTION_MAX_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub mood: i16,
    #[serde(default)]
    pub feelings: Vec<String>,
    pub reflection: Option<String>,
    pub sleep_hours: f64,
}

impl CreateEntryRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !(-2..=2).contains(&self.mood) {
            return Err(invalid("mood must be between -2 and 2"));
        }
        if self.feelings.len() > MAX_FEELINGS {
            return Err(invalid(&format!("at most {} feelings allowed", MAX_FEELINGS)));
        }
        if self
            .feelings
            .iter()
            .any(|f| f.trim().is_empty() || f.chars().count() > FEELING_MAX_CHARS)
        {
            return Err(invalid(&format!(
                "feelings must be non-empty and at most {} characters",
                FEELING_MAX_CHARS
            )));
        }
        if let Some(r) = &self.reflection {
            if r.chars().count() > REFLECTION_MAX_CHARS {
                return Err(invalid(&format!(
                    "reflection must be at most {} characters",
                    REFLECTION_MAX_CHARS
                )));
            }
        }
        if !self.sleep_hours.is_finite() || !(0.0..=24.0).contains(&self.sleep_hours) {
            return Err(invalid("sleep_hours must be between 0 and 24"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ApiError {
    ApiError::Validation(msg.to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 {
    11
}

impl ListQuery {
    pub fn clamped_limit(&self) -> i64 {
        self.limit.clamp(1, 100)
    }
}
