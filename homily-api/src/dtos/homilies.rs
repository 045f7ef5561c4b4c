use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct HomilyRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[schema(value_type = String, example = "2024-03-24")]
    pub preached_on: NaiveDate,

    pub priest: Option<String>,

    #[validate(url(message = "Audio URL must be a valid URL"))]
    pub audio_url: String,

    #[validate(range(min = 0, message = "Duration cannot be negative"))]
    pub duration_seconds: Option<i32>,

    pub description: Option<String>,

    #[serde(default)]
    pub published: bool,
}
