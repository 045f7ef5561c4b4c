use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A recorded homily published to the podcast feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Homily {
    pub id: Uuid,
    #[schema(example = "Niedziela Palmowa")]
    pub title: String,
    pub preached_on: NaiveDate,
    pub priest: Option<String>,
    #[schema(example = "https://cdn.parafia.example/homilies/2024-03-24.mp3")]
    pub audio_url: String,
    pub duration_seconds: Option<i32>,
    pub description: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
