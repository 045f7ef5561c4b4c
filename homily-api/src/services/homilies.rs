use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{HomilyStore, ServiceError};
use crate::dtos::homilies::HomilyRequest;
use crate::models::Homily;

#[derive(Clone)]
pub struct HomilyService {
    homilies: Arc<dyn HomilyStore>,
}

impl HomilyService {
    pub fn new(homilies: Arc<dyn HomilyStore>) -> Self {
        Self { homilies }
    }

    pub async fn list_published(&self) -> Result<Vec<Homily>, ServiceError> {
        self.homilies.list(false).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Homily, ServiceError> {
        self.homilies
            .get(id)
            .await?
            .ok_or(ServiceError::HomilyNotFound)
    }

    pub async fn create(&self, req: HomilyRequest) -> Result<Homily, ServiceError> {
        let now = Utc::now();
        let homily = Homily {
            id: Uuid::new_v4(),
            title: req.title,
            preached_on: req.preached_on,
            priest: req.priest,
            audio_url: req.audio_url,
            duration_seconds: req.duration_seconds,
            description: req.description,
            published: req.published,
            created_at: now,
            updated_at: now,
        };
        self.homilies.insert(&homily).await?;

        tracing::info!(homily_id = %homily.id, "Homily created");
        Ok(homily)
    }

    pub async fn update(&self, id: Uuid, req: HomilyRequest) -> Result<Homily, ServiceError> {
        let existing = self.get(id).await?;
        let homily = Homily {
            title: req.title,
            preached_on: req.preached_on,
            priest: req.priest,
            audio_url: req.audio_url,
            duration_seconds: req.duration_seconds,
            description: req.description,
            published: req.published,
            updated_at: Utc::now(),
            ..existing
        };
        self.homilies.update(&homily).await?;

        tracing::info!(homily_id = %id, "Homily updated");
        Ok(homily)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.homilies.delete(id).await?;
        tracing::info!(homily_id = %id, "Homily deleted");
        Ok(())
    }
}
