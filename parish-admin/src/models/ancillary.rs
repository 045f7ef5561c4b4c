use chrono::NaiveDate;
use serde::Deserialize;
use service_core::authz::Role;
use uuid::Uuid;

/// Account as reported by the homily API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AncillaryUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AncillaryLogin {
    pub token: String,
    pub user: AncillaryUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HomilySummary {
    pub id: Uuid,
    pub title: String,
    pub preached_on: NaiveDate,
    #[serde(default)]
    pub priest: Option<String>,
    pub published: bool,
}

impl HomilySummary {
    pub fn priest_label(&self) -> &str {
        self.priest.as_deref().unwrap_or("-")
    }

    pub fn status_label(&self) -> &'static str {
        if self.published {
            "published"
        } else {
            "draft"
        }
    }
}
