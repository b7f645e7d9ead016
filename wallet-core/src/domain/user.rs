//! User domain model
//!
//! Identity is established upstream (token lookup); the engine only reads
//! user ids to verify wallet ownership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub deletion_date: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            username: username.into(),
            creation_date: now,
            update_date: now,
            deletion_date: None,
        }
    }

    /// Validate user data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username cannot be empty");
        }
        Ok(())
    }
}
