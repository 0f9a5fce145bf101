use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self {
            user,
            issued_at: Utc::now(),
        }
    }
}
