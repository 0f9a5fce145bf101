use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl User {
    pub fn new(name: &str, email: Option<String>, phone: Option<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email,
            phone,
            role,
            created_at: Utc::now(),
        }
    }

    pub fn is_passenger(&self) -> bool {
        self.role == Role::Passenger
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
