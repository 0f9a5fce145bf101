use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub driver_name: String,
    pub rating: f64,
    pub vehicle: String,
    pub license_plate: String,
    pub phone: String,
    pub eta_minutes: i64,
}
