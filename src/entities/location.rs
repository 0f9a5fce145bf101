use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, address: &str) -> Self {
        Self {
            latitude,
            longitude,
            address: address.into(),
        }
    }

    pub fn has_address(&self) -> bool {
        !self.address.trim().is_empty()
    }
}
