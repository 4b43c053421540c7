//! Test Data Builders
//!
//! Builder for constructing fixture devices with sensible defaults, so a
//! test names only the fields it cares about.

use crate::fixtures::{Device, Reading};

/// Builder for constructing test devices
pub struct DeviceBuilder {
    id: i64,
    name: String,
    rating: i64,
    label: Option<String>,
    version: i64,
    readings: Vec<Reading>,
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            id: 1,
            name: "device-001".to_string(),
            rating: 3,
            label: None,
            version: 1,
            readings: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_rating(mut self, rating: i64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn with_reading(mut self, id: i64, value: i64) -> Self {
        self.readings.push(Reading { id, device_id: self.id, value });
        self
    }

    pub fn build(self) -> Device {
        Device {
            id: self.id,
            name: self.name,
            rating: self.rating,
            label: self.label,
            version: self.version,
            readings: self.readings,
        }
    }
}
