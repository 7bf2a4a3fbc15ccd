use crate::errors::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    Book,
    Magazine,
    EBook,
    AudioBook,
    Video,
}

impl MaterialType {
    pub const ALL: [MaterialType; 5] = [
        MaterialType::Book,
        MaterialType::Magazine,
        MaterialType::EBook,
        MaterialType::AudioBook,
        MaterialType::Video,
    ];

    /// Printed on paper.
    pub fn is_print(&self) -> bool {
        matches!(self, Self::Book | Self::Magazine)
    }

    /// Digital or recorded media.
    pub fn is_media(&self) -> bool {
        !self.is_print()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "BOOK",
            Self::Magazine => "MAGAZINE",
            Self::EBook => "E_BOOK",
            Self::AudioBook => "AUDIO_BOOK",
            Self::Video => "VIDEO",
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subtype-specific fields. Which ones are set depends on the record's
/// [`MaterialType`]; unused fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Magazine issue number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u32>,

    /// Running time of audio books and videos
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrator: Option<String>,
}

/// A catalog record. Immutable once published to a store; the store hands
/// out `Arc<Material>` so readers share one allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    id: String,
    title: String,
    creator: String,
    #[serde(rename = "type")]
    kind: MaterialType,
    price: f64,
    year: i32,
    #[serde(default)]
    discount_rate: f64,
    #[serde(default)]
    details: MaterialDetails,
}

impl Material {
    /// Build a validated record with no discount and no subtype details.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        creator: impl Into<String>,
        kind: MaterialType,
        price: f64,
        year: i32,
    ) -> Result<Self> {
        let material = Self {
            id: id.into(),
            title: title.into(),
            creator: creator.into(),
            kind,
            price,
            year,
            discount_rate: 0.0,
            details: MaterialDetails::default(),
        };
        material.validate()?;
        Ok(material)
    }

    pub fn with_discount(mut self, rate: f64) -> Result<Self> {
        self.discount_rate = rate;
        self.validate()?;
        Ok(self)
    }

    pub fn with_details(mut self, details: MaterialDetails) -> Self {
        self.details = details;
        self
    }

    /// Check every field invariant. Deserialized records skip the
    /// constructor, so the store calls this again on insert.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::invalid_argument("material id must not be blank"));
        }
        if self.title.trim().is_empty() {
            return Err(StoreError::invalid_argument(format!(
                "material '{}' has a blank title",
                self.id
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(StoreError::invalid_argument(format!(
                "material '{}' has invalid price {}",
                self.id, self.price
            )));
        }
        if !(0.0..=1.0).contains(&self.discount_rate) {
            return Err(StoreError::invalid_argument(format!(
                "material '{}' has discount rate {} outside [0, 1]",
                self.id, self.discount_rate
            )));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn kind(&self) -> MaterialType {
        self.kind
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn discount_rate(&self) -> f64 {
        self.discount_rate
    }

    pub fn details(&self) -> &MaterialDetails {
        &self.details
    }

    pub fn discounted_price(&self) -> f64 {
        self.price * (1.0 - self.discount_rate)
    }

    pub fn discount_amount(&self) -> f64 {
        self.price * self.discount_rate
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} ({}, {}) {:.2}",
            self.id, self.title, self.creator, self.kind, self.year, self.price
        )
    }
}
