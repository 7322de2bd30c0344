// Data models for the tea collection

use crate::document::{Document, IndexValue};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Color category of a tea, persisted as a stable small integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TeaColor {
    Green = 1,
    Black = 2,
    White = 3,
    Red = 4,
    Blend = 5,
    Chai = 6,
    Oolong = 7,
}

impl TeaColor {
    pub const ALL: [TeaColor; 7] = [
        TeaColor::Green,
        TeaColor::Black,
        TeaColor::White,
        TeaColor::Red,
        TeaColor::Blend,
        TeaColor::Chai,
        TeaColor::Oolong,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeaColor::Green => "green",
            TeaColor::Black => "black",
            TeaColor::White => "white",
            TeaColor::Red => "red",
            TeaColor::Blend => "blend",
            TeaColor::Chai => "chai",
            TeaColor::Oolong => "oolong",
        }
    }
}

impl From<TeaColor> for u8 {
    fn from(color: TeaColor) -> u8 {
        color.code()
    }
}

impl TryFrom<u8> for TeaColor {
    type Error = StoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        TeaColor::ALL
            .into_iter()
            .find(|color| color.code() == code)
            .ok_or_else(|| StoreError::invalid_argument(format!("unknown tea color code: {}", code)))
    }
}

impl std::fmt::Display for TeaColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tea profile, addressed in the store by an id derived from its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeaProfile {
    pub name: String,
    #[serde(deserialize_with = "deserialize_caffeine")]
    caffeine_mg: f64,
    pub color: TeaColor,
}

fn check_caffeine(caffeine_mg: f64) -> Result<f64, StoreError> {
    if !caffeine_mg.is_finite() || caffeine_mg < 0.0 {
        return Err(StoreError::invalid_argument(format!(
            "caffeine content must be a non-negative amount, got {}",
            caffeine_mg
        )));
    }
    Ok(caffeine_mg)
}

fn deserialize_caffeine<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let caffeine_mg = f64::deserialize(deserializer)?;
    check_caffeine(caffeine_mg).map_err(serde::de::Error::custom)
}

impl TeaProfile {
    /// A profile with no caffeine
    pub fn new(color: TeaColor, name: &str) -> Self {
        Self {
            name: name.to_string(),
            caffeine_mg: 0.0,
            color,
        }
    }

    /// A profile with a caffeine content; negative or non-finite amounts are rejected
    pub fn with_caffeine(color: TeaColor, name: &str, caffeine_mg: f64) -> Result<Self, StoreError> {
        Ok(Self {
            name: name.to_string(),
            caffeine_mg: check_caffeine(caffeine_mg)?,
            color,
        })
    }

    /// Caffeine per serving, in mg; never negative
    pub fn caffeine_mg(&self) -> f64 {
        self.caffeine_mg
    }

    pub fn has_caffeine(&self) -> bool {
        self.caffeine_mg > 0.0
    }
}

impl Document for TeaProfile {
    fn collection_name() -> &'static str {
        "TeaProfiles"
    }

    fn natural_key(&self) -> &str {
        &self.name
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), IndexValue::String(self.name.clone()));
        fields.insert("color".to_string(), IndexValue::Int(i64::from(self.color.code())));
        fields.insert("caffeine_mg".to_string(), IndexValue::Float(self.caffeine_mg));
        fields.insert("has_caffeine".to_string(), IndexValue::Bool(self.has_caffeine()));
        fields
    }
}

/// A serving of a tea; `tea_id` is a back-reference to a tea profile's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serving {
    pub key: String,
    pub tea_id: String,
    pub served_at: DateTime<Utc>,
    pub temperature_c: f64,
}

impl Serving {
    pub fn new(tea_id: &str, temperature_c: f64) -> Self {
        Self {
            // hyphen-free, so any separator but alphanumerics is safe
            key: Uuid::now_v7().simple().to_string(),
            tea_id: tea_id.to_string(),
            served_at: Utc::now(),
            temperature_c,
        }
    }
}

impl Document for Serving {
    fn collection_name() -> &'static str {
        "Servings"
    }

    fn natural_key(&self) -> &str {
        &self.key
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("tea_id".to_string(), IndexValue::String(self.tea_id.clone()));
        fields
    }
}
