//! Property Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::serde_helpers;

/// Listing status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    #[default]
    Available,
    Pending,
    Sold,
    Rented,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Available => "available",
            PropertyStatus::Pending => "pending",
            PropertyStatus::Sold => "sold",
            PropertyStatus::Rented => "rented",
        }
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PropertyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(PropertyStatus::Available),
            "pending" => Ok(PropertyStatus::Pending),
            "sold" => Ok(PropertyStatus::Sold),
            "rented" => Ok(PropertyStatus::Rented),
            other => Err(format!("unknown property status '{other}'")),
        }
    }
}

/// Property entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Property {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// house | apartment | condo | land | ...
    pub property_type: String,
    /// sale | rent
    pub listing_type: String,
    pub price: f64,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: String,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub area_sqft: Option<i64>,
    pub year_built: Option<i64>,
    pub status: PropertyStatus,
    pub featured: bool,
    /// Owning agent (user id from the auth token)
    pub agent_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Property with its image ids, primary image first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyWithImages {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<i64>,
}

/// Create / update property payload
///
/// Accepted from JSON bodies and from multipart forms, so numeric and boolean
/// fields also accept their string forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub property_type: String,
    pub listing_type: String,
    #[serde(deserialize_with = "serde_helpers::f64_from_any")]
    pub price: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::option_i64_from_any")]
    pub bedrooms: Option<i64>,
    #[serde(default, deserialize_with = "serde_helpers::option_f64_from_any")]
    pub bathrooms: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::option_i64_from_any")]
    pub area_sqft: Option<i64>,
    #[serde(default, deserialize_with = "serde_helpers::option_i64_from_any")]
    pub year_built: Option<i64>,
    /// Ignored on create (new listings start `available`)
    #[serde(default, deserialize_with = "serde_helpers::option_from_str")]
    pub status: Option<PropertyStatus>,
    #[serde(default, deserialize_with = "serde_helpers::bool_from_any")]
    pub featured: bool,
}

/// Listing query parameters (`GET /api/properties`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyFilter {
    /// Substring match
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub listing_type: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::option_f64_from_any")]
    pub min_price: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::option_f64_from_any")]
    pub max_price: Option<f64>,
    /// Minimum bedroom count
    #[serde(default, deserialize_with = "serde_helpers::option_i64_from_any")]
    pub bedrooms: Option<i64>,
    #[serde(default, deserialize_with = "serde_helpers::option_from_str")]
    pub status: Option<PropertyStatus>,
    /// Only featured listings that are still available
    #[serde(default, deserialize_with = "serde_helpers::bool_from_any")]
    pub featured: bool,
}
