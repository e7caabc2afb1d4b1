//! Farm models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::GpsCoordinates;

/// A registered plot of land owned by a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Farm {
    /// Unique within the owner's farm set
    pub name: String,
    pub product: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub village: Option<String>,
    /// Area in hectares
    pub area: Option<Decimal>,
    /// Both coordinates or neither
    pub location: Option<GpsCoordinates>,
    pub location_method: Option<LocationMethod>,
    /// Last advisory texts delivered for this farm
    pub advisory: Option<AdvisorySnapshot>,
}

impl Farm {
    /// Empty farm as created on name entry
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Village name when present and non-blank
    pub fn village_name(&self) -> Option<&str> {
        self.village
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// How a farm's coordinates were obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationMethod {
    /// Shared through the messaging client's location feature
    UserSent,
    /// Parsed from a map link
    Link,
    /// Picked on the web map
    MapPicker,
    /// The user tried and failed to provide a location
    Unsuccessful,
    /// Entered by an operator
    AdminSet,
}

impl LocationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMethod::UserSent => "user_sent",
            LocationMethod::Link => "link",
            LocationMethod::MapPicker => "map_picker",
            LocationMethod::Unsuccessful => "unsuccessful",
            LocationMethod::AdminSet => "admin_set",
        }
    }
}

/// A stored location method that is not one of the known variants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown location method: {0}")]
pub struct UnknownLocationMethod(pub String);

impl std::str::FromStr for LocationMethod {
    type Err = UnknownLocationMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_sent" => Ok(LocationMethod::UserSent),
            "link" => Ok(LocationMethod::Link),
            "map_picker" => Ok(LocationMethod::MapPicker),
            "unsuccessful" => Ok(LocationMethod::Unsuccessful),
            "admin_set" => Ok(LocationMethod::AdminSet),
            other => Err(UnknownLocationMethod(other.to_string())),
        }
    }
}

/// Advisory texts cached on a farm after an advisory sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvisorySnapshot {
    pub issued_for: Option<NaiveDate>,
    pub today: Option<String>,
    pub day2: Option<String>,
    pub day3: Option<String>,
}

/// A single addressable farm attribute.
///
/// Every variant is written by the store as one targeted update so that
/// concurrent writers touching sibling attributes never clobber each other.
#[derive(Debug, Clone, PartialEq)]
pub enum FarmField {
    Product(Option<String>),
    Province(Option<String>),
    City(Option<String>),
    Village(Option<String>),
    Area(Option<Decimal>),
    /// Coordinates and method change together
    Location {
        coordinates: Option<GpsCoordinates>,
        method: Option<LocationMethod>,
    },
    Advisory(Option<AdvisorySnapshot>),
}

impl FarmField {
    /// Attribute name, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            FarmField::Product(_) => "product",
            FarmField::Province(_) => "province",
            FarmField::City(_) => "city",
            FarmField::Village(_) => "village",
            FarmField::Area(_) => "area",
            FarmField::Location { .. } => "location",
            FarmField::Advisory(_) => "advisory",
        }
    }

    /// Apply the change to an in-memory farm
    pub fn apply(self, farm: &mut Farm) {
        match self {
            FarmField::Product(v) => farm.product = v,
            FarmField::Province(v) => farm.province = v,
            FarmField::City(v) => farm.city = v,
            FarmField::Village(v) => farm.village = v,
            FarmField::Area(v) => farm.area = v,
            FarmField::Location {
                coordinates,
                method,
            } => {
                farm.location = coordinates;
                farm.location_method = method;
            }
            FarmField::Advisory(v) => farm.advisory = v,
        }
    }
}
