//! Validation utilities for farm and user input

use rust_decimal::Decimal;

use crate::types::GpsCoordinates;

/// Delimiter reserved for attribute addressing; never allowed in farm names
pub const FARM_NAME_DELIMITER: char = '.';

/// Longest accepted farm name, in characters
pub const MAX_FARM_NAME_CHARS: usize = 64;

// ============================================================================
// Farm Validations
// ============================================================================

/// Validate a farm name
pub fn validate_farm_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Farm name cannot be empty");
    }
    if trimmed.chars().count() > MAX_FARM_NAME_CHARS {
        return Err("Farm name is too long");
    }
    if trimmed.contains(FARM_NAME_DELIMITER) {
        return Err("Farm name cannot contain '.'");
    }
    if trimmed.starts_with('/') {
        return Err("Farm name cannot start with '/'");
    }
    Ok(())
}

/// Validate that coordinates are on the globe
pub fn validate_coordinates(coords: &GpsCoordinates) -> Result<(), &'static str> {
    if !coords.latitude.is_finite() || !coords.longitude.is_finite() {
        return Err("Coordinates must be finite numbers");
    }
    if !(-90.0..=90.0).contains(&coords.latitude) {
        return Err("Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&coords.longitude) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Validate a farm area in hectares
pub fn validate_area(area: Decimal) -> Result<(), &'static str> {
    if area <= Decimal::ZERO {
        return Err("Area must be positive");
    }
    if area > Decimal::from(100_000) {
        return Err("Area is unrealistically large");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_farm_name_valid() {
        assert!(validate_farm_name("north field").is_ok());
        assert!(validate_farm_name("باغ پسته").is_ok());
    }

    #[test]
    fn test_validate_farm_name_invalid() {
        assert!(validate_farm_name("").is_err());
        assert!(validate_farm_name("   ").is_err());
        assert!(validate_farm_name("farm.product").is_err());
        assert!(validate_farm_name("/start").is_err());
        assert!(validate_farm_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(&GpsCoordinates::new(35.7, 51.4)).is_ok());
        assert!(validate_coordinates(&GpsCoordinates::new(91.0, 51.4)).is_err());
        assert!(validate_coordinates(&GpsCoordinates::new(35.7, -181.0)).is_err());
        assert!(validate_coordinates(&GpsCoordinates::new(f64::NAN, 0.0)).is_err());
    }

    #[test]
    fn test_validate_area() {
        assert!(validate_area(Decimal::new(25, 1)).is_ok());
        assert!(validate_area(Decimal::ZERO).is_err());
        assert!(validate_area(Decimal::from(-3)).is_err());
    }

    proptest! {
        #[test]
        fn prop_names_with_delimiter_rejected(prefix in "[a-z]{1,10}", suffix in "[a-z]{1,10}") {
            let name = format!("{}{}{}", prefix, FARM_NAME_DELIMITER, suffix);
            prop_assert!(validate_farm_name(&name).is_err());
        }
    }
}
