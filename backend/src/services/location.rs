//! Effective farm location
//!
//! Direct coordinates always win. Otherwise a farm with a village name is
//! looked up in the gazetteer by its (province, city, village) triple, and
//! only a unique row counts.

use shared::{Farm, GpsCoordinates};

use crate::external::Gazetteer;

/// How a farm's coordinates were obtained, or why they could not be
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Direct(GpsCoordinates),
    Gazetteer(GpsCoordinates),
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Neither coordinates nor a village name
    NoCoordinates,
    VillageNotFound,
    /// More than one gazetteer row shares the triple
    Ambiguous(usize),
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::NoCoordinates => write!(f, "no coordinates and no village"),
            UnresolvedReason::VillageNotFound => write!(f, "village not in gazetteer"),
            UnresolvedReason::Ambiguous(n) => write!(f, "village matches {} gazetteer rows", n),
        }
    }
}

impl Resolution {
    pub fn coordinates(&self) -> Option<GpsCoordinates> {
        match self {
            Resolution::Direct(c) | Resolution::Gazetteer(c) => Some(*c),
            Resolution::Unresolved(_) => None,
        }
    }
}

/// Resolve with the reason attached
pub fn resolve_detailed(farm: &Farm, gazetteer: &Gazetteer) -> Resolution {
    if let Some(coordinates) = farm.location {
        return Resolution::Direct(coordinates);
    }

    let Some(village) = farm.village_name() else {
        return Resolution::Unresolved(UnresolvedReason::NoCoordinates);
    };

    let province = farm.province.as_deref().unwrap_or_default();
    let city = farm.city.as_deref().unwrap_or_default();

    match gazetteer.lookup(province, city, village).as_slice() {
        [] => Resolution::Unresolved(UnresolvedReason::VillageNotFound),
        [row] => Resolution::Gazetteer(row.coordinates()),
        rows => Resolution::Unresolved(UnresolvedReason::Ambiguous(rows.len())),
    }
}

/// Effective coordinates of a farm, if any
pub fn resolve(farm: &Farm, gazetteer: &Gazetteer) -> Option<GpsCoordinates> {
    resolve_detailed(farm, gazetteer).coordinates()
}
