use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AppError, AppResult};

/// Asset category with its depreciation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub name: String,

    /// Share of the purchase cost kept as residual value, in percent
    pub residual_percent: f64,

    /// Useful life in whole years
    pub useful_life: u32,
}

/// Lookup tables backing asset forms and validation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReferenceData {
    pub categories: Vec<Category>,
    /// Location name to the rooms it contains
    pub locations: BTreeMap<String, BTreeSet<String>>,
    pub companies: Vec<String>,
    pub business_units: Vec<String>,
    pub owners: Vec<String>,
    pub asset_types: Vec<String>,
}

/// Flattened option lists for client-side dropdowns.
#[derive(Debug, Clone, Serialize)]
pub struct DropdownOptions {
    pub categories: Vec<String>,
    pub types: Vec<String>,
    pub companies: Vec<String>,
    pub owners: Vec<String>,
    pub business_units: Vec<String>,
    pub locations: BTreeMap<String, Vec<String>>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ReferenceData {
    /// The catalog a fresh store starts with.
    pub fn default_catalog() -> Self {
        let categories = vec![
            Category {
                name: "Electronics".to_string(),
                residual_percent: 10.0,
                useful_life: 4,
            },
            Category {
                name: "Furniture".to_string(),
                residual_percent: 5.0,
                useful_life: 8,
            },
            Category {
                name: "Vehicle".to_string(),
                residual_percent: 20.0,
                useful_life: 8,
            },
            Category {
                name: "Machinery".to_string(),
                residual_percent: 10.0,
                useful_life: 16,
            },
        ];

        let mut data = ReferenceData {
            categories,
            locations: BTreeMap::new(),
            companies: strings(&["PT Head Office", "PT Branch Operations"]),
            business_units: strings(&["Finance", "Operations", "IT Support", "HR"]),
            owners: strings(&["General Affairs", "IT Department"]),
            asset_types: strings(&["Laptop", "Desktop", "Printer", "Desk", "Chair", "Car"]),
        };

        for (location, room) in [
            ("HO - Ciputat", "1022 - Gudang Support TOG"),
            ("HO - Ciputat", "1010 - Finance"),
            ("HO - Ciputat", "1015 - Meeting Room"),
            ("Branch - Bandung", "201 - Operations"),
            ("Branch - Bandung", "202 - Store Room"),
        ] {
            data.insert_location(location, room);
        }

        data
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn has_room(&self, location: &str, room: &str) -> bool {
        self.locations
            .get(location)
            .map(|rooms| rooms.contains(room))
            .unwrap_or(false)
    }

    /// Validate that `location`/`room` names a known placement.
    pub fn check_placement(&self, location: &str, room: &str) -> AppResult<()> {
        if self.has_room(location, room) {
            Ok(())
        } else {
            Err(AppError::invalid_input(format!(
                "unknown location '{}' / room '{}'",
                location, room
            )))
        }
    }

    pub fn dropdown_options(&self) -> DropdownOptions {
        DropdownOptions {
            categories: self.categories.iter().map(|c| c.name.clone()).collect(),
            types: self.asset_types.clone(),
            companies: self.companies.clone(),
            owners: self.owners.clone(),
            business_units: self.business_units.clone(),
            locations: self
                .locations
                .iter()
                .map(|(loc, rooms)| (loc.clone(), rooms.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Register a room; returns false when it was already known.
    pub fn insert_location(&mut self, location: &str, room: &str) -> bool {
        self.locations
            .entry(location.to_string())
            .or_default()
            .insert(room.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_knows_the_storage_room() {
        let data = ReferenceData::default_catalog();
        assert!(data.has_room("HO - Ciputat", "1022 - Gudang Support TOG"));
        assert!(!data.has_room("HO - Ciputat", "9999 - Nowhere"));
        assert!(!data.has_room("Mars", "1022 - Gudang Support TOG"));
    }

    #[test]
    fn dropdowns_group_rooms_by_location() {
        let options = ReferenceData::default_catalog().dropdown_options();
        assert_eq!(options.locations["Branch - Bandung"].len(), 2);
        assert!(options.categories.contains(&"Electronics".to_string()));
    }

    #[test]
    fn inserting_a_known_room_is_a_no_op() {
        let mut data = ReferenceData::default_catalog();
        assert!(!data.insert_location("HO - Ciputat", "1010 - Finance"));
        assert!(data.insert_location("HO - Ciputat", "1030 - Lobby"));
        assert!(data.check_placement("HO - Ciputat", "1030 - Lobby").is_ok());
    }
}
