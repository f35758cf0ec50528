//! Pure filtering and board bucketing over the visible lead set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::domain::{Lead, LeadStage, Property, Unit};

/// Sentinel that disables a select-style filter.
pub const ALL: &str = "all";

/// Composable predicates applied to the lead collection. All active
/// predicates are ANDed; empty search and the `"all"` sentinel disable
/// their predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadFilters {
    pub search: String,
    pub source: String,
    pub priority: String,
    pub property: String,
}

impl Default for LeadFilters {
    fn default() -> Self {
        Self {
            search: String::new(),
            source: ALL.to_string(),
            priority: ALL.to_string(),
            property: ALL.to_string(),
        }
    }
}

/// Id-to-name lookups sourced from the directory service, used to enrich
/// the search haystack and to drive filter dropdowns.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    properties: Vec<Property>,
    units: Vec<Unit>,
    property_names: HashMap<String, String>,
    unit_names: HashMap<String, String>,
}

impl DirectoryIndex {
    pub fn new(properties: Vec<Property>, units: Vec<Unit>) -> Self {
        let property_names = properties
            .iter()
            .map(|property| (property.id.clone(), property.name.clone()))
            .collect();
        let unit_names = units
            .iter()
            .map(|unit| (unit.id.clone(), unit.name.clone()))
            .collect();
        Self {
            properties,
            units,
            property_names,
            unit_names,
        }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn property_name(&self, id: &str) -> Option<&str> {
        self.property_names.get(id).map(String::as_str)
    }

    pub fn unit_name(&self, id: &str) -> Option<&str> {
        self.unit_names.get(id).map(String::as_str)
    }
}

/// Leads surviving every active predicate, in collection order.
pub fn visible<'a>(
    leads: &'a [Lead],
    filters: &LeadFilters,
    directory: &DirectoryIndex,
) -> Vec<&'a Lead> {
    leads
        .iter()
        .filter(|lead| matches(lead, filters, directory))
        .collect()
}

fn matches(lead: &Lead, filters: &LeadFilters, directory: &DirectoryIndex) -> bool {
    let search = filters.search.trim().to_lowercase();
    if !search.is_empty() && !haystack(lead, directory).contains(&search) {
        return false;
    }

    if let Some(wanted) = active(&filters.source) {
        let actual = lead.source.map(|source| source.key());
        if actual != Some(wanted.as_str()) {
            return false;
        }
    }

    if let Some(wanted) = active(&filters.priority) {
        let actual = lead.priority.map(|priority| priority.key());
        if actual != Some(wanted.as_str()) {
            return false;
        }
    }

    if let Some(wanted) = active(&filters.property) {
        let actual = lead.property_id.as_deref().map(str::to_lowercase);
        if actual.as_deref() != Some(wanted.as_str()) {
            return false;
        }
    }

    true
}

fn active(filter: &str) -> Option<String> {
    let normalized = filter.trim().to_lowercase();
    if normalized.is_empty() || normalized == ALL {
        None
    } else {
        Some(normalized)
    }
}

/// Lower-cased free-text haystack: name, email, phone, property and unit
/// names, source, stage.
fn haystack(lead: &Lead, directory: &DirectoryIndex) -> String {
    let mut parts: Vec<String> = vec![lead.full_name()];
    if let Some(email) = &lead.email {
        parts.push(email.clone());
    }
    if let Some(phone) = &lead.phone {
        parts.push(phone.clone());
    }
    if let Some(name) = lead
        .property_id
        .as_deref()
        .and_then(|id| directory.property_name(id))
    {
        parts.push(name.to_string());
    }
    if let Some(name) = lead
        .unit_id
        .as_deref()
        .and_then(|id| directory.unit_name(id))
    {
        parts.push(name.to_string());
    }
    if let Some(source) = lead.source {
        parts.push(source.key().to_string());
    }
    parts.push(lead.stage.key().to_string());
    parts.join(" ").to_lowercase()
}

/// Partition the visible set into the six forward stages for the kanban
/// board. Lost leads never appear on the board.
pub fn board<'a>(visible: &[&'a Lead]) -> Vec<(LeadStage, Vec<&'a Lead>)> {
    LeadStage::board_order()
        .into_iter()
        .map(|stage| {
            let bucket = visible
                .iter()
                .copied()
                .filter(|lead| lead.stage == stage)
                .collect();
            (stage, bucket)
        })
        .collect()
}
