//! Display text for incident broadcasts.
//!
//! The catalog is a total mapping: every incident type resolves to a title
//! and a fallback body, with configured defaults for labels it does not know.

use std::collections::HashMap;

use crate::config::DispatcherConfig;
use crate::event::IncidentType;

/// Title and fallback body for one incident label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentCopy {
    pub title: String,
    /// Used when the report has no description
    pub body: String,
}

impl IncidentCopy {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Incident label to display text mapping with an explicit default
#[derive(Debug, Clone)]
pub struct IncidentCatalog {
    entries: HashMap<String, IncidentCopy>,
    default: IncidentCopy,
}

impl IncidentCatalog {
    /// Catalog with only the default entry
    pub fn empty(default: IncidentCopy) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    /// Catalog with the built-in fire, theft and crash entries
    pub fn builtin(default: IncidentCopy) -> Self {
        Self::empty(default)
            .with_entry(
                "fire",
                IncidentCopy::new(
                    "🔥 Fire Alert Nearby!",
                    "A fire has been reported nearby. Keep your distance and follow emergency instructions.",
                ),
            )
            .with_entry(
                "theft",
                IncidentCopy::new(
                    "👮 Theft Reported Nearby",
                    "A theft has been reported nearby. Keep an eye on your belongings.",
                ),
            )
            .with_entry(
                "crash",
                IncidentCopy::new(
                    "🚗 Accident Reported",
                    "A traffic accident has been reported nearby. Expect delays and drive carefully.",
                ),
            )
    }

    /// Build the catalog described by dispatcher configuration.
    ///
    /// Configured titles override built-in titles; labels new to the catalog
    /// use the default body.
    pub fn from_config(config: &DispatcherConfig) -> Self {
        let default = IncidentCopy::new(
            config.default_incident_title.clone(),
            config.default_incident_body.clone(),
        );
        let mut catalog = Self::builtin(default);

        for (label, title) in &config.incident_titles {
            let key = normalize(label);
            let body = catalog
                .entries
                .get(&key)
                .map(|copy| copy.body.clone())
                .unwrap_or_else(|| config.default_incident_body.clone());
            catalog.entries.insert(key, IncidentCopy::new(title.clone(), body));
        }

        catalog
    }

    /// Add or replace an entry
    pub fn with_entry(mut self, label: &str, copy: IncidentCopy) -> Self {
        self.entries.insert(normalize(label), copy);
        self
    }

    /// Display text for a type; unmapped types get the default entry
    pub fn lookup(&self, incident_type: &IncidentType) -> &IncidentCopy {
        self.entries
            .get(&normalize(incident_type.as_str()))
            .unwrap_or(&self.default)
    }

    pub fn title_for(&self, incident_type: &IncidentType) -> &str {
        &self.lookup(incident_type).title
    }

    pub fn default_copy(&self) -> &IncidentCopy {
        &self.default
    }
}

impl Default for IncidentCatalog {
    fn default() -> Self {
        Self::from_config(&DispatcherConfig::default())
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_titles() {
        let catalog = IncidentCatalog::default();
        assert_eq!(catalog.title_for(&IncidentType::Fire), "🔥 Fire Alert Nearby!");
        assert_eq!(catalog.title_for(&IncidentType::Theft), "👮 Theft Reported Nearby");
        assert_eq!(catalog.title_for(&IncidentType::Crash), "🚗 Accident Reported");
    }

    #[test]
    fn test_unknown_type_uses_default() {
        let catalog = IncidentCatalog::default();
        let copy = catalog.lookup(&IncidentType::parse("earthquake"));
        assert_eq!(copy.title, "Security Alert");
        assert_eq!(copy.body, "New security incident reported nearby.");
    }

    #[test]
    fn test_configured_default_title() {
        let config = DispatcherConfig {
            default_incident_title: "Heads up".to_string(),
            ..DispatcherConfig::default()
        };
        let catalog = IncidentCatalog::from_config(&config);
        assert_eq!(catalog.title_for(&IncidentType::parse("flood")), "Heads up");
    }

    #[test]
    fn test_configured_titles_extend_and_override() {
        let mut config = DispatcherConfig::default();
        config
            .incident_titles
            .insert("Flood".to_string(), "🌊 Flooding Reported".to_string());
        config
            .incident_titles
            .insert("fire".to_string(), "Fire!".to_string());

        let catalog = IncidentCatalog::from_config(&config);

        let flood = catalog.lookup(&IncidentType::parse("flood"));
        assert_eq!(flood.title, "🌊 Flooding Reported");
        assert_eq!(flood.body, config.default_incident_body);

        let fire = catalog.lookup(&IncidentType::Fire);
        assert_eq!(fire.title, "Fire!");
        assert!(fire.body.starts_with("A fire has been reported"));
    }
}
