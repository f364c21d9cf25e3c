use serde::{Deserialize, Serialize};

use crate::limits::package::PackageId;

/// A known application
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppEntry {
    pub package: PackageId,
    pub name: String,
}

/// Applications the user can pick from, sorted by name
#[derive(Debug, Clone, Default)]
pub struct AppCatalog {
    apps: Vec<AppEntry>,
}

impl AppCatalog {
    pub fn new(mut apps: Vec<AppEntry>) -> Self {
        apps.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.package.cmp(&b.package))
        });
        Self { apps }
    }

    /// Apps whose name contains `query`, ignoring case; a blank query matches all
    pub fn search(&self, query: &str) -> Vec<&AppEntry> {
        let query = query.trim().to_lowercase();
        self.apps
            .iter()
            .filter(|app| query.is_empty() || app.name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn get(&self, package: &PackageId) -> Option<&AppEntry> {
        self.apps.iter().find(|app| &app.package == package)
    }

    /// Human-readable name, or the raw package id for unknown apps
    pub fn display_name(&self, package: &PackageId) -> String {
        self.get(package)
            .map(|app| app.name.clone())
            .unwrap_or_else(|| package.to_string())
    }
}
