use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::filter::{FieldAccess, Filter};

/// Named filters loaded from a YAML file.
#[derive(Debug, Deserialize, Serialize)]
pub struct FiltersConfig {
    /// Default field access for entries that don't set their own
    #[serde(default)]
    pub field_access: Option<FieldAccess>,
    /// Fail the run on any per-record type mismatch
    #[serde(default)]
    pub strict: bool,
    pub filters: HashMap<String, FilterEntry>,
}

impl FiltersConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Config: Failed to read {:?}", path))?;
        Ok(settings.try_deserialize()?)
    }

    /// Compile every entry once.
    pub fn compile(&self) -> anyhow::Result<CompiledFilters> {
        let mut filters = HashMap::with_capacity(self.filters.len());

        for (name, entry) in &self.filters {
            let access = entry
                .field_access()
                .or(self.field_access)
                .unwrap_or_default();
            let filter = Filter::compile(entry.clause(), access)
                .with_context(|| format!("Config: Error compiling filter '{}'", name))?;
            filters.insert(name.clone(), Arc::new(filter));
        }

        Ok(CompiledFilters {
            filters,
            explicit_access: self
                .filters
                .iter()
                .filter(|(_, entry)| entry.field_access().is_some() || self.field_access.is_some())
                .map(|(name, _)| name.clone())
                .collect(),
            strict: self.strict,
        })
    }
}

/// A filter as written in the config: a bare clause or a detailed entry.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FilterEntry {
    Clause(String),
    Detailed {
        #[serde(rename = "where")]
        clause: String,
        #[serde(default)]
        field_access: Option<FieldAccess>,
    },
}

impl FilterEntry {
    pub fn clause(&self) -> &str {
        match self {
            FilterEntry::Clause(clause) => clause,
            FilterEntry::Detailed { clause, .. } => clause,
        }
    }

    pub fn field_access(&self) -> Option<FieldAccess> {
        match self {
            FilterEntry::Clause(_) => None,
            FilterEntry::Detailed { field_access, .. } => *field_access,
        }
    }
}

/// Filters compiled from a [`FiltersConfig`], shared by name.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    filters: HashMap<String, Arc<Filter>>,
    explicit_access: Vec<String>,
    pub strict: bool,
}

impl CompiledFilters {
    pub fn get(&self, name: &str) -> Option<Arc<Filter>> {
        self.filters.get(name).cloned()
    }

    /// Whether the config chose the field access for this filter.
    pub fn has_explicit_access(&self, name: &str) -> bool {
        self.explicit_access.iter().any(|n| n == name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Settings for one CLI run after flags and config are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub field_access: FieldAccess,
    pub strict: bool,
    /// Set when records are marked instead of filtered
    pub mark_field: Option<String>,
    pub parallel: bool,
}
