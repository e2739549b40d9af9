//! Typed schema descriptor
//!
//! Read once per stream through `Store::describe_schema`. Drivers never
//! probe raw field maps; they ask the descriptor for its [`PrimaryKey`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-field schema flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field is (part of) the primary key
    #[serde(default)]
    pub primary_key: bool,
    /// Field value is store-generated and monotonically increasing
    #[serde(default)]
    pub auto_increment: bool,
}

impl FieldDescriptor {
    /// A plain, non-key field
    pub fn plain() -> Self {
        Self::default()
    }

    /// A caller-assigned primary key field
    pub fn primary_key() -> Self {
        Self {
            primary_key: true,
            auto_increment: false,
        }
    }

    /// A store-generated, auto-increment primary key field
    pub fn auto_increment_key() -> Self {
        Self {
            primary_key: true,
            auto_increment: true,
        }
    }
}

/// Primary key of an entity as seen by the planner and mutation driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// No field is flagged as primary key
    None,
    /// Exactly one primary key column
    Single {
        /// Column name
        name: String,
        /// Store-generated, monotonically increasing
        auto_increment: bool,
    },
    /// More than one primary key column
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// Column name if the key is a single column
    pub fn name(&self) -> Option<&str> {
        match self {
            PrimaryKey::Single { name, .. } => Some(name),
            _ => None,
        }
    }

    /// True for a single auto-increment column, the keyset paging precondition
    pub fn is_auto_increment(&self) -> bool {
        matches!(
            self,
            PrimaryKey::Single {
                auto_increment: true,
                ..
            }
        )
    }
}

/// Mapping field name → [`FieldDescriptor`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescriptor {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl SchemaDescriptor {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style)
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    /// Look up one field
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.fields.iter()
    }

    /// Resolve the primary key
    pub fn primary_key(&self) -> PrimaryKey {
        let keys: Vec<(&String, &FieldDescriptor)> =
            self.fields.iter().filter(|(_, d)| d.primary_key).collect();
        match keys.as_slice() {
            [] => PrimaryKey::None,
            [(name, d)] => PrimaryKey::Single {
                name: (*name).clone(),
                auto_increment: d.auto_increment,
            },
            many => PrimaryKey::Composite(many.iter().map(|(n, _)| (*n).clone()).collect()),
        }
    }
}

impl FromIterator<(String, FieldDescriptor)> for SchemaDescriptor {
    fn from_iter<T: IntoIterator<Item = (String, FieldDescriptor)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
