use crate::{Error, Result};
use std::{
    collections::BTreeSet,
    fmt::{self, Display},
};

/// An immutable record of which tables and tags were affected by a
/// completed write.
///
/// A `Changes` value must affect at least one table or tag; constructing
/// one with zero scope is a configuration error. Equality and hashing are
/// by set contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Changes {
    tables: BTreeSet<String>,
    tags: BTreeSet<String>,
}

impl Changes {
    pub fn new(
        tables: impl IntoIterator<Item = impl Into<String>>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let tables: BTreeSet<String> = tables.into_iter().map(Into::into).collect();
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        if tables.is_empty() && tags.is_empty() {
            return Err(Error::configuration(
                "changes must affect at least one table or tag",
            ));
        }
        Ok(Self { tables, tags })
    }

    /// Changes affecting a single table.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            tables: BTreeSet::from([table.into()]),
            tags: BTreeSet::new(),
        }
    }

    /// Changes affecting a single tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tables: BTreeSet::new(),
            tags: BTreeSet::from([tag.into()]),
        }
    }

    /// Internal constructor for callers that already hold a non-empty
    /// scope (a write query always names its table).
    pub(crate) fn from_sets(tables: BTreeSet<String>, tags: BTreeSet<String>) -> Self {
        Self { tables, tags }
    }

    pub fn tables(&self) -> &BTreeSet<String> {
        &self.tables
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Union the scope of `other` into `self`.
    pub fn merge(&mut self, other: &Changes) {
        self.tables.extend(other.tables.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
    }

    /// The bus match rule: true iff the affected tables overlap the
    /// interest tables, or the affected tags overlap the interest tags.
    /// Empty interest sets never match.
    pub fn intersects(&self, tables: &BTreeSet<String>, tags: &BTreeSet<String>) -> bool {
        self.tables.iter().any(|t| tables.contains(t))
            || self.tags.iter().any(|t| tags.contains(t))
    }
}

impl Display for Changes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tables=[")?;
        for (i, t) in self.tables.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, "] tags=[")?;
        for (i, t) in self.tags.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, "]")
    }
}
