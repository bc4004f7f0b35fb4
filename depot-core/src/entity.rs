use crate::{BackendResult, RowLabeled};

/// Per-type mapping contract between an object and its row
/// representation.
///
/// Implementing `Entity` gives a type the default resolvers for free: put
/// decides insert-vs-update from [`Entity::identity`], get maps rows back
/// through [`Entity::from_row`], delete targets the identity column.
///
/// Identity is the entity's primary key; `None` means "not yet
/// persisted" and forces an insert.
pub trait Entity: Send + Sync {
    /// Backing table name.
    fn table() -> &'static str;

    /// Name of the identity column.
    fn identity_column() -> &'static str {
        "id"
    }

    fn identity(&self) -> Option<i64>;

    /// Write back a generated identity after an insert.
    fn set_identity(&mut self, id: i64);

    /// Map the object to a full row payload, identity column included
    /// (null when not yet persisted).
    fn to_row(&self) -> RowLabeled;

    fn from_row(row: &RowLabeled) -> BackendResult<Self>
    where
        Self: Sized;
}
