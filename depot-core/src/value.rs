use std::cmp::Ordering;
use time::OffsetDateTime;
use uuid::Uuid;

/// A single cell of a row.
///
/// Every variant carries an `Option` so that a null keeps its column type
/// (`Int64(None)` is a null integer, not a bare null). [`Value::Null`] is
/// the untyped null used when no type information is available, e.g. a
/// column absent from a row.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Timestamp(Option<OffsetDateTime>),
    Uuid(Option<Uuid>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl Value {
    /// True for [`Value::Null`] and for any typed variant holding `None`.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Boolean(v) => v.is_none(),
            Self::Int64(v) => v.is_none(),
            Self::Float64(v) => v.is_none(),
            Self::Varchar(v) => v.is_none(),
            Self::Blob(v) => v.is_none(),
            Self::Timestamp(v) => v.is_none(),
            Self::Uuid(v) => v.is_none(),
        }
    }

    /// Ordering between two values of the same type.
    ///
    /// Returns `None` when either side is null or the types differ, so
    /// comparisons against nulls never match (conditions provide
    /// `is_null` for that).
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Boolean(Some(l)), Self::Boolean(Some(r))) => Some(l.cmp(r)),
            (Self::Int64(Some(l)), Self::Int64(Some(r))) => Some(l.cmp(r)),
            (Self::Float64(Some(l)), Self::Float64(Some(r))) => l.partial_cmp(r),
            (Self::Varchar(Some(l)), Self::Varchar(Some(r))) => Some(l.cmp(r)),
            (Self::Blob(Some(l)), Self::Blob(Some(r))) => Some(l.cmp(r)),
            (Self::Timestamp(Some(l)), Self::Timestamp(Some(r))) => Some(l.cmp(r)),
            (Self::Uuid(Some(l)), Self::Uuid(Some(r))) => Some(l.cmp(r)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => *v,
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Varchar(v) => v.as_deref(),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(Some(value))
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(Some(value))
    }
}
impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int64(Some(value as i64))
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float64(Some(value))
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Varchar(Some(value.to_owned()))
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Varchar(Some(value))
    }
}
impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(Some(value))
    }
}
impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(Some(value))
    }
}
impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        Self::Int64(value)
    }
}
impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        Self::Varchar(value)
    }
}
