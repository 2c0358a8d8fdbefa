use crate::error::{Error, ErrorKind, Result};
use crate::models::CategoryId;
use exn::ResultExt;

/// Name given to the category created when the library has none.
pub const DEFAULT_CATEGORY_NAME: &str = "Default";

/// A category that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewCategory {
    pub name: String,
    /// Sort key; categories with equal keys keep creation order.
    pub order: i32,
    pub flags: i32,
}
impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), order: 0, flags: 0 }
    }

    /// Category names are required; whitespace alone doesn't count.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            exn::bail!(ErrorKind::Validation("category name must not be blank"));
        }
        Ok(())
    }
}

/// A persisted category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub order: i32,
    pub flags: i32,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) sort: i64,
    pub(crate) flags: i64,
}
impl TryFrom<CategoryRow> for Category {
    type Error = Error;
    fn try_from(row: CategoryRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: CategoryId::try_from(row.id)?,
            name: row.name,
            order: i32::try_from(row.sort).or_raise(|| ErrorKind::InvalidData("category order"))?,
            flags: i32::try_from(row.flags).or_raise(|| ErrorKind::InvalidData("category flags"))?,
        })
    }
}
