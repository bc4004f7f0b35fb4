use crate::{Changes, Condition, Error, Result, Value};
use std::collections::BTreeSet;

/// Read spec: which table to read, an optional projection, a predicate
/// and an optional row limit.
///
/// A select observes its own table plus any tags declared via
/// `observes_tag`; that interest set drives live query refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    columns: Option<Vec<String>>,
    condition: Condition,
    limit: Option<u64>,
    observes_tags: BTreeSet<String>,
}

impl SelectQuery {
    pub fn builder() -> SelectQueryBuilder {
        SelectQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn observes_tags(&self) -> &BTreeSet<String> {
        &self.observes_tags
    }
}

#[derive(Debug, Default)]
pub struct SelectQueryBuilder {
    table: Option<String>,
    columns: Option<Vec<String>>,
    condition: Condition,
    limit: Option<u64>,
    observes_tags: BTreeSet<String>,
}

impl SelectQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn observes_tag(mut self, tag: impl Into<String>) -> Self {
        self.observes_tags.insert(tag.into());
        self
    }

    pub fn build(self) -> Result<SelectQuery> {
        let table = required_table(self.table, "select")?;
        Ok(SelectQuery {
            table,
            columns: self.columns,
            condition: self.condition,
            limit: self.limit,
            observes_tags: self.observes_tags,
        })
    }
}

/// Insert spec. `key_column` names the column the backend materializes a
/// generated identifier into, when the inserted row carries it as null.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    table: String,
    key_column: Option<String>,
    affects_tags: BTreeSet<String>,
}

impl InsertQuery {
    pub fn builder() -> InsertQueryBuilder {
        InsertQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_column(&self) -> Option<&str> {
        self.key_column.as_deref()
    }

    pub fn affects_tags(&self) -> &BTreeSet<String> {
        &self.affects_tags
    }

    /// The change scope a successful insert announces.
    pub fn affects(&self) -> Changes {
        Changes::from_sets(
            BTreeSet::from([self.table.clone()]),
            self.affects_tags.clone(),
        )
    }
}

#[derive(Debug, Default)]
pub struct InsertQueryBuilder {
    table: Option<String>,
    key_column: Option<String>,
    affects_tags: BTreeSet<String>,
}

impl InsertQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    pub fn affects_tag(mut self, tag: impl Into<String>) -> Self {
        self.affects_tags.insert(tag.into());
        self
    }

    pub fn build(self) -> Result<InsertQuery> {
        let table = required_table(self.table, "insert")?;
        Ok(InsertQuery {
            table,
            key_column: self.key_column,
            affects_tags: self.affects_tags,
        })
    }
}

/// Update spec: table, predicate selecting the rows, and the tags the
/// write affects besides the table itself.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    table: String,
    condition: Condition,
    affects_tags: BTreeSet<String>,
}

impl UpdateQuery {
    pub fn builder() -> UpdateQueryBuilder {
        UpdateQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn affects_tags(&self) -> &BTreeSet<String> {
        &self.affects_tags
    }

    /// The change scope a successful update announces.
    pub fn affects(&self) -> Changes {
        Changes::from_sets(
            BTreeSet::from([self.table.clone()]),
            self.affects_tags.clone(),
        )
    }
}

#[derive(Debug, Default)]
pub struct UpdateQueryBuilder {
    table: Option<String>,
    condition: Condition,
    affects_tags: BTreeSet<String>,
}

impl UpdateQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn affects_tag(mut self, tag: impl Into<String>) -> Self {
        self.affects_tags.insert(tag.into());
        self
    }

    pub fn build(self) -> Result<UpdateQuery> {
        let table = required_table(self.table, "update")?;
        Ok(UpdateQuery {
            table,
            condition: self.condition,
            affects_tags: self.affects_tags,
        })
    }
}

/// Delete spec, same shape as [`UpdateQuery`] without a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    table: String,
    condition: Condition,
    affects_tags: BTreeSet<String>,
}

impl DeleteQuery {
    pub fn builder() -> DeleteQueryBuilder {
        DeleteQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn affects_tags(&self) -> &BTreeSet<String> {
        &self.affects_tags
    }

    /// The change scope a successful delete announces.
    pub fn affects(&self) -> Changes {
        Changes::from_sets(
            BTreeSet::from([self.table.clone()]),
            self.affects_tags.clone(),
        )
    }
}

#[derive(Debug, Default)]
pub struct DeleteQueryBuilder {
    table: Option<String>,
    condition: Condition,
    affects_tags: BTreeSet<String>,
}

impl DeleteQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn affects_tag(mut self, tag: impl Into<String>) -> Self {
        self.affects_tags.insert(tag.into());
        self
    }

    pub fn build(self) -> Result<DeleteQuery> {
        let table = required_table(self.table, "delete")?;
        Ok(DeleteQuery {
            table,
            condition: self.condition,
            affects_tags: self.affects_tags,
        })
    }
}

/// A raw backend statement with explicitly declared scope.
///
/// The engine cannot infer anything from opaque text, so a raw query
/// must declare the tables/tags it affects (for write notification) and
/// the ones it observes (for live query refresh). Undeclared scope means
/// no notification and no refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    sql: String,
    args: Vec<Value>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
    observes_tables: BTreeSet<String>,
    observes_tags: BTreeSet<String>,
}

impl RawQuery {
    pub fn builder() -> RawQueryBuilder {
        RawQueryBuilder::default()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn affects_tables(&self) -> &BTreeSet<String> {
        &self.affects_tables
    }

    pub fn affects_tags(&self) -> &BTreeSet<String> {
        &self.affects_tags
    }

    pub fn observes_tables(&self) -> &BTreeSet<String> {
        &self.observes_tables
    }

    pub fn observes_tags(&self) -> &BTreeSet<String> {
        &self.observes_tags
    }

    /// The change scope a successful execution announces, `None` when the
    /// statement declared no affected tables or tags.
    pub fn affects(&self) -> Option<Changes> {
        if self.affects_tables.is_empty() && self.affects_tags.is_empty() {
            None
        } else {
            Some(Changes::from_sets(
                self.affects_tables.clone(),
                self.affects_tags.clone(),
            ))
        }
    }
}

#[derive(Debug, Default)]
pub struct RawQueryBuilder {
    sql: Option<String>,
    args: Vec<Value>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
    observes_tables: BTreeSet<String>,
    observes_tags: BTreeSet<String>,
}

impl RawQueryBuilder {
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn affects_table(mut self, table: impl Into<String>) -> Self {
        self.affects_tables.insert(table.into());
        self
    }

    pub fn affects_tag(mut self, tag: impl Into<String>) -> Self {
        self.affects_tags.insert(tag.into());
        self
    }

    pub fn observes_table(mut self, table: impl Into<String>) -> Self {
        self.observes_tables.insert(table.into());
        self
    }

    pub fn observes_tag(mut self, tag: impl Into<String>) -> Self {
        self.observes_tags.insert(tag.into());
        self
    }

    pub fn build(self) -> Result<RawQuery> {
        let sql = self
            .sql
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::configuration("raw query requires a non-empty statement"))?;
        Ok(RawQuery {
            sql,
            args: self.args,
            affects_tables: self.affects_tables,
            affects_tags: self.affects_tags,
            observes_tables: self.observes_tables,
            observes_tags: self.observes_tags,
        })
    }
}

fn required_table(table: Option<String>, kind: &str) -> Result<String> {
    table
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::configuration(format!("{kind} query requires a non-empty table")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_validate_table() {
        assert!(SelectQuery::builder().build().unwrap_err().is_configuration());
        assert!(
            InsertQuery::builder()
                .table("  ")
                .build()
                .unwrap_err()
                .is_configuration()
        );
        assert!(UpdateQuery::builder().build().unwrap_err().is_configuration());
        assert!(DeleteQuery::builder().build().unwrap_err().is_configuration());
        assert!(RawQuery::builder().build().unwrap_err().is_configuration());
    }

    #[test]
    fn select_defaults() {
        let query = SelectQuery::builder().table("users").build().unwrap();
        assert_eq!(query.table(), "users");
        assert_eq!(query.condition(), &Condition::All);
        assert_eq!(query.columns(), None);
        assert_eq!(query.limit(), None);
        assert!(query.observes_tags().is_empty());
    }

    #[test]
    fn raw_query_declares_scope() {
        let query = RawQuery::builder()
            .sql("DROP TABLE users")
            .affects_table("users")
            .affects_tag("schema")
            .build()
            .unwrap();
        assert!(query.affects_tables().contains("users"));
        assert!(query.affects_tags().contains("schema"));
        assert!(query.observes_tables().is_empty());
    }
}
