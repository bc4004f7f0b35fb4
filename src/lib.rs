//! Depot is a reactive data layer: typed objects go in and out of a
//! pluggable [`Backend`] through put/get/delete resolvers, every write
//! announces the tables and tags it touched, and queries can be turned
//! into streams that re-run themselves whenever a relevant change lands.
//!
//! ```no_run
//! use depot::{Depot, Entity, SelectQuery};
//! use futures::StreamExt;
//! # use depot::{BackendResult, RowLabeled, Value};
//! # #[derive(Debug)]
//! # struct User { id: Option<i64>, name: String }
//! # impl Entity for User {
//! #     fn table() -> &'static str { "users" }
//! #     fn identity(&self) -> Option<i64> { self.id }
//! #     fn set_identity(&mut self, id: i64) { self.id = Some(id); }
//! #     fn to_row(&self) -> RowLabeled {
//! #         RowLabeled::from_pairs([("id", Value::Int64(self.id)), ("name", Value::from(self.name.clone()))])
//! #     }
//! #     fn from_row(row: &RowLabeled) -> BackendResult<Self> {
//! #         Ok(Self { id: None, name: String::new() })
//! #     }
//! # }
//!
//! # async fn example(backend: impl depot::Backend) -> depot::Result<()> {
//! let depot = Depot::new(backend);
//!
//! let mut user = User { id: None, name: "Ann".into() };
//! depot.put().object(&mut user).prepare()?.execute()?;
//!
//! let users = depot
//!     .get()
//!     .list_of::<User>()
//!     .with_query(SelectQuery::builder().table("users").build()?)
//!     .prepare()?
//!     .stream();
//! futures::pin_mut!(users);
//! while let Some(result) = users.next().await {
//!     println!("users now: {:?}", result?);
//! }
//! # Ok(())
//! # }
//! ```

pub use depot_core::*;
