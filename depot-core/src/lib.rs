mod backend;
mod bus;
mod changes;
mod condition;
mod entity;
mod error;
mod operations;
mod query;
mod resolver;
mod row;
mod storage;
mod transaction;
mod value;

#[cfg(test)]
mod test_util;

pub use ::anyhow::Context;
pub use backend::*;
pub use bus::*;
pub use changes::*;
pub use condition::*;
pub use entity::*;
pub use error::*;
pub use operations::*;
pub use query::*;
pub use resolver::*;
pub use row::*;
pub use storage::*;
pub use transaction::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;
