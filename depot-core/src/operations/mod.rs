mod delete;
mod execute;
mod get;
mod put;

pub use delete::*;
pub use execute::*;
pub use get::*;
pub use put::*;
