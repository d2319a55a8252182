pub mod builder;
pub mod errors;
pub mod mapper;
pub mod model;
pub mod params;
pub mod query;
pub mod schema;

pub use builder::*;
pub use errors::*;
pub use mapper::*;
pub use model::*;
pub use params::*;
pub use query::*;
