pub mod mem;
pub mod remote;
pub mod traits;
pub mod wire;

pub use mem::InMemoryEngine;
pub use remote::RemoteEngine;
pub use traits::*;
