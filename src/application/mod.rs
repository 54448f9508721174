// Application layer - engines and the service facade the HTTP and CLI front-ends call into.

pub mod error;
pub mod query;
pub mod schedule;
pub mod service;
pub mod transfer;

pub use error::*;
pub use query::*;
pub use schedule::*;
pub use service::*;
pub use transfer::*;
