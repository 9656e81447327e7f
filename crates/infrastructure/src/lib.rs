pub mod database;
pub mod error_handling;
pub mod memory;
pub mod observability;
mod versioning;

pub use database::*;
pub use memory::{
    InMemoryJobDefinitionRepository, InMemoryJobRepository, InMemoryScheduleDefinitionRepository,
};
pub use observability::*;
