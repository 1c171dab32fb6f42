pub mod calendar;
pub mod datekey;
pub mod filter;
pub mod recurrence;
pub mod store;
pub mod task;

pub use crate::store::{TaskStore, TaskStoreBuilder};
