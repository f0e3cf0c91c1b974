pub mod actor;
pub mod page;

pub use actor::{Actor, ActorRole};
pub use page::{PageRequest, SortOrder};
