mod allocation;
mod category;
mod period;
mod snapshot;
mod transaction;
mod user;

pub use allocation::Allocation;
pub use category::Category;
pub use period::Period;
pub use snapshot::{CategoryState, Snapshot};
pub use transaction::{NewSplit, Split, Transaction};
pub use user::User;
