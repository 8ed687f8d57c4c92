#[cfg(test)]
mod fixtures;
mod ingredients;
mod markers;
mod recipes;
mod shopping_list;
mod subscriptions;
mod tags;
mod users;

pub use ingredients::*;
pub use markers::*;
pub use recipes::*;
pub use shopping_list::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;
