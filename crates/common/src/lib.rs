//! Identifier types shared by the order domain, the order store and the saga.

mod types;

pub use types::{OrderId, ProductId, UserId};
