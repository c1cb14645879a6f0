//! Domain layer for order creation.
//!
//! This crate provides the types the order creation saga reads and writes:
//! - `OrderRequest` the immutable workflow input
//! - `Order` / `OrderItem` as persisted by the order store
//! - `OrderStatus` with its single PENDING -> CONFIRMED transition
//! - `Money` in minor units

pub mod order;

pub use common::{OrderId, ProductId, UserId};
pub use order::{
    Money, MoneyError, NewOrder, Order, OrderError, OrderItem, OrderRequest, OrderStatus,
    RequestedItem, ShippingAddress,
};
