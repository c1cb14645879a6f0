//! Workflow input.

use std::collections::HashSet;

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderError, ShippingAddress};

/// A requested product and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl RequestedItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A request to create an order. Immutable once handed to the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub items: Vec<RequestedItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub notes: Option<String>,
}

impl OrderRequest {
    /// Creates a request with no shipping address or notes.
    pub fn new(user_id: impl Into<UserId>, items: Vec<RequestedItem>) -> Self {
        Self {
            user_id: user_id.into(),
            items,
            shipping_address: None,
            notes: None,
        }
    }

    pub fn with_shipping_address(mut self, address: ShippingAddress) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the structural invariants the workflow relies on: a user, at
    /// least one item, positive quantities and one line per product.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(OrderError::UserIdRequired);
        }
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                });
            }
            if !seen.insert(&item.product_id) {
                return Err(OrderError::DuplicateProduct {
                    product_id: item.product_id.clone(),
                });
            }
        }
        Ok(())
    }
}
