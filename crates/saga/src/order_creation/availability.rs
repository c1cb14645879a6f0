use std::sync::Arc;

use async_trait::async_trait;
use domain::OrderRequest;

use super::{OrderCreationError, OrderSagaData, OrderStep, UnavailableItem};
use crate::inventory::{AvailabilityResult, InventoryClient};
use crate::step::SagaStep;

/// Checks that every requested product can be ordered and captures its price.
///
/// Read-only, so compensation does nothing.
pub struct AvailabilityStep<I> {
    inventory: Arc<I>,
    request: Arc<OrderRequest>,
}

impl<I: InventoryClient> AvailabilityStep<I> {
    pub fn new(inventory: Arc<I>, request: Arc<OrderRequest>) -> Self {
        Self { inventory, request }
    }
}

#[async_trait]
impl<I: InventoryClient + 'static> SagaStep<OrderSagaData, OrderCreationError>
    for AvailabilityStep<I>
{
    fn name(&self) -> &'static str {
        OrderStep::CheckAvailability.name()
    }

    async fn execute(
        &mut self,
        _previous: Option<&OrderSagaData>,
    ) -> Result<OrderSagaData, OrderCreationError> {
        self.request.validate()?;

        let results = self
            .inventory
            .check_availability(&self.request.items)
            .await
            .map_err(|source| OrderCreationError::Inventory {
                step: OrderStep::CheckAvailability,
                source,
            })?;

        let unavailable: Vec<UnavailableItem> = self
            .request
            .items
            .iter()
            .filter_map(|item| {
                let reason = match results.get(&item.product_id) {
                    Some(result) => result.unavailable_reason(),
                    None => AvailabilityResult::not_found(item.product_id.clone()).unavailable_reason(),
                }?;
                Some(UnavailableItem {
                    product_id: item.product_id.clone(),
                    reason,
                })
            })
            .collect();

        if !unavailable.is_empty() {
            return Err(OrderCreationError::Unavailable { items: unavailable });
        }

        tracing::debug!(products = results.len(), "all requested items available");
        Ok(OrderSagaData::Availability(results))
    }

    async fn compensate(&mut self) -> Result<(), OrderCreationError> {
        Ok(())
    }
}
