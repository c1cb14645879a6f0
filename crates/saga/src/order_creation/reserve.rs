use std::sync::Arc;

use async_trait::async_trait;
use domain::OrderRequest;

use super::{OrderCreationError, OrderSagaData, OrderStep};
use crate::error::SagaAbort;
use crate::inventory::{InventoryClient, InventoryError};
use crate::step::SagaStep;

/// Reserves the requested items, using the new order id as correlation.
///
/// Remembers the reservation id it obtained so compensation can release it.
pub struct ReserveInventoryStep<I> {
    inventory: Arc<I>,
    request: Arc<OrderRequest>,
    reservation_id: Option<String>,
}

impl<I: InventoryClient> ReserveInventoryStep<I> {
    pub fn new(inventory: Arc<I>, request: Arc<OrderRequest>) -> Self {
        Self {
            inventory,
            request,
            reservation_id: None,
        }
    }

    /// The reservation this step holds and has not yet released.
    pub fn reservation_id(&self) -> Option<&str> {
        self.reservation_id.as_deref()
    }
}

#[async_trait]
impl<I: InventoryClient + 'static> SagaStep<OrderSagaData, OrderCreationError>
    for ReserveInventoryStep<I>
{
    fn name(&self) -> &'static str {
        OrderStep::ReserveInventory.name()
    }

    async fn execute(
        &mut self,
        previous: Option<&OrderSagaData>,
    ) -> Result<OrderSagaData, OrderCreationError> {
        let Some(OrderSagaData::Persisted(order)) = previous else {
            return Err(SagaAbort::MissingInput {
                step: OrderStep::ReserveInventory.name(),
            }
            .into());
        };
        let order_id = order.id;

        let result = self
            .inventory
            .reserve(&self.request.items, &self.request.user_id, order_id)
            .await
            .map_err(|source| OrderCreationError::Inventory {
                step: OrderStep::ReserveInventory,
                source,
            })?;

        // Reservations are all-or-nothing, so a refusal holds no stock.
        if !result.all_reserved {
            return Err(OrderCreationError::ReservationRejected {
                order_id,
                failures: result.failures().cloned().collect(),
            });
        }

        let Some(reservation_id) = result.reservation_id else {
            return Err(OrderCreationError::Inventory {
                step: OrderStep::ReserveInventory,
                source: InventoryError::Decode(
                    "reservation succeeded without a reservation id".to_string(),
                ),
            });
        };

        self.reservation_id = Some(reservation_id.clone());
        tracing::info!(%order_id, %reservation_id, "inventory reserved");
        Ok(OrderSagaData::Reserved {
            order_id,
            reservation_id,
        })
    }

    async fn compensate(&mut self) -> Result<(), OrderCreationError> {
        let Some(reservation_id) = self.reservation_id.clone() else {
            return Ok(());
        };

        let released = self
            .inventory
            .release(&reservation_id, &self.request.items)
            .await
            .map_err(|source| OrderCreationError::Inventory {
                step: OrderStep::ReserveInventory,
                source,
            })?;

        if !released.success {
            return Err(OrderCreationError::ReleaseRejected {
                reservation_id,
                message: released
                    .message
                    .unwrap_or_else(|| "no reason given".to_string()),
            });
        }

        tracing::info!(%reservation_id, "reservation released");
        self.reservation_id = None;
        Ok(())
    }
}
