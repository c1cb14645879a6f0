use std::sync::Arc;

use async_trait::async_trait;
use domain::OrderStatus;
use order_store::OrderStore;

use super::{OrderCreationError, OrderSagaData, OrderStep};
use crate::error::SagaAbort;
use crate::step::SagaStep;

/// Attaches the reservation to the order and confirms it.
///
/// Nothing to undo: if this step fails, releasing the reservation and
/// deleting the order are handled by the earlier steps' compensations.
pub struct LinkReservationStep<S> {
    store: Arc<S>,
}

impl<S: OrderStore> LinkReservationStep<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: OrderStore + 'static> SagaStep<OrderSagaData, OrderCreationError>
    for LinkReservationStep<S>
{
    fn name(&self) -> &'static str {
        OrderStep::LinkReservation.name()
    }

    async fn execute(
        &mut self,
        previous: Option<&OrderSagaData>,
    ) -> Result<OrderSagaData, OrderCreationError> {
        let Some(OrderSagaData::Reserved {
            order_id,
            reservation_id,
        }) = previous
        else {
            return Err(SagaAbort::MissingInput {
                step: OrderStep::LinkReservation.name(),
            }
            .into());
        };

        let order = self
            .store
            .update_reservation(*order_id, reservation_id, OrderStatus::Confirmed)
            .await
            .map_err(|source| OrderCreationError::Link {
                order_id: *order_id,
                reservation_id: reservation_id.clone(),
                source,
            })?;

        tracing::info!(order_id = %order.id, %reservation_id, "reservation linked, order confirmed");
        Ok(OrderSagaData::Linked(order))
    }

    async fn compensate(&mut self) -> Result<(), OrderCreationError> {
        Ok(())
    }
}
