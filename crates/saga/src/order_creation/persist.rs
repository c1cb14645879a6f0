use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::{NewOrder, OrderError, OrderItem, OrderRequest};
use order_store::{OrderStore, OrderStoreExt};

use super::{OrderCreationError, OrderSagaData, OrderStep};
use crate::error::SagaAbort;
use crate::step::SagaStep;

/// Writes the order header and its items in one transaction.
///
/// Unit prices come from the availability results and are never re-read.
/// Remembers the id of the order it created so compensation can delete it.
pub struct PersistOrderStep<S> {
    store: Arc<S>,
    request: Arc<OrderRequest>,
    created: Option<OrderId>,
}

impl<S: OrderStore> PersistOrderStep<S> {
    pub fn new(store: Arc<S>, request: Arc<OrderRequest>) -> Self {
        Self {
            store,
            request,
            created: None,
        }
    }

    /// The order this step committed and has not yet undone.
    pub fn created_order(&self) -> Option<OrderId> {
        self.created
    }
}

#[async_trait]
impl<S: OrderStore + 'static> SagaStep<OrderSagaData, OrderCreationError> for PersistOrderStep<S> {
    fn name(&self) -> &'static str {
        OrderStep::PersistOrder.name()
    }

    async fn execute(
        &mut self,
        previous: Option<&OrderSagaData>,
    ) -> Result<OrderSagaData, OrderCreationError> {
        let missing = || SagaAbort::MissingInput {
            step: OrderStep::PersistOrder.name(),
        };
        let Some(OrderSagaData::Availability(availability)) = previous else {
            return Err(missing().into());
        };

        let items = self
            .request
            .items
            .iter()
            .map(|item| {
                availability
                    .get(&item.product_id)
                    .map(|result| OrderItem::new(item.product_id.clone(), item.quantity, result.unit_price))
                    .ok_or_else(missing)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let header = NewOrder::for_items(
            self.request.user_id.clone(),
            &items,
            self.request.shipping_address.clone(),
            self.request.notes.clone(),
        )
        .map_err(OrderError::from)?;

        let order = self
            .store
            .run_in_transaction(move |tx| {
                Box::pin(async move {
                    let order = tx.insert_order(&header).await?;
                    tx.insert_items(order.id, &items).await?;
                    Ok(order.with_items(items))
                })
            })
            .await
            .map_err(OrderCreationError::Persistence)?;

        self.created = Some(order.id);
        tracing::info!(order_id = %order.id, total = %order.total_price, "order persisted");
        Ok(OrderSagaData::Persisted(order))
    }

    async fn compensate(&mut self) -> Result<(), OrderCreationError> {
        let Some(order_id) = self.created else {
            return Ok(());
        };

        let deleted = self
            .store
            .delete_order_and_items(order_id)
            .await
            .map_err(OrderCreationError::Persistence)?;
        if !deleted {
            tracing::warn!(%order_id, "order to delete was already gone");
        }

        self.created = None;
        Ok(())
    }
}
