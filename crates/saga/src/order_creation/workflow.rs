use std::sync::Arc;

use common::OrderId;
use domain::{Order, OrderRequest};
use order_store::OrderStore;

use super::{
    AvailabilityStep, LinkReservationStep, OrderCreationError, OrderSagaData, OrderStep,
    PersistOrderStep, ReserveInventoryStep, SAGA_TYPE,
};
use crate::config::SagaConfig;
use crate::context::RequestContext;
use crate::coordinator::{SagaCoordinator, SagaOutcome};
use crate::error::SagaAbort;
use crate::inventory::InventoryClient;

/// Entry point for creating orders.
///
/// Builds a fresh four-step saga per request over shared inventory and
/// order store handles. Holds no per-request state, so one workflow serves
/// any number of concurrent requests.
pub struct OrderCreationWorkflow<I, S> {
    inventory: Arc<I>,
    store: Arc<S>,
    config: SagaConfig,
}

impl<I, S> Clone for OrderCreationWorkflow<I, S> {
    fn clone(&self) -> Self {
        Self {
            inventory: Arc::clone(&self.inventory),
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<I, S> OrderCreationWorkflow<I, S>
where
    I: InventoryClient + 'static,
    S: OrderStore + 'static,
{
    /// Creates a workflow with default timeouts.
    pub fn new(inventory: Arc<I>, store: Arc<S>) -> Self {
        Self {
            inventory,
            store,
            config: SagaConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SagaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Builds the saga for one request.
    pub fn build_saga(
        &self,
        request: OrderRequest,
    ) -> SagaCoordinator<OrderSagaData, OrderCreationError> {
        let request = Arc::new(request);

        SagaCoordinator::new(SAGA_TYPE, self.config)
            .with_step(AvailabilityStep::new(
                Arc::clone(&self.inventory),
                Arc::clone(&request),
            ))
            .with_step(PersistOrderStep::new(
                Arc::clone(&self.store),
                Arc::clone(&request),
            ))
            .with_step(ReserveInventoryStep::new(
                Arc::clone(&self.inventory),
                Arc::clone(&request),
            ))
            .with_step(LinkReservationStep::new(Arc::clone(&self.store)))
    }

    /// Runs the saga and returns the confirmed order with the run's journal.
    #[tracing::instrument(
        skip_all,
        fields(user_id = %request.user_id, items = request.items.len())
    )]
    pub async fn execute(
        &self,
        request: OrderRequest,
        ctx: &RequestContext,
    ) -> SagaOutcome<Order, OrderCreationError> {
        let SagaOutcome { result, journal } = self.build_saga(request).execute(ctx).await;

        let result = result.and_then(|data| match data {
            OrderSagaData::Linked(order) => Ok(order),
            _ => Err(SagaAbort::MissingInput {
                step: OrderStep::LinkReservation.name(),
            }
            .into()),
        });

        match &result {
            Ok(order) => {
                tracing::info!(order_id = %order.id, total = %order.total_price, "order created");
            }
            Err(err) => {
                tracing::warn!(kind = %err.kind(), error = %err, "order creation failed");
            }
        }

        SagaOutcome { result, journal }
    }

    /// Creates an order, returning the id of the confirmed order.
    pub async fn create_order(
        &self,
        request: OrderRequest,
        ctx: &RequestContext,
    ) -> Result<OrderId, OrderCreationError> {
        self.execute(request, ctx)
            .await
            .into_result()
            .map(|order| order.id)
    }
}
