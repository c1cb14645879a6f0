//! JSON-over-HTTP inventory client.
//!
//! Wire format (camelCase):
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | `POST /inventory/availability` | `{productIds, items}` | `{<productId>: {available, unitPrice, isActive, availableQuantity?, message?}}` |
//! | `POST /inventory/reservations` | `{items, userId, correlationId}` | `{allReserved, reservationId?, perItem}` |
//! | `POST /inventory/reservations/{id}/release` | `{items}` | `{success, message?}` |
//!
//! Every camelCase response field also accepts its snake_case spelling
//! (`perItem` also accepts `results`). When both spellings are present the
//! camelCase one wins. Unit prices may be JSON numbers or decimal strings.
//! Reservation ids are percent-encoded as a single path segment.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Money, RequestedItem};
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{
    AvailabilityResult, InventoryClient, InventoryError, ItemReservation, ReleaseResult,
    ReservationResult,
};
use crate::config::InventoryClientConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireItem<'a> {
    product_id: &'a str,
    quantity: u32,
}

fn wire_items(items: &[RequestedItem]) -> Vec<WireItem<'_>> {
    items
        .iter()
        .map(|item| WireItem {
            product_id: item.product_id.as_str(),
            quantity: item.quantity,
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityRequest<'a> {
    product_ids: Vec<&'a str>,
    items: Vec<WireItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReserveRequest<'a> {
    items: Vec<WireItem<'a>>,
    user_id: &'a str,
    correlation_id: String,
}

#[derive(Debug, Serialize)]
struct ReleaseRequest<'a> {
    items: Vec<WireItem<'a>>,
}

/// A price as sent by the service: either `10.5` or `"10.50"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePrice {
    Number(serde_json::Number),
    Text(String),
}

impl WirePrice {
    fn to_money(&self) -> Result<Money, InventoryError> {
        let raw = match self {
            WirePrice::Number(number) => number.to_string(),
            WirePrice::Text(text) => text.clone(),
        };
        let money = Money::parse_decimal(&raw)
            .map_err(|e| InventoryError::Decode(format!("unit price: {e}")))?;
        if money.is_negative() {
            return Err(InventoryError::Decode(format!(
                "unit price is negative: {raw}"
            )));
        }
        Ok(money)
    }
}

/// Tolerates responses carrying both spellings of a field; the canonical
/// one takes precedence.
fn either<T>(canonical: Option<T>, legacy: Option<T>) -> Option<T> {
    canonical.or(legacy)
}

#[derive(Debug, Deserialize)]
struct WireAvailability {
    available: bool,
    #[serde(default, rename = "unitPrice")]
    unit_price: Option<WirePrice>,
    #[serde(default, rename = "unit_price")]
    unit_price_legacy: Option<WirePrice>,
    #[serde(default, rename = "isActive")]
    is_active: Option<bool>,
    #[serde(default, rename = "is_active")]
    is_active_legacy: Option<bool>,
    #[serde(default, rename = "availableQuantity")]
    available_quantity: Option<u32>,
    #[serde(default, rename = "available_quantity")]
    available_quantity_legacy: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl WireAvailability {
    fn unit_price(&self) -> Option<&WirePrice> {
        either(self.unit_price.as_ref(), self.unit_price_legacy.as_ref())
    }

    fn is_active(&self) -> bool {
        either(self.is_active, self.is_active_legacy).unwrap_or(true)
    }

    fn available_quantity(&self) -> u32 {
        either(self.available_quantity, self.available_quantity_legacy).unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct WireItemReservation {
    #[serde(default, rename = "productId")]
    product_id: Option<String>,
    #[serde(default, rename = "product_id")]
    product_id_legacy: Option<String>,
    success: bool,
    #[serde(default, rename = "reservedQuantity")]
    reserved_quantity: Option<u32>,
    #[serde(default, rename = "reserved_quantity")]
    reserved_quantity_legacy: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl WireItemReservation {
    fn into_item(self) -> Result<ItemReservation, InventoryError> {
        let product_id = either(self.product_id, self.product_id_legacy).ok_or_else(|| {
            InventoryError::Decode("reservation item has no productId".to_string())
        })?;
        Ok(ItemReservation {
            product_id: ProductId::new(product_id),
            success: self.success,
            reserved_quantity: either(self.reserved_quantity, self.reserved_quantity_legacy)
                .unwrap_or(0),
            message: self.message,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireReservation {
    #[serde(default, rename = "allReserved")]
    all_reserved: Option<bool>,
    #[serde(default, rename = "all_reserved")]
    all_reserved_legacy: Option<bool>,
    #[serde(default, rename = "reservationId")]
    reservation_id: Option<String>,
    #[serde(default, rename = "reservation_id")]
    reservation_id_legacy: Option<String>,
    #[serde(default, rename = "perItem")]
    per_item: Option<Vec<WireItemReservation>>,
    #[serde(default)]
    results: Option<Vec<WireItemReservation>>,
}

impl WireReservation {
    fn into_result(self) -> Result<ReservationResult, InventoryError> {
        let all_reserved = either(self.all_reserved, self.all_reserved_legacy).ok_or_else(|| {
            InventoryError::Decode("reservation response has no allReserved".to_string())
        })?;
        let items = either(self.per_item, self.results)
            .unwrap_or_default()
            .into_iter()
            .map(WireItemReservation::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReservationResult {
            all_reserved,
            reservation_id: either(self.reservation_id, self.reservation_id_legacy)
                .filter(|id| !id.is_empty()),
            items,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireRelease {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Inventory client speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: reqwest::Client,
    config: InventoryClientConfig,
}

impl HttpInventoryClient {
    /// Creates a client whose requests are bounded by the configured timeout.
    pub fn new(config: InventoryClientConfig) -> Result<Self, InventoryError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a client from `INVENTORY_SERVICE_URL` / `INVENTORY_REQUEST_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, InventoryError> {
        Self::new(InventoryClientConfig::from_env())
    }

    /// Uses an existing reqwest client, e.g. one shared with other adapters.
    pub fn with_client(client: reqwest::Client, config: InventoryClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &InventoryClientConfig {
        &self.config
    }

    /// Builds an endpoint URL, percent-encoding each segment on its own.
    fn url(&self, segments: &[&str]) -> Result<Url, InventoryError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| InventoryError::InvalidUrl(format!("{}: {e}", self.config.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| InventoryError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B, R>(&self, url: Url, body: &B) -> Result<R, InventoryError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.client.post(url.clone()).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "inventory request rejected");
            return Err(InventoryError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| InventoryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[tracing::instrument(skip_all, fields(items = items.len()))]
    async fn check_availability(
        &self,
        items: &[RequestedItem],
    ) -> Result<HashMap<ProductId, AvailabilityResult>, InventoryError> {
        let request = AvailabilityRequest {
            product_ids: items.iter().map(|i| i.product_id.as_str()).collect(),
            items: wire_items(items),
        };
        let mut wire: HashMap<String, WireAvailability> =
            self.post(self.url(&["inventory", "availability"])?, &request).await?;

        let mut results = HashMap::with_capacity(items.len());
        for item in items {
            let result = match wire.remove(item.product_id.as_str()) {
                Some(entry) => AvailabilityResult {
                    product_id: item.product_id.clone(),
                    available: entry.available,
                    is_active: entry.is_active(),
                    available_quantity: entry.available_quantity(),
                    unit_price: match entry.unit_price() {
                        Some(price) => price.to_money()?,
                        None if entry.available => {
                            return Err(InventoryError::Decode(format!(
                                "available product {} has no unit price",
                                item.product_id
                            )));
                        }
                        None => Money::zero(),
                    },
                    message: entry.message,
                },
                // The service omitted a product we asked about
                None => AvailabilityResult::not_found(item.product_id.clone()),
            };
            results.insert(item.product_id.clone(), result);
        }

        Ok(results)
    }

    #[tracing::instrument(skip_all, fields(%order_id, %user_id))]
    async fn reserve(
        &self,
        items: &[RequestedItem],
        user_id: &UserId,
        order_id: OrderId,
    ) -> Result<ReservationResult, InventoryError> {
        let request = ReserveRequest {
            items: wire_items(items),
            user_id: user_id.as_str(),
            correlation_id: order_id.to_string(),
        };
        let wire: WireReservation = self
            .post(self.url(&["inventory", "reservations"])?, &request)
            .await?;

        wire.into_result()
    }

    #[tracing::instrument(skip_all, fields(%reservation_id))]
    async fn release(
        &self,
        reservation_id: &str,
        items: &[RequestedItem],
    ) -> Result<ReleaseResult, InventoryError> {
        let request = ReleaseRequest {
            items: wire_items(items),
        };
        let url = self.url(&["inventory", "reservations", reservation_id, "release"])?;
        let wire: WireRelease = self.post(url, &request).await?;

        Ok(ReleaseResult {
            success: wire.success,
            message: wire.message,
        })
    }
}
