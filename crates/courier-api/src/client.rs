//! HTTP client for order queries.
//!
//! Date scopes query the driver's orders for one day, newest first. The
//! nearby scope queries unassigned ad-hoc orders around the driver.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use courier_core::PollScope;
use courier_feed::{parse_orders, ParsedOrders};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can answer a poll scope with a list of orders.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch(&self, scope: &PollScope) -> ApiResult<ParsedOrders>;
}

/// Query string for a scope.
///
/// Dates are sent as `dd-MM-yyyy`, which is what the orders endpoint expects.
pub fn query_params(driver_id: &str, scope: &PollScope) -> Vec<(String, String)> {
    let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
    match scope {
        PollScope::Date(date) => vec![
            pair("driver", driver_id),
            pair("on", &date.format("%d-%m-%Y").to_string()),
            pair("sort", "-created_at"),
        ],
        PollScope::Nearby => vec![
            pair("nearby", driver_id),
            pair("adhoc", "1"),
            pair("unassigned", "1"),
            pair("dispatched", "1"),
        ],
        PollScope::Named(name) => vec![
            pair("driver", driver_id),
            pair("scope", name),
            pair("sort", "-created_at"),
        ],
    }
}

/// Client for the orders endpoint.
pub struct OrdersClient {
    client: Client,
    /// Orders endpoint URL (`{host}/v1/orders`).
    orders_url: String,
    api_key: String,
    driver_id: String,
}

impl OrdersClient {
    /// Create a new orders client.
    ///
    /// # Arguments
    /// * `host` - API host, e.g. "https://api.example.com"
    /// * `api_key` - bearer token; may be empty for unauthenticated test servers
    /// * `driver_id` - driver whose orders are queried
    pub fn new(
        host: &str,
        api_key: impl Into<String>,
        driver_id: impl Into<String>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            orders_url: format!("{}/v1/orders", host.trim_end_matches('/')),
            api_key: api_key.into(),
            driver_id: driver_id.into(),
        })
    }

    pub fn orders_url(&self) -> &str {
        &self.orders_url
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }
}

#[async_trait]
impl OrderSource for OrdersClient {
    async fn fetch(&self, scope: &PollScope) -> ApiResult<ParsedOrders> {
        let params = query_params(&self.driver_id, scope);
        debug!(url = %self.orders_url, %scope, "Fetching orders");

        let mut request = self.client.get(&self.orders_url).query(&params);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::HttpClient(format!("Failed to read response: {e}")))?;

        let parsed = parse_orders(&body)?;
        if !parsed.rejected.is_empty() {
            warn!(
                %scope,
                rejected = parsed.rejected.len(),
                accepted = parsed.orders.len(),
                "Order query returned invalid records"
            );
        }
        Ok(parsed)
    }
}
