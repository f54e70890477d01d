use crate::core::errors::PelagosError;
use crate::core::kernel::{RequestSigner, RestClient};
use crate::core::types::{
    AccountSummary, CancelAllOrdersRequest, CancelOrderRequest, FundingEntry, LeverageRequest,
    Market, MarketOrderRequest, OpenOrder, OrderAck, OrderBookSnapshot, OrderHistoryEntry,
    OrderRequest, Position, PriceInfo, TradeInfo,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Thin typed wrapper around [`RestClient`] for the Pelagos API.
///
/// Public endpoints go straight to the transport; authenticated operations
/// are signed into an envelope first and POSTed as-is.
pub struct PelagosRestClient<R: RestClient> {
    client: R,
    signer: Option<Arc<RequestSigner>>,
    /// Expiry window in seconds attached to signed operations, if any.
    expiry_window: Option<u64>,
}

impl<R: RestClient> PelagosRestClient<R> {
    pub fn new(client: R, signer: Option<Arc<RequestSigner>>) -> Self {
        Self {
            client,
            signer,
            expiry_window: None,
        }
    }

    /// Attach an expiry window to every signed operation.
    pub fn with_expiry_window(mut self, seconds: u64) -> Self {
        self.expiry_window = Some(seconds);
        self
    }

    fn signer(&self) -> Result<&RequestSigner, PelagosError> {
        self.signer.as_deref().ok_or_else(|| {
            PelagosError::Authentication(
                "operation requires credentials but none were configured".to_string(),
            )
        })
    }

    /// Account address used for authenticated reads.
    pub fn account(&self) -> Result<&str, PelagosError> {
        self.signer().map(|s| s.account())
    }

    async fn signed_post<T: Serialize>(
        &self,
        endpoint: &str,
        operation: &str,
        request: &T,
    ) -> Result<Value, PelagosError> {
        let payload = serde_json::to_value(request).map_err(|e| {
            PelagosError::Serialization(format!("failed to serialize request payload: {}", e))
        })?;
        let envelope = self.signer()?.sign(operation, &payload, self.expiry_window)?;
        self.client.post(endpoint, &envelope).await
    }

    // --- Public market data ---

    /// List all tradable markets.
    pub async fn get_markets(&self) -> Result<Vec<Market>, PelagosError> {
        self.client.get_json("/api/v1/info", &[]).await
    }

    /// Current mark/index prices for all markets.
    pub async fn get_prices(&self) -> Result<Vec<PriceInfo>, PelagosError> {
        self.client.get_json("/api/v1/info/prices", &[]).await
    }

    /// Order book snapshot for a symbol.
    pub async fn get_orderbook(&self, symbol: &str) -> Result<OrderBookSnapshot, PelagosError> {
        let params = [("symbol", symbol)];
        self.client.get_json("/api/v1/book", &params).await
    }

    /// Recent trades for a symbol.
    pub async fn get_recent_trades(&self, symbol: &str) -> Result<Vec<TradeInfo>, PelagosError> {
        let params = [("symbol", symbol)];
        self.client.get_json("/api/v1/trades", &params).await
    }

    /// Historical funding rates for a symbol.
    pub async fn get_funding_history(
        &self,
        symbol: &str,
    ) -> Result<Vec<FundingEntry>, PelagosError> {
        let params = [("symbol", symbol)];
        self.client
            .get_json("/api/v1/funding_rate/history", &params)
            .await
    }

    // --- Account reads ---

    pub async fn get_account(&self) -> Result<AccountSummary, PelagosError> {
        let account = self.account()?.to_string();
        let params = [("account", account.as_str())];
        self.client.get_json("/api/v1/account", &params).await
    }

    pub async fn get_positions(&self) -> Result<Vec<Position>, PelagosError> {
        let account = self.account()?.to_string();
        let params = [("account", account.as_str())];
        self.client.get_json("/api/v1/positions", &params).await
    }

    pub async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, PelagosError> {
        let account = self.account()?.to_string();
        let params = [("account", account.as_str())];
        self.client.get_json("/api/v1/orders", &params).await
    }

    pub async fn get_order_history(&self) -> Result<Vec<OrderHistoryEntry>, PelagosError> {
        let account = self.account()?.to_string();
        let params = [("account", account.as_str())];
        self.client
            .get_json("/api/v1/orders/history", &params)
            .await
    }

    // --- Signed operations ---

    /// Place a limit order.
    pub async fn create_order(&self, order: &OrderRequest) -> Result<OrderAck, PelagosError> {
        let response = self
            .signed_post("/api/v1/orders/create", "create_order", order)
            .await?;
        parse_response(response)
    }

    /// Place a market order with bounded slippage.
    pub async fn create_market_order(
        &self,
        order: &MarketOrderRequest,
    ) -> Result<OrderAck, PelagosError> {
        let response = self
            .signed_post(
                "/api/v1/orders/create_market",
                "create_market_order",
                order,
            )
            .await?;
        parse_response(response)
    }

    /// Cancel a single order by id or client order id.
    pub async fn cancel_order(&self, request: &CancelOrderRequest) -> Result<(), PelagosError> {
        if request.order_id.is_none() && request.client_order_id.is_none() {
            return Err(PelagosError::Validation(
                "cancel requires order_id or client_order_id".to_string(),
            ));
        }
        self.signed_post("/api/v1/orders/cancel", "cancel_order", request)
            .await?;
        Ok(())
    }

    /// Cancel all orders, optionally restricted to one symbol.
    pub async fn cancel_all_orders(
        &self,
        request: &CancelAllOrdersRequest,
    ) -> Result<(), PelagosError> {
        self.signed_post("/api/v1/orders/cancel_all", "cancel_all_orders", request)
            .await?;
        Ok(())
    }

    /// Update leverage for a symbol.
    pub async fn update_leverage(&self, request: &LeverageRequest) -> Result<(), PelagosError> {
        if request.leverage == 0 {
            return Err(PelagosError::Validation(
                "leverage must be at least 1".to_string(),
            ));
        }
        self.signed_post("/api/v1/account/leverage", "update_leverage", request)
            .await?;
        Ok(())
    }
}

fn parse_response<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, PelagosError> {
    serde_json::from_value(value).map_err(|e| {
        PelagosError::Deserialization(format!("failed to deserialize response: {}", e))
    })
}
