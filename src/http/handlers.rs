//! JSON request handlers.

use alloy::primitives::Address;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::http::server::AppState;
use crate::ledger::LedgerError;

#[derive(Debug, Default, Deserialize)]
pub struct CreditRequest {
    pub amount: Option<Decimal>,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountingWithdrawalRequest {
    #[serde(rename = "amountUSD")]
    pub amount_usd: Option<Decimal>,
    pub to: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NativeAmountRequest {
    #[serde(rename = "amountETH")]
    pub amount_native: Option<Decimal>,
}

fn body<T: Default>(body: Option<Json<T>>) -> T {
    body.map(|Json(b)| b).unwrap_or_default()
}

fn ledger_rejection(err: LedgerError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": err.to_string() })),
    )
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Treasury Relay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "online",
    }))
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.treasury.status().await)
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.treasury.health().await;
    let code = if report.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

pub async fn balance(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.treasury.balance().await)
}

pub async fn earnings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.treasury.earnings())
}

pub async fn credit_earnings(
    State(state): State<AppState>,
    request: Option<Json<CreditRequest>>,
) -> impl IntoResponse {
    let request = body(request);
    let amount = request.amount_usd.or(request.amount).unwrap_or_default();

    match state.treasury.credit_earnings(amount) {
        Ok(total) => (
            StatusCode::OK,
            Json(json!({ "success": true, "credited": amount, "totalEarnings": total })),
        ),
        Err(e) => ledger_rejection(e),
    }
}

pub async fn accounting_withdrawal(
    State(state): State<AppState>,
    request: Option<Json<AccountingWithdrawalRequest>>,
) -> impl IntoResponse {
    let request = body(request);

    match state
        .treasury
        .record_accounting_withdrawal(request.amount_usd, request.to)
    {
        Ok(withdrawal) => {
            tracing::info!(
                amount_usd = %withdrawal.amount_usd,
                remaining = %withdrawal.remaining_earnings,
                "Accounting withdrawal recorded"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "status": "Withdrawal recorded (pending on-chain settlement)",
                    "withdrawal": withdrawal,
                })),
            )
        }
        Err(e) => ledger_rejection(e),
    }
}

pub async fn send_to_backend(
    State(state): State<AppState>,
    request: Option<Json<NativeAmountRequest>>,
) -> impl IntoResponse {
    let request = body(request);

    match state.treasury.request_backend_transfer(request.amount_native) {
        Ok(allocation) => (
            StatusCode::OK,
            Json(json!({ "success": true, "allocation": allocation })),
        ),
        Err(e) => ledger_rejection(e),
    }
}

pub async fn backend_to_payout(
    State(state): State<AppState>,
    request: Option<Json<NativeAmountRequest>>,
) -> impl IntoResponse {
    let request = body(request);
    let amount = request.amount_native.unwrap_or_default();

    let result = state.treasury.request_withdrawal(amount, None).await;
    let code = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreasuryConfig;
    use crate::http::server::build_router;
    use crate::testkit::{test_wallet, MockChain, MockConnector};
    use crate::treasury::TreasuryService;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::Router;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const PRIMARY: &str = "http://primary.invalid";

    fn app(balance: Decimal) -> Router {
        let connector = Arc::new(MockConnector::new());
        connector
            .register(PRIMARY, MockChain::new())
            .set_balance_native(balance);

        let mut config = TreasuryConfig::default();
        config.blockchain.endpoints = vec![PRIMARY.to_string()];
        config.wallets.payout_address = Some(format!("{}", Address::repeat_byte(0x42)));

        let service = TreasuryService::new(&config, connector, Some(test_wallet())).unwrap();
        build_router(Arc::new(service), Duration::from_secs(180))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn decimal(value: &serde_json::Value) -> Decimal {
        value.as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let (status, json) = send(&app(dec!(0)), "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "online");
    }

    #[tokio::test]
    async fn test_credit_then_earnings() {
        let app = app(dec!(1));
        let (status, json) = send(&app, "POST", "/credit-earnings", Some(json!({ "amountUSD": 50 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&json["totalEarnings"]), dec!(50));

        let (status, json) = send(&app, "POST", "/credit-earnings", Some(json!({ "amount": -5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let (_, json) = send(&app, "GET", "/earnings", None).await;
        assert_eq!(decimal(&json["earnings"]), dec!(50));
    }

    #[tokio::test]
    async fn test_accounting_routes_default_amounts() {
        let app = app(dec!(1));
        send(&app, "POST", "/credit-earnings", Some(json!({ "amount": 500 }))).await;

        let (status, json) = send(&app, "POST", "/withdraw", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&json["withdrawal"]["amountUSD"]), dec!(100));

        let (status, json) = send(&app, "POST", "/fund-backend", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&json["allocation"]["allocatedUSD"]), dec!(34.5));
        assert_eq!(decimal(&json["allocation"]["remainingEarnings"]), dec!(365.5));
    }

    #[tokio::test]
    async fn test_status_and_balance() {
        let app = app(dec!(0.5));
        let (status, json) = send(&app, "GET", "/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["connected"], true);
        assert_eq!(json["canTrade"], true);
        assert_eq!(decimal(&json["treasuryBalance"]), dec!(0.5));
        assert_eq!(decimal(&json["autoWithdrawal"]["thresholdUSD"]), dec!(1000));

        let (_, json) = send(&app, "GET", "/balance", None).await;
        assert_eq!(decimal(&json["balanceUSD"]), dec!(1725));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_to_payout() {
        let app = app(dec!(0.35));
        let (status, json) = send(&app, "POST", "/backend-to-payout", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&json["amount"]), dec!(0.347));

        let (status, json) = send(&app, "POST", "/backend-to-payout", Some(json!({ "amountETH": 2 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorKind"], "insufficient_funds");
    }

    #[tokio::test(start_paused = true)]
    async fn test_payout_aliases() {
        for uri in ["/transfer-to-coinbase", "/treasury-to-coinbase", "/backend-to-coinbase"] {
            let app = app(dec!(0.35));
            let (status, json) = send(&app, "POST", uri, Some(json!({ "amountETH": "0.1" }))).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(decimal(&json["amount"]), dec!(0.1));
        }
    }
}
