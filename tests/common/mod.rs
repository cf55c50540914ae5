//! Shared fixtures for the HTTP integration tests: canned upstreams and
//! payment tokens built the way a paying client would.

#![allow(dead_code)]

use alloy_primitives::U256;
use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use eyre::{eyre, Result};
use ruster_x402::api::{create_router, AppState};
use ruster_x402::core::payment::encode_unsigned_token;
use ruster_x402::providers::{
    CallRequest, ChainRpc, ContractExplorer, ExplorerTx, GasEstimate, HoneypotOracle, PriceSource,
    TokenBalance, ValidatorQueue, ValidatorQueueSource,
};
use ruster_x402::utils::constants::{route_price, DEFAULT_RECEIVER, PAYMENT_HEADER};
use ruster_x402::{Chain, Providers, ServiceConfig};
use serde_json::json;
use std::sync::Arc;

/// Every upstream at once: either answering with canned data or failing
#[derive(Clone, Copy)]
pub struct Upstream {
    pub up: bool,
}

impl Upstream {
    fn check(&self) -> Result<()> {
        if self.up {
            Ok(())
        } else {
            Err(eyre!("connection refused"))
        }
    }
}

#[async_trait]
impl ChainRpc for Upstream {
    async fn gas_price_wei(&self, _: Chain) -> Result<u128> {
        self.check()?;
        Ok(25_000_000_000)
    }

    async fn code_at(&self, _: Chain, _: &str) -> Result<String> {
        self.check()?;
        Ok("0x6080".to_string())
    }

    async fn estimate_gas(&self, _: Chain, _: &CallRequest) -> Result<GasEstimate> {
        self.check()?;
        Ok(GasEstimate::Gas(21_000))
    }

    async fn balance_wei(&self, _: Chain, _: &str) -> Result<U256> {
        self.check()?;
        Ok(U256::from(1_000_000_000_000_000_000u128))
    }

    async fn token_balances(&self, _: Chain, _: &str) -> Result<Vec<TokenBalance>> {
        self.check()?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl ContractExplorer for Upstream {
    async fn contract_abi(&self, _: Chain, _: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(Some("[]".to_string()))
    }

    async fn is_proxy(&self, _: Chain, _: &str) -> Result<bool> {
        self.check()?;
        Ok(false)
    }

    async fn transactions(&self, _: Chain, _: &str) -> Result<Vec<ExplorerTx>> {
        self.check()?;
        Ok(vec![ExplorerTx { timestamp: 1_600_000_000, failed: false }])
    }
}

#[async_trait]
impl HoneypotOracle for Upstream {
    async fn is_honeypot(&self, _: Chain, _: &str) -> Result<bool> {
        self.check()?;
        Ok(false)
    }
}

#[async_trait]
impl PriceSource for Upstream {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn eth_usd(&self) -> Result<f64> {
        self.check()?;
        Ok(3000.0)
    }
}

#[async_trait]
impl ValidatorQueueSource for Upstream {
    async fn queue(&self) -> Result<ValidatorQueue> {
        self.check()?;
        Ok(ValidatorQueue { entering: 750, exiting: 75, active: 1_000_000 })
    }
}

pub fn providers(up: bool) -> Providers {
    let upstream = Arc::new(Upstream { up });
    Providers {
        rpc: upstream.clone(),
        explorer: upstream.clone(),
        honeypot: upstream.clone(),
        prices: vec![upstream.clone() as Arc<dyn PriceSource>],
        validators: upstream,
    }
}

pub fn test_app(up: bool) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(ServiceConfig::default(), &providers(up)));
    (create_router(state.clone()), state)
}

/// Token paying exactly the listed price of `route` to `receiver`
pub fn payment_token_for(route: &str, receiver: &str, exp: i64) -> String {
    let price = route_price(route).map(|p| p.price).unwrap_or("0");
    encode_unsigned_token(&json!({
        "sub": "agent-test",
        "jti": "pay_test",
        "iat": 1_700_000_000,
        "exp": exp,
        "payment": {
            "amount": price,
            "asset": "USDC",
            "receiver": receiver,
            "network": "base",
        }
    }))
}

pub fn paid_token(route: &str) -> String {
    payment_token_for(route, DEFAULT_RECEIVER, 4_000_000_000)
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(t) = token {
        builder = builder.header(PAYMENT_HEADER, t);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(path: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(t) = token {
        builder = builder.header(PAYMENT_HEADER, t);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
