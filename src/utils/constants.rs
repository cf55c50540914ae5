//! Constants Module - Single Source of Truth
//!
//! Semua konstanta, tabel harga, selector, dan fungsi konversi yang dipakai
//! di seluruh aplikasi didefinisikan di sini. Tidak ada hardcoded values di
//! modul lain.

use alloy_primitives::U256;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "Ruster x402";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for upstream HTTP requests
pub const USER_AGENT: &str = "RusterX402/0.1.0";

// ============================================
// x402 PROTOCOL
// ============================================

/// Version string echoed in payment challenge bodies
pub const X402_VERSION: &str = "x402/1.0";

/// Version of the `/.well-known/x402` document
pub const X402_CONFIG_VERSION: &str = "1.0";

/// Payment scheme name
pub const X402_SCHEME: &str = "x402";

/// Request header carrying the bearer payment claim
pub const PAYMENT_HEADER: &str = "X-Payment-Response";

/// Default settlement network / asset / receiver
pub const DEFAULT_NETWORK: &str = "base";
pub const DEFAULT_ASSET: &str = "USDC";
pub const DEFAULT_RECEIVER: &str = "0x120e011fB8a12bfcB61e5c1d751C26A5D33Aae91";

// ============================================
// PAID ROUTES - price table
// ============================================

pub const ROUTE_GAS: &str = "/api/gas";
pub const ROUTE_VALIDATORS: &str = "/api/validators";
pub const ROUTE_ETH_PRICE: &str = "/api/eth-price";
pub const ROUTE_SCAN_CONTRACT: &str = "/api/scan-contract";
pub const ROUTE_SCAN_TOKEN: &str = "/api/scan-token";
pub const ROUTE_SCAN_WALLET: &str = "/api/scan-wallet";
pub const ROUTE_ADDRESS_LABELS: &str = "/api/address-labels";
pub const ROUTE_MEV_CHECK: &str = "/api/mev-check";
pub const ROUTE_TX_PREFLIGHT: &str = "/api/tx-preflight";
pub const ROUTE_PROMPT_TEST: &str = "/api/prompt-test";
pub const ROUTE_AGENT_SCORE: &str = "/api/agent-score";

/// Priced route: (path, price in asset units, human description)
pub struct RoutePrice {
    pub path: &'static str,
    pub price: &'static str,
    pub description: &'static str,
}

/// All paid routes, in the order they are advertised
pub static ROUTE_PRICES: [RoutePrice; 11] = [
    RoutePrice { path: ROUTE_GAS, price: "0.001", description: "Get current Ethereum gas prices" },
    RoutePrice { path: ROUTE_VALIDATORS, price: "0.005", description: "Get validator queue status" },
    RoutePrice { path: ROUTE_ETH_PRICE, price: "0.001", description: "Get aggregated ETH/USD price" },
    RoutePrice { path: ROUTE_SCAN_CONTRACT, price: "0.005", description: "Scan a smart contract for risk indicators" },
    RoutePrice { path: ROUTE_SCAN_TOKEN, price: "0.008", description: "Scan a token contract for risky functions" },
    RoutePrice { path: ROUTE_SCAN_WALLET, price: "0.01", description: "Analyze wallet holdings for risk" },
    RoutePrice { path: ROUTE_ADDRESS_LABELS, price: "0.003", description: "Look up known labels for an address" },
    RoutePrice { path: ROUTE_MEV_CHECK, price: "0.005", description: "Check a transaction for MEV exposure" },
    RoutePrice { path: ROUTE_TX_PREFLIGHT, price: "0.003", description: "Simulate and risk-check a transaction" },
    RoutePrice { path: ROUTE_PROMPT_TEST, price: "0.002", description: "Test a prompt for injection attacks" },
    RoutePrice { path: ROUTE_AGENT_SCORE, price: "0.005", description: "Score an agent wallet's security posture" },
];

// ============================================
// TIMEOUTS, TTLs, WINDOWS
// ============================================

/// Default timeout for every upstream call (seconds)
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Default overall deadline for one orchestrator run (seconds)
pub const DEFAULT_ORCHESTRATOR_DEADLINE_SECS: u64 = 20;

/// Contract scans are cached for a day
pub const DEFAULT_CONTRACT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Token scans are cached for an hour
pub const DEFAULT_TOKEN_CACHE_TTL_SECS: u64 = 60 * 60;

/// Background cache sweep interval (seconds)
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Latency samples kept per endpoint
pub const DEFAULT_LATENCY_WINDOW: usize = 1000;

/// Maximum in-flight API requests
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

/// Response-time histogram bucket upper bounds (seconds)
pub const LATENCY_BUCKETS_SECS: [f64; 10] = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

// ============================================
// CHAIN IDS & UPSTREAM URLS
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: u64 = 1;
/// Base
pub const CHAIN_ID_BASE: u64 = 8453;

pub const DEFAULT_ETH_RPC_URL: &str = "https://eth.drpc.org";
pub const DEFAULT_BASE_RPC_URL: &str = "https://mainnet.base.org";

pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/api";
pub const BASESCAN_API_URL: &str = "https://api.basescan.org/api";
pub const HONEYPOT_API_URL: &str = "https://api.honeypot.is/v2/IsHoneypot";
pub const BEACON_QUEUE_URL: &str = "https://beaconcha.in/api/v1/validators/queue";

pub const COINGECKO_ETH_URL: &str = "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd";
pub const COINBASE_ETH_URL: &str = "https://api.coinbase.com/v2/exchange-rates?currency=ETH";
pub const KRAKEN_ETH_URL: &str = "https://api.kraken.com/0/public/Ticker?pair=ETHUSD";

/// MEV-protected RPCs recommended by the MEV check
pub const PROTECTED_RPCS: [&str; 2] = ["https://rpc.flashbots.net", "https://mevblocker.io"];

// ============================================
// CALLDATA SELECTORS
// ============================================

/// approve(address,uint256)
pub const SELECTOR_APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
/// transferFrom(address,address,uint256)
pub const SELECTOR_TRANSFER_FROM: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

/// Uniswap V2 style swap selectors
pub const SWAP_SELECTORS: [[u8; 4]; 4] = [
    [0x38, 0xed, 0x17, 0x39], // swapExactTokensForTokens
    [0x88, 0x03, 0xdb, 0xee], // swapTokensForExactTokens
    [0x7f, 0xf3, 0x6a, 0xb5], // swapExactETHForTokens
    [0x18, 0xcb, 0xaf, 0xe5], // swapExactTokensForETH
];

// ============================================
// TRANSACTION THRESHOLDS
// ============================================

/// 1 ETH in wei
pub const ONE_ETH_WEI: u128 = 1_000_000_000_000_000_000;

/// Headroom applied to `eth_estimateGas` results
pub const GAS_ESTIMATE_BUFFER: f64 = 1.2;

/// Buffered gas above this is flagged
pub const HIGH_GAS_LIMIT: u64 = 500_000;

/// Gas price bands for MEV exposure (gwei)
pub const GAS_PRICE_HIGH_GWEI: f64 = 50.0;
pub const GAS_PRICE_ELEVATED_GWEI: f64 = 20.0;

// ============================================
// VALIDATOR QUEUE
// ============================================

/// Validators activated/exited per epoch under the current churn limit
pub const VALIDATOR_CHURN_PER_EPOCH: f64 = 8.0;
/// 32 slots x 12 seconds
pub const EPOCHS_PER_HOUR: f64 = 3600.0 / 384.0;

// ============================================
// CONVERSION UTILITIES
// ============================================

/// Convert wei to ETH
#[inline]
pub fn wei_to_eth(wei: U256) -> f64 {
    let wei_u128: u128 = wei.try_into().unwrap_or(u128::MAX);
    wei_u128 as f64 / 1e18
}

/// Convert wei to gwei
#[inline]
pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / 1e9
}

/// Round to a fixed number of decimals
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let p = 10f64.powi(decimals);
    (value * p).round() / p
}

/// Look up the price table entry for a path
pub fn route_price(path: &str) -> Option<&'static RoutePrice> {
    ROUTE_PRICES.iter().find(|r| r.path == path)
}
