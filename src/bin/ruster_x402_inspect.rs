//! Payment token inspector
//!
//! Decodes an x402 payment token the same way the gate does and prints the
//! claim. Handy when a client keeps getting PAYMENT_REJECTED.
//!
//! Usage:
//!   cargo run --bin ruster_x402_inspect -- <token> [route]

use chrono::{TimeZone, Utc};
use ruster_x402::core::payment::{GateDecision, TokenValidator, UnverifiedJwtValidator};
use ruster_x402::utils::constants::route_price;
use ruster_x402::{PaymentGate, ServiceConfig};

fn fmt_time(ts: Option<i64>) -> String {
    match ts.and_then(|t| Utc.timestamp_opt(t, 0).single()) {
        Some(dt) => format!("{} ({})", dt.to_rfc3339(), dt.timestamp()),
        None => "-".to_string(),
    }
}

fn main() -> eyre::Result<()> {
    let mut args = std::env::args().skip(1);
    let token = match args.next() {
        Some(t) => t,
        None => {
            eprintln!("usage: ruster_x402_inspect <token> [route]");
            std::process::exit(2);
        }
    };

    let claim = UnverifiedJwtValidator
        .decode(&token)
        .map_err(|e| eyre::eyre!("token does not decode: {}", e))?;

    println!("🔎 Payment claim");
    println!("   amount:   {}", claim.amount);
    println!("   asset:    {}", claim.asset);
    println!("   receiver: {}", claim.receiver);
    println!("   network:  {}", claim.network.as_deref().unwrap_or("-"));
    println!("   subject:  {}", claim.subject.as_deref().unwrap_or("-"));
    println!("   id:       {}", claim.id.as_deref().unwrap_or("-"));
    println!("   iat:      {}", fmt_time(claim.issued_at));
    println!("   exp:      {}", fmt_time(claim.expires_at));

    // Optional: check against a route's requirement from the current env
    if let Some(route) = args.next() {
        let price = route_price(&route).ok_or_else(|| eyre::eyre!("unknown paid route {}", route))?;
        let config = ServiceConfig::from_env();
        let requirement = config.payment.requirement(price.price, price.description);
        let gate = PaymentGate::new(
            std::sync::Arc::new(UnverifiedJwtValidator),
            config.payment.enforce_expiry,
        );

        match gate.authorize(&requirement, Some(&token)) {
            GateDecision::Granted(_) => println!("✅ Accepted for {}", route),
            GateDecision::Rejected(e) => println!("❌ Rejected for {}: {}", route, e),
            GateDecision::Challenge => println!("❌ Empty token"),
        }
    }

    println!();
    println!("⚠️  Signature NOT verified: this only shows what the token claims.");
    Ok(())
}
