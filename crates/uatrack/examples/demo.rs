// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: send an event and an ecommerce transaction.
//!
//! Run with:
//!   UATRACK_ENDPOINT=http://127.0.0.1:8080/collect \
//!   UATRACK_WAIT_FOR_RESPONSE=true UATRACK_LOG_HITS=true \
//!   RUST_LOG=uatrack=debug cargo run --example demo -p uatrack

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use uatrack::{load_config, RequestInfo, Tracker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let account_id =
		std::env::var("UATRACK_ACCOUNT_ID").unwrap_or_else(|_| "UA-XXXXXXXX-Y".to_string());
	let config = load_config()?;

	println!("Sending hits to {}", config.endpoint);
	println!("  Account: {}", account_id);

	// A request as a web framework would hand it over
	let request = RequestInfo::new("shop.example.com", "/checkout/complete?order=1001")
		.with_secure(true)
		.with_referrer("https://shop.example.com/cart")
		.with_user_agent("Mozilla/5.0 (X11; Linux x86_64)")
		.with_cookie("_ga", "GA1.2.1234567890.1700000000");

	let mut tracker = Tracker::builder(&account_id)
		.config(config)
		.request_context(Arc::new(request))
		.build()?;

	tracker.set_user_id("customer-990", true);
	println!("  Client ID: {}", tracker.resolve_client_id());
	println!("  User ID (hashed): {}", tracker.user_id().unwrap_or("-"));

	let outcome = tracker
		.set_value("eventCategory", "checkout")
		.set_value("eventAction", "complete")
		.set_value("eventLabel", "order-1001")
		.set_value("eventValue", 107)
		.set_value("dimension1", "returning")
		.send("event")
		.await?;
	println!("event delivered: {}", outcome.is_delivered());

	tracker
		.initialize()
		.set_value("transactionId", "1001")
		.set_value("transactionAffiliation", "web")
		.set_value("transactionRevenue", 107.5)
		.set_value("transactionShipping", 7.5)
		.set_value("transactionTax", 0)
		.set_value("transactionCurrency", "EUR");
	let outcome = tracker.send("transaction").await?;
	println!("transaction delivered: {}", outcome.is_delivered());
	if let Some(response) = &outcome.response {
		println!("  response: {}", String::from_utf8_lossy(response).lines().next().unwrap_or(""));
	}

	for (code, name, price, quantity) in [("SKU-1", "Mug", 50.0, 1), ("SKU-2", "Coaster", 25.0, 2)] {
		tracker
			.initialize()
			.set_value("transactionId", "1001")
			.set_value("itemCode", code)
			.set_value("itemName", name)
			.set_value("itemPrice", price)
			.set_value("itemQuantity", quantity)
			.set_value("transactionCurrency", "EUR");
		let outcome = tracker.send("item").await?;
		println!("item {} delivered: {}", code, outcome.is_delivered());
	}

	Ok(())
}
