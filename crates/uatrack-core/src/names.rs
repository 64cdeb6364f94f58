// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Friendly field names mapped onto Measurement Protocol parameter keys.
//!
//! The table is a wire-compatibility contract: several friendly names may map
//! to the same key for legacy reasons, and wire keys are accepted verbatim.
//! Names not in the table are tried against the indexed rules in declaration
//! order (custom dimensions, then custom metrics).

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Friendly name to wire key, in protocol documentation order.
pub const NAME_MAP: &[(&str, &str)] = &[
	("hitType", "t"),
	("trackingId", "tid"),
	("webPropertyId", "tid"),
	("AccountId", "tid"),
	("clientId", "cid"),
	("userId", "uid"),
	// pageview
	("hostname", "dh"),
	("documentHostname", "dh"),
	("page", "dp"),
	("path", "dp"),
	("documentPath", "dp"),
	("title", "dt"),
	("documentTitle", "dt"),
	("location", "dl"),
	("documentLocation", "dl"),
	("referrer", "dr"),
	("documentReferrer", "dr"),
	// event
	("eventCategory", "ec"),
	("eventAction", "ea"),
	("eventLabel", "el"),
	("eventValue", "ev"),
	// transaction
	("transactionAffiliation", "ta"),
	("transactionId", "ti"),
	("transactionRevenue", "tr"),
	("transactionTotal", "tr"),
	("transactionShipping", "ts"),
	("transactionTax", "tt"),
	("transactionCurrency", "cu"),
	// item
	("name", "in"),
	("itemName", "in"),
	("price", "ip"),
	("itemPrice", "ip"),
	("quantity", "iq"),
	("itemQuantity", "iq"),
	("sku", "ic"),
	("itemCode", "ic"),
	("category", "iv"),
	("itemVariation", "iv"),
	("itemCategory", "iv"),
	// social
	("socialAction", "sa"),
	("socialNetwork", "sn"),
	("socialTarget", "st"),
	// exception
	("exceptionDescription", "exd"),
	("exceptionFatal", "exf"),
	// timing
	("timingCategory", "utc"),
	("timingVariable", "utv"),
	("timingTime", "utt"),
	("timingLabel", "utl"),
	("timingDNS", "dns"),
	("timingPageLoad", "pdt"),
	("timingRedirect", "rrt"),
	("timingTCPConnect", "tcp"),
	("timingServerResponse", "srt"),
	// app / screen
	("appName", "an"),
	("appVersion", "av"),
	("contentDescription", "cd"),
	// campaign
	("campaignName", "cn"),
	("campaignSource", "cs"),
	("campaignMedium", "cm"),
	("campaignKeyword", "ck"),
	("campaignContent", "cc"),
	("campaignId", "ci"),
	// system / general
	("anonymizeIp", "aip"),
	("flashVersion", "fl"),
	("javaEnabled", "je"),
	("nonInteraction", "ni"),
	("nonInteractive", "ni"),
	("sessionControl", "sc"),
	("queueTime", "qt"),
	("screenResolution", "sr"),
	("viewportSize", "vp"),
	("documentEncoding", "de"),
	("screenColors", "sd"),
	("userLanguage", "ul"),
	("displayAdsId", "dclid"),
	("adwordsID", "gclid"),
	("linkid", "linkid"),
	("pageLoadTime", "plt"),
	("expId", "xid"),
	("expVar", "xvar"),
	("version", "v"),
	("cacheBuster", "z"),
];

struct IndexedRule {
	pattern: Regex,
	prefix: &'static str,
}

struct NameTable {
	exact: HashMap<&'static str, &'static str>,
	indexed: Vec<IndexedRule>,
}

static TABLE: LazyLock<NameTable> = LazyLock::new(|| {
	let mut exact: HashMap<&'static str, &'static str> = HashMap::with_capacity(NAME_MAP.len() * 2);
	// Wire keys resolve to themselves; friendly names are inserted last so a
	// name that is both (e.g. `linkid`) keeps its friendly mapping.
	for &(_, wire) in NAME_MAP {
		exact.insert(wire, wire);
	}
	for &(friendly, wire) in NAME_MAP {
		exact.insert(friendly, wire);
	}

	let indexed = vec![
		IndexedRule {
			pattern: Regex::new(r"^dimension([0-9]+)$").unwrap(),
			prefix: "cd",
		},
		IndexedRule {
			pattern: Regex::new(r"^metric([0-9]+)$").unwrap(),
			prefix: "cm",
		},
	];

	NameTable { exact, indexed }
});

/// Resolves a friendly name (or a wire key) to its wire key.
///
/// Exact matches win over indexed rules. Returns `None` for unknown names.
pub fn resolve(name: &str) -> Option<Cow<'static, str>> {
	if let Some(wire) = TABLE.exact.get(name) {
		return Some(Cow::Borrowed(*wire));
	}

	TABLE.indexed.iter().find_map(|rule| {
		rule
			.pattern
			.captures(name)
			.map(|caps| Cow::Owned(format!("{}{}", rule.prefix, &caps[1])))
	})
}

/// Returns true if `resolve` would find a wire key for `name`.
pub fn is_known(name: &str) -> bool {
	resolve(name).is_some()
}
