//! Shop Sign Parser
//!
//! Turns the four text lines of a shop sign into an [`Observation`].
//!
//! Sign layout:
//!
//! ```text
//! line 1: owner           Alice
//! line 2: status          Selling 64
//! line 3: item            Diamond
//! line 4: price           1,250.50
//! ```
//!
//! The status line decides the action (`selling` / `buying`, any case).
//! "Out of stock" signs are recognized but never become observations.
//! Anything that does not fit the layout is rejected silently: a sign that is
//! not a shop is normal, not an error.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::{BlockPos, Dimension, Observation, Price, ShopAction};

/// Lines on a sign face.
pub const SIGN_LINES: usize = 4;

/// What the status line says about the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignStatus {
    Selling,
    Buying,
    OutOfStock,
}

impl SignStatus {
    /// Classify a status line. `None` when it is not a shop status at all.
    pub fn from_status_line(line: &str) -> Option<Self> {
        let lower = line.to_lowercase();
        if lower.contains("selling") {
            Some(SignStatus::Selling)
        } else if lower.contains("buying") {
            Some(SignStatus::Buying)
        } else if lower.contains("out of stock")
            || lower.contains("out-of-stock")
            || lower.contains("outofstock")
        {
            Some(SignStatus::OutOfStock)
        } else {
            None
        }
    }

    /// The trade action, if this status describes an active shop.
    pub fn action(&self) -> Option<ShopAction> {
        match self {
            SignStatus::Selling => Some(ShopAction::Sell),
            SignStatus::Buying => Some(ShopAction::Buy),
            SignStatus::OutOfStock => None,
        }
    }
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:selling|buying)\D*(\d+)").expect("amount pattern is valid")
    })
}

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("price pattern is valid"))
}

/// Parse one sign into an observation.
///
/// Returns `None` unless the sign has exactly four non-blank lines, an active
/// selling/buying status and a readable price.
pub fn parse_sign<S: AsRef<str>>(
    lines: &[S],
    position: BlockPos,
    dimension: &Dimension,
) -> Option<Observation> {
    let [owner, status, item, price_line] = lines else {
        return None;
    };
    let owner = owner.as_ref().trim();
    let status = status.as_ref().trim();
    let item = item.as_ref().trim();
    let price_line = price_line.as_ref().trim();

    if owner.is_empty() || status.is_empty() || item.is_empty() || price_line.is_empty() {
        return None;
    }

    let action = SignStatus::from_status_line(status)?.action()?;
    let price = parse_price(price_line)?;
    let amount = extract_amount(status);

    Some(Observation {
        owner: owner.to_string(),
        item: item.to_string(),
        price,
        amount,
        dimension: dimension.clone(),
        action,
        position,
    })
}

/// First integer after the selling/buying keyword; 0 when there is none.
pub fn extract_amount(status_line: &str) -> u32 {
    amount_pattern()
        .captures(status_line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// First decimal number on the price line, ignoring thousands separators.
pub fn parse_price(price_line: &str) -> Option<Price> {
    let normalized = price_line.replace(',', "");
    let found = price_pattern().find(&normalized)?;
    found.as_str().parse::<f64>().ok().and_then(Price::new)
}
