// 4.0: leveraged position tracking. one row per exposure, OPEN until closed exactly once.
// 4.1 open-side fee math, 4.2 close-side pnl math. both are pure; the engine persists.

use crate::config::FeeConfig;
use crate::types::{AccountId, Leverage, PositionId, Price, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub account_id: AccountId,
    pub asset_symbol: String,
    pub quantity: Decimal,
    pub entry_price: Price,
    pub leverage_used: Leverage,
    // effective notional: quantity * entry_price * leverage_used. pnl is computed on this
    pub position_size: Quote,
    // open-side fees only; the exit fee goes to the fee ledger
    pub fees_paid: Quote,
    pub status: PositionStatus,
    pub exit_price: Option<Price>,
    pub realized_pnl: Option<Quote>,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl Position {
    pub fn open(
        id: PositionId,
        account_id: AccountId,
        request: &OpenRequest,
        quote: &OpenQuote,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            account_id,
            asset_symbol: request.asset_symbol.clone(),
            quantity: request.quantity,
            entry_price: request.entry_price,
            leverage_used: request.leverage,
            position_size: quote.effective_position,
            fees_paid: quote.total_fee,
            status: PositionStatus::Open,
            exit_price: None,
            realized_pnl: None,
            opened_at: timestamp,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    // OPEN -> CLOSED. callers check is_open first; a closed row is never rewritten.
    pub fn close(&mut self, exit_price: Price, realized_pnl: Quote, timestamp: Timestamp) {
        debug_assert!(self.is_open(), "position {} closed twice", self.id);
        self.exit_price = Some(exit_price);
        self.realized_pnl = Some(realized_pnl);
        self.status = PositionStatus::Closed;
        self.closed_at = Some(timestamp);
    }
}

/// Validated terms of an open request.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub asset_symbol: String,
    pub quantity: Decimal,
    pub entry_price: Price,
    pub leverage: Leverage,
}

impl OpenRequest {
    pub fn new(
        asset_symbol: &str,
        quantity: Decimal,
        entry_price: Decimal,
        leverage_multiplier: Decimal,
    ) -> Result<Self, PositionError> {
        let asset_symbol = asset_symbol.trim();
        if asset_symbol.is_empty() {
            return Err(PositionError::EmptySymbol);
        }
        if quantity <= Decimal::ZERO {
            return Err(PositionError::NonPositiveQuantity(quantity));
        }
        let entry_price = Price::new(entry_price).ok_or(PositionError::InvalidPrice(entry_price))?;
        let leverage = Leverage::new(leverage_multiplier)
            .ok_or(PositionError::InvalidLeverage(leverage_multiplier))?;

        Ok(Self {
            asset_symbol: asset_symbol.to_string(),
            quantity,
            entry_price,
            leverage,
        })
    }
}

/// 4.1: everything the open path needs to know before touching the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenQuote {
    // quantity * entry_price
    pub position_size: Quote,
    // position_size * leverage, checked against trading power
    pub effective_position: Quote,
    pub trading_fee: Quote,
    pub leverage_fee: Quote,
    // sum of the two stored fee rows, so the position and fee ledger always agree
    pub total_fee: Quote,
}

pub fn calculate_open(
    request: &OpenRequest,
    fees: &FeeConfig,
    money_scale: u32,
) -> Result<OpenQuote, PositionError> {
    let position_size = request
        .quantity
        .checked_mul(request.entry_price.value())
        .map(Quote::new)
        .ok_or(PositionError::NotionalOverflow)?;
    let effective_position = position_size
        .checked_mul(request.leverage.value())
        .ok_or(PositionError::NotionalOverflow)?;

    let trading_fee = position_size.mul(fees.trading_rate()).round_to(money_scale);
    let leverage_fee = effective_position.mul(fees.leverage_rate()).round_to(money_scale);

    Ok(OpenQuote {
        position_size,
        effective_position,
        trading_fee,
        leverage_fee,
        total_fee: trading_fee.add(leverage_fee),
    })
}

/// 4.2: close-side numbers. realized pnl is rounded once from the exact difference.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseQuote {
    pub price_change_pct: Decimal,
    pub leveraged_pnl: Quote,
    pub exit_value: Quote,
    pub exit_fee: Quote,
    pub net_pnl: Quote,
}

pub fn calculate_close(
    position: &Position,
    exit_price: Price,
    fees: &FeeConfig,
    money_scale: u32,
) -> Result<CloseQuote, PositionError> {
    let entry = position.entry_price.value();
    let price_delta = exit_price.value() - entry;

    // multiply before dividing so exact results stay exact
    let leveraged_pnl = position
        .position_size
        .value()
        .checked_mul(price_delta)
        .and_then(|scaled| scaled.checked_div(entry))
        .map(Quote::new)
        .ok_or(PositionError::PnlOverflow)?;
    let price_change_pct = price_delta.checked_div(entry).ok_or(PositionError::PnlOverflow)?;

    let exit_value = position
        .quantity
        .checked_mul(exit_price.value())
        .map(Quote::new)
        .ok_or(PositionError::PnlOverflow)?;
    let exit_fee_exact = exit_value.mul(fees.exit_rate());
    let net_pnl = leveraged_pnl
        .value()
        .checked_sub(exit_fee_exact.value())
        .map(Quote::new)
        .ok_or(PositionError::PnlOverflow)?;

    Ok(CloseQuote {
        price_change_pct,
        leveraged_pnl,
        exit_value,
        exit_fee: exit_fee_exact.round_to(money_scale),
        net_pnl: net_pnl.round_to(money_scale),
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("Asset symbol must not be empty")]
    EmptySymbol,

    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("Price must be positive, got {0}")]
    InvalidPrice(Decimal),

    #[error("Leverage multiplier must be at least 1, got {0}")]
    InvalidLeverage(Decimal),

    #[error("Position notional is too large to represent")]
    NotionalOverflow,

    #[error("Realized pnl is too large to represent")]
    PnlOverflow,
}
