// 12.0: platform-wide rollups. read-only, computed from one snapshot of the tables.
// may lag in-flight transactions; never blocks them beyond the snapshot read.

use crate::fee::FeeType;
use crate::position::PositionStatus;
use crate::store::Tables;
use crate::types::Quote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_accounts: usize,
    pub liquidated_accounts: usize,
    pub total_deposited: Quote,
    pub total_trading_power: Quote,
    pub total_fees_collected: Quote,
    // every fee type is present, zero when nothing was collected
    pub fees_by_type: BTreeMap<FeeType, Quote>,
    pub active_positions: usize,
    pub closed_positions: usize,
    // total trading power / total deposited, 0 with no deposits
    pub effective_leverage: Decimal,
}

impl PlatformStats {
    pub fn fees_of(&self, fee_type: FeeType) -> Quote {
        self.fees_by_type.get(&fee_type).copied().unwrap_or_default()
    }
}

pub fn aggregate(tables: &Tables) -> PlatformStats {
    let total_accounts = tables.accounts.len();
    let liquidated_accounts = tables.accounts.values().filter(|a| a.is_liquidated).count();
    let total_deposited: Quote = tables.accounts.values().map(|a| a.deposited_capital).sum();
    let total_trading_power: Quote = tables.accounts.values().map(|a| a.trading_power).sum();

    let mut fees_by_type: BTreeMap<FeeType, Quote> =
        FeeType::ALL.iter().map(|t| (*t, Quote::zero())).collect();
    for fee in &tables.fees {
        let slot = fees_by_type.entry(fee.fee_type).or_default();
        *slot = slot.add(fee.amount);
    }
    let total_fees_collected: Quote = fees_by_type.values().sum();

    let active_positions = tables
        .positions
        .values()
        .filter(|p| p.status == PositionStatus::Open)
        .count();
    let closed_positions = tables.positions.len() - active_positions;

    let effective_leverage = if total_deposited.is_positive() {
        total_trading_power.value() / total_deposited.value()
    } else {
        Decimal::ZERO
    };

    PlatformStats {
        total_accounts,
        liquidated_accounts,
        total_deposited,
        total_trading_power,
        total_fees_collected,
        fees_by_type,
        active_positions,
        closed_positions,
        effective_leverage,
    }
}
