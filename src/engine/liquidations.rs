//! Liquidation flagging inside balance-moving transactions.

use super::core::LeverageEngine;
use crate::events::{AccountLiquidatedEvent, EventPayload};
use crate::liquidation::{check_liquidation, loss_pct};
use crate::store::AccountTxn;
use crate::types::Timestamp;
use rust_decimal::Decimal;
use tracing::warn;

impl LeverageEngine {
    /// Run after every balance change, before commit. Flags the account and
    /// stages the event when it crosses its threshold. Returns true only on
    /// the transition; an already liquidated account stays liquidated.
    pub(super) fn flag_if_liquidatable(&self, txn: &mut AccountTxn<'_>, now: Timestamp) -> bool {
        if txn.account().is_liquidated || !check_liquidation(txn.account()) {
            return false;
        }

        let account = txn.account_mut();
        account.is_liquidated = true;

        let event = AccountLiquidatedEvent {
            account_id: account.id,
            current_balance: account.current_balance,
            deposited_capital: account.deposited_capital,
            loss_pct: loss_pct(account).unwrap_or(Decimal::ZERO),
            threshold_pct: account.liquidation_threshold_pct,
        };
        warn!(
            account = %event.account_id,
            balance = %event.current_balance,
            loss_pct = %event.loss_pct,
            "account liquidated"
        );
        txn.emit(now, EventPayload::AccountLiquidated(event));
        true
    }
}
