//! Profit withdrawals: quoting, requesting and settling.

use super::core::LeverageEngine;
use super::positions::collect_fee;
use super::results::LedgerError;
use crate::events::{EventPayload, WithdrawalRequestedEvent, WithdrawalSettledEvent};
use crate::fee::Fee;
use crate::types::{AccountId, Quote, WithdrawalId};
use crate::withdrawal::{
    calculate_withdrawal_limit, evaluate_withdrawal, SettlementOutcome, Withdrawal, WithdrawalQuote,
};
use tracing::{info, warn};

impl LeverageEngine {
    /// What the account could withdraw right now. Read-only, no lock.
    pub async fn quote_withdrawal(&self, account_id: AccountId) -> Result<WithdrawalQuote, LedgerError> {
        let account = self.get_account(account_id).await?;
        Ok(calculate_withdrawal_limit(&account, &self.config.withdrawals, self.clock.now()))
    }

    /// Record a PENDING withdrawal of realized profit. The balance is untouched;
    /// only the withdrawal counters move.
    pub async fn request_withdrawal(
        &self,
        account_id: AccountId,
        amount: Quote,
    ) -> Result<Withdrawal, LedgerError> {
        let mut txn = self.store.begin(account_id, self.config.lock_timeout()).await?;
        if txn.account().is_liquidated {
            return Err(LedgerError::AccountLiquidated(account_id));
        }

        let now = self.clock.now();
        let terms = evaluate_withdrawal(
            txn.account(),
            amount,
            &self.config.withdrawals,
            &self.config.fees,
            self.config.money_scale,
            now,
        )
        .map_err(|err| {
            warn!(account = %account_id, amount = %amount, error = %err, "withdrawal rejected");
            LedgerError::from(err)
        })?;

        let withdrawal = Withdrawal::pending(txn.next_withdrawal_id(), account_id, &terms, now);
        txn.account_mut().record_withdrawal(terms.amount, now);
        txn.put_withdrawal(withdrawal.clone());
        txn.emit(
            now,
            EventPayload::WithdrawalRequested(WithdrawalRequestedEvent {
                account_id,
                withdrawal_id: withdrawal.id,
                amount: terms.amount,
                fee: terms.fee,
                net_amount: terms.net_amount,
            }),
        );

        let fee = Fee::withdrawal(txn.next_fee_id(), account_id, terms.fee, now);
        collect_fee(&mut txn, fee, now);
        txn.commit().await;

        info!(
            account = %account_id,
            withdrawal = %withdrawal.id,
            amount = %terms.amount,
            fee = %terms.fee,
            net = %terms.net_amount,
            "withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Move a PENDING withdrawal to its final state. Totals recorded at request
    /// time are kept either way.
    pub async fn settle_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        outcome: SettlementOutcome,
    ) -> Result<Withdrawal, LedgerError> {
        let owner = self
            .store
            .withdrawal(withdrawal_id)
            .await
            .ok_or(LedgerError::WithdrawalNotFound(withdrawal_id))?
            .account_id;

        let mut txn = self.store.begin(owner, self.config.lock_timeout()).await?;
        let mut withdrawal = txn
            .withdrawal(withdrawal_id)
            .await
            .ok_or(LedgerError::WithdrawalNotFound(withdrawal_id))?;

        let now = self.clock.now();
        withdrawal.settle(outcome, now)?;

        txn.put_withdrawal(withdrawal.clone());
        txn.emit(
            now,
            EventPayload::WithdrawalSettled(WithdrawalSettledEvent {
                account_id: owner,
                withdrawal_id,
                status: withdrawal.status,
            }),
        );
        txn.commit().await;

        info!(account = %owner, withdrawal = %withdrawal_id, status = ?withdrawal.status, "withdrawal settled");
        Ok(withdrawal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LedgerConfig;
    use crate::types::{Timestamp, WalletId};
    use crate::withdrawal::WithdrawalStatus;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    // account with 194.5 of realized profit
    async fn profitable() -> (LeverageEngine, Arc<ManualClock>, AccountId) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let engine = LeverageEngine::with_clock(LedgerConfig::default(), clock.clone()).unwrap();
        let account = engine
            .create_account(WalletId(1), "trader", Quote::new(dec!(1000)), 2)
            .await
            .unwrap();
        let opened = engine
            .open_position(account.id, "SOL", dec!(10), dec!(100), dec!(2))
            .await
            .unwrap();
        engine.close_position(opened.position.id, dec!(110)).await.unwrap();
        (engine, clock, account.id)
    }

    #[tokio::test]
    async fn first_withdrawal_within_limit() {
        let (engine, _clock, id) = profitable().await;

        let quote = engine.quote_withdrawal(id).await.unwrap();
        assert_eq!(quote.available.value(), dec!(38.9));

        let withdrawal = engine.request_withdrawal(id, Quote::new(dec!(30))).await.unwrap();
        assert_eq!(withdrawal.fee.value(), dec!(0.3));
        assert_eq!(withdrawal.net_amount.value(), dec!(29.7));
        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);

        let account = engine.get_account(id).await.unwrap();
        assert_eq!(account.total_withdrawn.value(), dec!(30));
        assert_eq!(account.current_balance.value(), dec!(1187.5));
        assert_eq!(account.last_withdrawal_at, Some(Timestamp::from_millis(0)));
    }

    #[tokio::test]
    async fn over_limit_is_rejected_and_changes_nothing() {
        let (engine, _clock, id) = profitable().await;

        let err = engine.request_withdrawal(id, Quote::new(dec!(50))).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::WithdrawalExceedsLimit {
                requested: Quote::new(dec!(50)),
                available: Quote::new(dec!(38.9)),
            }
        );
        assert!(engine.withdrawals(id).await.unwrap().is_empty());
        assert_eq!(engine.get_account(id).await.unwrap().total_withdrawn, Quote::zero());
    }

    #[tokio::test]
    async fn second_withdrawal_is_prorated() {
        let (engine, clock, id) = profitable().await;
        engine.request_withdrawal(id, Quote::new(dec!(10))).await.unwrap();

        // same day: nothing left until time passes
        let err = engine.request_withdrawal(id, Quote::new(dec!(1))).await.unwrap_err();
        assert!(matches!(err, LedgerError::WithdrawalExceedsLimit { .. }));

        clock.advance_days(15);
        let quote = engine.quote_withdrawal(id).await.unwrap();
        assert_eq!(quote.available.value(), dec!(19.45));
        engine.request_withdrawal(id, Quote::new(dec!(19.45))).await.unwrap();
    }

    #[tokio::test]
    async fn no_profit_means_no_withdrawal() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let engine = LeverageEngine::with_clock(LedgerConfig::default(), clock).unwrap();
        let account = engine
            .create_account(WalletId(1), "fresh", Quote::new(dec!(1000)), 3)
            .await
            .unwrap();

        let err = engine.request_withdrawal(account.id, Quote::new(dec!(1))).await.unwrap_err();
        assert_eq!(err, LedgerError::NoProfitToWithdraw { net_profit: Quote::zero() });

        let err = engine.request_withdrawal(AccountId(99), Quote::new(dec!(1))).await.unwrap_err();
        assert_eq!(err, LedgerError::AccountNotFound(AccountId(99)));
    }

    #[tokio::test]
    async fn settle_once() {
        let (engine, _clock, id) = profitable().await;
        let withdrawal = engine.request_withdrawal(id, Quote::new(dec!(30))).await.unwrap();

        let settled = engine
            .settle_withdrawal(withdrawal.id, SettlementOutcome::Completed)
            .await
            .unwrap();
        assert_eq!(settled.status, WithdrawalStatus::Completed);
        assert!(settled.completed_at.is_some());

        let err = engine
            .settle_withdrawal(withdrawal.id, SettlementOutcome::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::WithdrawalNotPending { .. }));

        let err = engine
            .settle_withdrawal(WithdrawalId(404), SettlementOutcome::Completed)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::WithdrawalNotFound(WithdrawalId(404)));
    }

    #[tokio::test]
    async fn liquidated_account_cannot_withdraw_later_profit() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let engine = LeverageEngine::with_clock(LedgerConfig::default(), clock).unwrap();
        let id = engine
            .create_account(WalletId(1), "trader", Quote::new(dec!(1000)), 5)
            .await
            .unwrap()
            .id;

        // 9 + 15 in open fees, balance 976
        let loser = engine.open_position(id, "SOL", dec!(15), dec!(100), dec!(1)).await.unwrap();
        let winner = engine.open_position(id, "ETH", dec!(25), dec!(100), dec!(1)).await.unwrap();

        // -600 - 4.5 exit fee, balance 371.5 is -62.85%
        let closed = engine.close_position(loser.position.id, dec!(60)).await.unwrap();
        assert!(closed.liquidated);

        // +1250 - 18.75 exit fee: net profit turns positive while still liquidated
        let closed = engine.close_position(winner.position.id, dec!(150)).await.unwrap();
        assert!(!closed.liquidated);
        assert_eq!(closed.new_balance.value(), dec!(1602.75));

        let account = engine.get_account(id).await.unwrap();
        assert!(account.is_liquidated);
        assert_eq!(account.net_profit().value(), dec!(626.75));
        assert!(engine.quote_withdrawal(id).await.unwrap().available.is_positive());

        let err = engine.request_withdrawal(id, Quote::new(dec!(1))).await.unwrap_err();
        assert_eq!(err, LedgerError::AccountLiquidated(id));
        assert!(engine.withdrawals(id).await.unwrap().is_empty());
        assert_eq!(engine.get_account(id).await.unwrap().total_withdrawn, Quote::zero());
    }
}

