//! Opening and closing positions.

use super::core::LeverageEngine;
use super::results::{ClosedPosition, LedgerError, OpenedPosition};
use crate::config::ExposureLimit;
use crate::events::{EventPayload, FeeCollectedEvent, PositionClosedEvent, PositionOpenedEvent};
use crate::fee::Fee;
use crate::position::{calculate_close, calculate_open, OpenRequest, Position};
use crate::store::AccountTxn;
use crate::types::{AccountId, PositionId, Price, Timestamp};
use rust_decimal::Decimal;
use tracing::{info, warn};

impl LeverageEngine {
    /// Open a position against the account's trading power. Fees come out of
    /// the balance immediately; the liquidation check runs before commit.
    pub async fn open_position(
        &self,
        account_id: AccountId,
        asset_symbol: &str,
        quantity: Decimal,
        entry_price: Decimal,
        leverage_multiplier: Decimal,
    ) -> Result<OpenedPosition, LedgerError> {
        let request = OpenRequest::new(asset_symbol, quantity, entry_price, leverage_multiplier)?;

        let mut txn = self.store.begin(account_id, self.config.lock_timeout()).await?;
        if txn.account().is_liquidated {
            return Err(LedgerError::AccountLiquidated(account_id));
        }

        let quote = calculate_open(&request, &self.config.fees, self.config.money_scale)?;
        let trading_power = txn.account().trading_power;
        let available = match self.config.risk.exposure_limit {
            ExposureLimit::PerPosition => trading_power,
            ExposureLimit::Aggregate => trading_power.sub(txn.open_exposure().await),
        };
        if quote.effective_position > available {
            warn!(
                account = %account_id,
                required = %quote.effective_position,
                available = %available,
                "open rejected: insufficient trading power"
            );
            return Err(LedgerError::InsufficientTradingPower {
                required: quote.effective_position,
                available,
            });
        }

        let now = self.clock.now();
        let position = Position::open(txn.next_position_id(), account_id, &request, &quote, now);
        txn.account_mut().charge_open_fees(quote.total_fee, now);
        let new_balance = txn.account().current_balance;

        txn.put_position(position.clone());
        txn.emit(
            now,
            EventPayload::PositionOpened(PositionOpenedEvent {
                account_id,
                position_id: position.id,
                asset_symbol: position.asset_symbol.clone(),
                quantity: position.quantity,
                entry_price: position.entry_price,
                leverage: position.leverage_used.value(),
                position_size: position.position_size,
                fees_paid: position.fees_paid,
                new_balance,
            }),
        );

        let trading_fee = Fee::trading(txn.next_fee_id(), account_id, quote.trading_fee, &request.asset_symbol, now);
        collect_fee(&mut txn, trading_fee, now);
        let leverage_fee = Fee::leverage(txn.next_fee_id(), account_id, quote.leverage_fee, &request.asset_symbol, now);
        collect_fee(&mut txn, leverage_fee, now);

        let liquidated = self.flag_if_liquidatable(&mut txn, now);
        txn.commit().await;

        info!(
            account = %account_id,
            position = %position.id,
            asset = %position.asset_symbol,
            size = %position.position_size,
            fees = %quote.total_fee,
            balance = %new_balance,
            "position opened"
        );

        Ok(OpenedPosition {
            position,
            trading_fee: quote.trading_fee,
            leverage_fee: quote.leverage_fee,
            total_fee: quote.total_fee,
            new_balance,
            liquidated,
        })
    }

    /// Close an open position at `exit_price`. Realized pnl is net of the exit
    /// fee. Liquidated accounts may still close what they hold.
    pub async fn close_position(
        &self,
        position_id: PositionId,
        exit_price: Decimal,
    ) -> Result<ClosedPosition, LedgerError> {
        let exit_price = Price::new(exit_price).ok_or_else(|| {
            LedgerError::InvalidArgument(format!("Exit price must be positive, got {}", exit_price))
        })?;

        // owner lookup only; the row is re-read under the lock below
        let owner = self
            .store
            .position(position_id)
            .await
            .filter(Position::is_open)
            .ok_or(LedgerError::PositionNotFound(position_id))?
            .account_id;

        let mut txn = self.store.begin(owner, self.config.lock_timeout()).await?;
        let mut position = txn
            .position(position_id)
            .await
            .filter(Position::is_open)
            .ok_or(LedgerError::PositionNotFound(position_id))?;

        let quote = calculate_close(&position, exit_price, &self.config.fees, self.config.money_scale)?;
        let now = self.clock.now();

        txn.account_mut().realize_pnl(quote.net_pnl)?;
        position.close(exit_price, quote.net_pnl, now);
        let new_balance = txn.account().current_balance;

        txn.put_position(position.clone());
        txn.emit(
            now,
            EventPayload::PositionClosed(PositionClosedEvent {
                account_id: owner,
                position_id,
                exit_price,
                realized_pnl: quote.net_pnl,
                exit_fee: quote.exit_fee,
                new_balance,
            }),
        );

        let exit_fee = Fee::exit(txn.next_fee_id(), owner, quote.exit_fee, &position.asset_symbol, now);
        collect_fee(&mut txn, exit_fee, now);

        let liquidated = self.flag_if_liquidatable(&mut txn, now);
        txn.commit().await;

        info!(
            account = %owner,
            position = %position_id,
            exit = %exit_price,
            pnl = %quote.net_pnl,
            balance = %new_balance,
            "position closed"
        );

        Ok(ClosedPosition {
            position,
            leveraged_pnl: quote.leveraged_pnl.round_to(self.config.money_scale),
            exit_fee: quote.exit_fee,
            realized_pnl: quote.net_pnl,
            new_balance,
            liquidated,
        })
    }
}

// stage a fee row and its event together so the fee ledger and journal agree
pub(super) fn collect_fee(txn: &mut AccountTxn<'_>, fee: Fee, now: Timestamp) {
    let event = FeeCollectedEvent {
        account_id: fee.account_id,
        fee_type: fee.fee_type,
        amount: fee.amount,
    };
    txn.push_fee(fee);
    txn.emit(now, EventPayload::FeeCollected(event));
}
