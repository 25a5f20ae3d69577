// 8.0 engine/core.rs: main engine. owns the store, the clock and the config.

use super::results::LedgerError;
use crate::account::Account;
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::events::{AccountCreatedEvent, Event, EventPayload};
use crate::fee::Fee;
use crate::liquidation::{evaluate_liquidation, LiquidationStatus};
use crate::position::Position;
use crate::stats::{aggregate, PlatformStats};
use crate::store::LedgerStore;
use crate::types::{AccountId, PositionId, Quote, Timestamp, WalletId};
use crate::withdrawal::Withdrawal;
use std::sync::Arc;
use tracing::info;

/** 8.1: main engine struct. every operation takes &self; share it behind an Arc */
#[derive(Debug)]
pub struct LeverageEngine {
    pub(super) config: LedgerConfig,
    pub(super) store: LedgerStore,
    pub(super) clock: Arc<dyn Clock>,
}

impl LeverageEngine {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        config.validate()?;
        let store = LedgerStore::new(config.max_events);
        Ok(Self { config, store, clock })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// 8.2: fund a new account. trading power is fixed here for the account's life.
    pub async fn create_account(
        &self,
        wallet_id: WalletId,
        user_id: &str,
        deposit_amount: Quote,
        leverage_tier: u8,
    ) -> Result<Account, LedgerError> {
        let now = self.clock.now();
        // validate before drawing an id so rejected calls leave no gaps
        let probe = Account::new(
            AccountId(0),
            wallet_id,
            user_id,
            deposit_amount,
            leverage_tier,
            &self.config,
            now,
        )?;

        let account = Account {
            id: self.store.next_account_id(),
            ..probe
        };
        let event = EventPayload::AccountCreated(AccountCreatedEvent {
            account_id: account.id,
            wallet_id,
            deposited_capital: account.deposited_capital,
            leverage_tier: account.leverage_tier,
            trading_power: account.trading_power,
        });
        self.store.insert_account(account.clone(), event).await;

        info!(
            account = %account.id,
            wallet = wallet_id.0,
            deposit = %account.deposited_capital,
            tier = %account.leverage_tier,
            trading_power = %account.trading_power,
            "account created"
        );
        Ok(account)
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .account(account_id)
            .await
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    pub async fn get_position(&self, position_id: PositionId) -> Result<Position, LedgerError> {
        self.store
            .position(position_id)
            .await
            .ok_or(LedgerError::PositionNotFound(position_id))
    }

    pub async fn positions(&self, account_id: AccountId) -> Result<Vec<Position>, LedgerError> {
        self.get_account(account_id).await?;
        Ok(self.store.positions_for_account(account_id).await)
    }

    pub async fn open_positions(&self, account_id: AccountId) -> Result<Vec<Position>, LedgerError> {
        let mut positions = self.positions(account_id).await?;
        positions.retain(Position::is_open);
        Ok(positions)
    }

    pub async fn fees(&self, account_id: AccountId) -> Result<Vec<Fee>, LedgerError> {
        self.get_account(account_id).await?;
        Ok(self.store.fees_for_account(account_id).await)
    }

    pub async fn withdrawals(&self, account_id: AccountId) -> Result<Vec<Withdrawal>, LedgerError> {
        self.get_account(account_id).await?;
        Ok(self.store.withdrawals_for_account(account_id).await)
    }

    pub async fn events(&self) -> Vec<Event> {
        self.store.events().await
    }

    pub async fn events_for_account(&self, account_id: AccountId) -> Vec<Event> {
        let mut events = self.store.events().await;
        events.retain(|e| e.account_id() == account_id);
        events
    }

    /// Current distance from the liquidation threshold. Read-only.
    pub async fn liquidation_status(&self, account_id: AccountId) -> Result<LiquidationStatus, LedgerError> {
        let account = self.get_account(account_id).await?;
        Ok(evaluate_liquidation(&account))
    }

    /// 8.6: platform rollup from one consistent snapshot.
    pub async fn get_platform_stats(&self) -> PlatformStats {
        self.store.snapshot(aggregate).await
    }
}
