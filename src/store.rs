//! Ledger store: the single source of truth for monetary state.
//!
//! Four tables (accounts, positions, fees, withdrawals) plus the audit journal,
//! laid out the way the relational schema in [`LedgerStore::SCHEMA`] describes.
//!
//! Concurrency model:
//! - every account row has its own lock. A mutating operation takes it with a
//!   deadline ([`LedgerStore::begin`]), re-reads the row, stages writes on the
//!   returned [`AccountTxn`] and commits them in one step. Different accounts
//!   never wait on each other's row locks.
//! - the tables themselves sit behind one `RwLock` that is only held for the
//!   instant of a read or a commit, never across a computation.
//! - dropping an `AccountTxn` without committing discards everything staged.
//! - ids come from per-table sequences; ids handed to a rolled back transaction
//!   are not reused.

use crate::account::Account;
use crate::events::{Event, EventPayload, Journal};
use crate::fee::Fee;
use crate::position::Position;
use crate::types::{AccountId, FeeId, PositionId, Quote, Timestamp, WithdrawalId};
use crate::withdrawal::Withdrawal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Tables {
    pub accounts: BTreeMap<AccountId, Account>,
    pub positions: BTreeMap<PositionId, Position>,
    pub fees: Vec<Fee>,
    pub withdrawals: BTreeMap<WithdrawalId, Withdrawal>,
    pub journal: Journal,
}

#[derive(Debug)]
struct Sequence(AtomicU64);

impl Sequence {
    fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct LedgerStore {
    tables: RwLock<Tables>,
    row_locks: RwLock<HashMap<AccountId, Arc<Mutex<()>>>>,
    account_seq: Sequence,
    position_seq: Sequence,
    fee_seq: Sequence,
    withdrawal_seq: Sequence,
}

impl LedgerStore {
    /// Relational layout of the four ledger tables. Money columns are
    /// fixed-point `NUMERIC(38, 18)`; nothing is stored as a float.
    pub const SCHEMA: &'static str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    account_id                   BIGINT PRIMARY KEY,
    wallet_id                    BIGINT NOT NULL,
    user_id                      TEXT NOT NULL,
    deposited_capital            NUMERIC(38, 18) NOT NULL,
    leverage_tier                SMALLINT NOT NULL CHECK (leverage_tier IN (2, 3, 5)),
    trading_power                NUMERIC(38, 18) NOT NULL,
    current_balance              NUMERIC(38, 18) NOT NULL,
    total_profit                 NUMERIC(38, 18) NOT NULL DEFAULT 0,
    total_loss                   NUMERIC(38, 18) NOT NULL DEFAULT 0,
    unrealized_pnl               NUMERIC(38, 18) NOT NULL DEFAULT 0,
    total_withdrawn              NUMERIC(38, 18) NOT NULL DEFAULT 0,
    last_withdrawal_at           TIMESTAMP,
    monthly_withdrawal_limit_pct NUMERIC(9, 4) NOT NULL DEFAULT 20,
    liquidation_threshold_pct    NUMERIC(9, 4) NOT NULL DEFAULT -50,
    is_liquidated                BOOLEAN NOT NULL DEFAULT FALSE,
    created_at                   TIMESTAMP NOT NULL,
    last_trade_at                TIMESTAMP
);

CREATE TABLE IF NOT EXISTS positions (
    position_id   BIGINT PRIMARY KEY,
    account_id    BIGINT NOT NULL REFERENCES accounts (account_id),
    asset_symbol  TEXT NOT NULL,
    quantity      NUMERIC(38, 18) NOT NULL,
    entry_price   NUMERIC(38, 18) NOT NULL,
    leverage_used NUMERIC(38, 18) NOT NULL,
    position_size NUMERIC(38, 18) NOT NULL,
    fees_paid     NUMERIC(38, 18) NOT NULL,
    status        TEXT NOT NULL CHECK (status IN ('OPEN', 'CLOSED')),
    exit_price    NUMERIC(38, 18),
    realized_pnl  NUMERIC(38, 18),
    opened_at     TIMESTAMP NOT NULL,
    closed_at     TIMESTAMP
);

CREATE TABLE IF NOT EXISTS fees (
    fee_id       BIGINT PRIMARY KEY,
    account_id   BIGINT NOT NULL REFERENCES accounts (account_id),
    fee_type     TEXT NOT NULL CHECK (fee_type IN ('TRADING', 'LEVERAGE', 'WITHDRAWAL')),
    amount       NUMERIC(38, 18) NOT NULL,
    description  TEXT,
    collected_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS withdrawals (
    withdrawal_id BIGINT PRIMARY KEY,
    account_id    BIGINT NOT NULL REFERENCES accounts (account_id),
    amount        NUMERIC(38, 18) NOT NULL,
    fee           NUMERIC(38, 18) NOT NULL,
    net_amount    NUMERIC(38, 18) NOT NULL,
    status        TEXT NOT NULL CHECK (status IN ('PENDING', 'COMPLETED', 'REJECTED')),
    requested_at  TIMESTAMP NOT NULL,
    completed_at  TIMESTAMP
);
"#;

    pub fn new(max_events: usize) -> Self {
        Self {
            tables: RwLock::new(Tables {
                accounts: BTreeMap::new(),
                positions: BTreeMap::new(),
                fees: Vec::new(),
                withdrawals: BTreeMap::new(),
                journal: Journal::new(max_events),
            }),
            row_locks: RwLock::new(HashMap::new()),
            account_seq: Sequence::new(),
            position_seq: Sequence::new(),
            fee_seq: Sequence::new(),
            withdrawal_seq: Sequence::new(),
        }
    }

    pub fn next_account_id(&self) -> AccountId {
        AccountId(self.account_seq.next())
    }

    /// Insert a brand new account row. Nobody else can reference the id yet,
    /// so no row lock is taken.
    pub async fn insert_account(&self, account: Account, event: EventPayload) {
        let id = account.id;
        let created_at = account.created_at;

        // lock entry first: once the row is visible it must be lockable
        self.row_locks
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(())));

        let mut tables = self.tables.write().await;
        tables.accounts.insert(id, account);
        tables.journal.append(created_at, event);
    }

    /// Take the row lock on `account_id`, waiting at most `timeout`, and
    /// return a transaction over a fresh copy of the row.
    pub async fn begin(&self, account_id: AccountId, timeout: Duration) -> Result<AccountTxn<'_>, StoreError> {
        let lock = self
            .row_locks
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or(StoreError::AccountNotFound(account_id))?;

        let guard = match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!(account = %account_id, timeout_ms = timeout.as_millis() as u64, "row lock timed out");
                return Err(StoreError::Busy(account_id));
            }
        };
        debug!(account = %account_id, "row lock acquired");

        // re-read under the lock; whatever the caller saw before is stale
        let account = self
            .tables
            .read()
            .await
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or(StoreError::AccountNotFound(account_id))?;

        Ok(AccountTxn {
            store: self,
            _guard: guard,
            account,
            account_dirty: false,
            positions: Vec::new(),
            fees: Vec::new(),
            withdrawals: Vec::new(),
            events: Vec::new(),
        })
    }

    pub async fn account(&self, account_id: AccountId) -> Option<Account> {
        self.tables.read().await.accounts.get(&account_id).cloned()
    }

    pub async fn position(&self, position_id: PositionId) -> Option<Position> {
        self.tables.read().await.positions.get(&position_id).cloned()
    }

    pub async fn positions_for_account(&self, account_id: AccountId) -> Vec<Position> {
        self.tables
            .read()
            .await
            .positions
            .values()
            .filter(|p| p.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn fees_for_account(&self, account_id: AccountId) -> Vec<Fee> {
        self.tables
            .read()
            .await
            .fees
            .iter()
            .filter(|f| f.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn withdrawal(&self, withdrawal_id: WithdrawalId) -> Option<Withdrawal> {
        self.tables.read().await.withdrawals.get(&withdrawal_id).cloned()
    }

    pub async fn withdrawals_for_account(&self, account_id: AccountId) -> Vec<Withdrawal> {
        self.tables
            .read()
            .await
            .withdrawals
            .values()
            .filter(|w| w.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.tables.read().await.journal.events().cloned().collect()
    }

    /// Run a read-only computation over one consistent view of every table.
    pub async fn snapshot<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.read().await;
        f(&tables)
    }
}

/// A locked account row plus everything staged against it.
#[derive(Debug)]
pub struct AccountTxn<'a> {
    store: &'a LedgerStore,
    _guard: OwnedMutexGuard<()>,
    account: Account,
    account_dirty: bool,
    positions: Vec<Position>,
    fees: Vec<Fee>,
    withdrawals: Vec<Withdrawal>,
    events: Vec<(Timestamp, EventPayload)>,
}

impl<'a> AccountTxn<'a> {
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_mut(&mut self) -> &mut Account {
        self.account_dirty = true;
        &mut self.account
    }

    pub fn next_position_id(&self) -> PositionId {
        PositionId(self.store.position_seq.next())
    }

    pub fn next_fee_id(&self) -> FeeId {
        FeeId(self.store.fee_seq.next())
    }

    pub fn next_withdrawal_id(&self) -> WithdrawalId {
        WithdrawalId(self.store.withdrawal_seq.next())
    }

    /// Position owned by this account, as of now. Staged writes win.
    pub async fn position(&self, position_id: PositionId) -> Option<Position> {
        if let Some(staged) = self.positions.iter().rev().find(|p| p.id == position_id) {
            return Some(staged.clone());
        }
        self.store
            .position(position_id)
            .await
            .filter(|p| p.account_id == self.account.id)
    }

    /// Effective notional of every position this account still has open,
    /// staged opens and closes included.
    pub async fn open_exposure(&self) -> Quote {
        let mut open: BTreeMap<PositionId, Quote> = self
            .store
            .tables
            .read()
            .await
            .positions
            .values()
            .filter(|p| p.account_id == self.account.id && p.is_open())
            .map(|p| (p.id, p.position_size))
            .collect();
        for staged in &self.positions {
            if staged.is_open() {
                open.insert(staged.id, staged.position_size);
            } else {
                open.remove(&staged.id);
            }
        }
        open.into_values().sum()
    }

    pub async fn withdrawal(&self, withdrawal_id: WithdrawalId) -> Option<Withdrawal> {
        if let Some(staged) = self.withdrawals.iter().rev().find(|w| w.id == withdrawal_id) {
            return Some(staged.clone());
        }
        self.store
            .withdrawal(withdrawal_id)
            .await
            .filter(|w| w.account_id == self.account.id)
    }

    pub fn put_position(&mut self, position: Position) {
        self.positions.push(position);
    }

    pub fn push_fee(&mut self, fee: Fee) {
        self.fees.push(fee);
    }

    pub fn put_withdrawal(&mut self, withdrawal: Withdrawal) {
        self.withdrawals.push(withdrawal);
    }

    pub fn emit(&mut self, timestamp: Timestamp, payload: EventPayload) {
        self.events.push((timestamp, payload));
    }

    /// Apply every staged write in one step, then release the row lock.
    pub async fn commit(self) {
        let store = self.store;
        let mut tables = store.tables.write().await;

        if self.account_dirty {
            tables.accounts.insert(self.account.id, self.account);
        }
        for position in self.positions {
            tables.positions.insert(position.id, position);
        }
        tables.fees.extend(self.fees);
        for withdrawal in self.withdrawals {
            tables.withdrawals.insert(withdrawal.id, withdrawal);
        }
        for (timestamp, payload) in self.events {
            tables.journal.append(timestamp, payload);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Account {0} is busy")]
    Busy(AccountId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::events::AccountCreatedEvent;
    use crate::types::WalletId;
    use rust_decimal_macros::dec;

    async fn store_with_account() -> (LedgerStore, AccountId) {
        let store = LedgerStore::new(100);
        let id = store.next_account_id();
        let account = Account::new(
            id,
            WalletId(1),
            "user",
            Quote::new(dec!(1000)),
            2,
            &LedgerConfig::default(),
            Timestamp::from_millis(0),
        )
        .unwrap();
        let event = EventPayload::AccountCreated(AccountCreatedEvent {
            account_id: id,
            wallet_id: account.wallet_id,
            deposited_capital: account.deposited_capital,
            leverage_tier: account.leverage_tier,
            trading_power: account.trading_power,
        });
        store.insert_account(account, event).await;
        (store, id)
    }

    #[tokio::test]
    async fn commit_applies_staged_writes() {
        let (store, id) = store_with_account().await;

        let mut txn = store.begin(id, Duration::from_millis(100)).await.unwrap();
        txn.account_mut().current_balance = Quote::new(dec!(990));
        txn.commit().await;

        assert_eq!(store.account(id).await.unwrap().current_balance.value(), dec!(990));
    }

    #[tokio::test]
    async fn dropped_txn_rolls_back() {
        let (store, id) = store_with_account().await;

        {
            let mut txn = store.begin(id, Duration::from_millis(100)).await.unwrap();
            txn.account_mut().current_balance = Quote::new(dec!(1));
            let fee_id = txn.next_fee_id();
            txn.push_fee(Fee::withdrawal(fee_id, id, Quote::new(dec!(1)), Timestamp::from_millis(0)));
        }

        assert_eq!(store.account(id).await.unwrap().current_balance.value(), dec!(1000));
        assert!(store.fees_for_account(id).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let store = LedgerStore::new(10);
        let err = store.begin(AccountId(42), Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err, StoreError::AccountNotFound(AccountId(42)));
    }

    #[tokio::test]
    async fn held_row_lock_times_out_as_busy() {
        let (store, id) = store_with_account().await;

        let _held = store.begin(id, Duration::from_millis(100)).await.unwrap();
        let err = store.begin(id, Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err, StoreError::Busy(id));
    }

    #[tokio::test]
    async fn sequences_never_reuse_ids() {
        let (store, id) = store_with_account().await;
        let first = {
            let txn = store.begin(id, Duration::from_millis(100)).await.unwrap();
            txn.next_position_id()
        };
        let txn = store.begin(id, Duration::from_millis(100)).await.unwrap();
        assert!(txn.next_position_id() > first);
    }

    #[test]
    fn schema_names_all_tables() {
        for table in ["accounts", "positions", "fees", "withdrawals"] {
            assert!(LedgerStore::SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)));
        }
    }
}
