// 11.0: every committed state change produces an event. used for audit trails and
// notifying external systems. the EventPayload enum lists all event types.
// events are staged with the transaction and only land in the journal on commit.

use crate::fee::FeeType;
use crate::types::{
    AccountId, LeverageTier, PositionId, Price, Quote, Timestamp, WalletId, WithdrawalId,
};
use crate::withdrawal::WithdrawalStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.payload.account_id()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Account events
    AccountCreated(AccountCreatedEvent),
    AccountLiquidated(AccountLiquidatedEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),

    // Revenue
    FeeCollected(FeeCollectedEvent),

    // Withdrawal events
    WithdrawalRequested(WithdrawalRequestedEvent),
    WithdrawalSettled(WithdrawalSettledEvent),
}

impl EventPayload {
    pub fn account_id(&self) -> AccountId {
        match self {
            EventPayload::AccountCreated(e) => e.account_id,
            EventPayload::AccountLiquidated(e) => e.account_id,
            EventPayload::PositionOpened(e) => e.account_id,
            EventPayload::PositionClosed(e) => e.account_id,
            EventPayload::FeeCollected(e) => e.account_id,
            EventPayload::WithdrawalRequested(e) => e.account_id,
            EventPayload::WithdrawalSettled(e) => e.account_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::AccountCreated(_) => "account_created",
            EventPayload::AccountLiquidated(_) => "account_liquidated",
            EventPayload::PositionOpened(_) => "position_opened",
            EventPayload::PositionClosed(_) => "position_closed",
            EventPayload::FeeCollected(_) => "fee_collected",
            EventPayload::WithdrawalRequested(_) => "withdrawal_requested",
            EventPayload::WithdrawalSettled(_) => "withdrawal_settled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCreatedEvent {
    pub account_id: AccountId,
    pub wallet_id: WalletId,
    pub deposited_capital: Quote,
    pub leverage_tier: LeverageTier,
    pub trading_power: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountLiquidatedEvent {
    pub account_id: AccountId,
    pub current_balance: Quote,
    pub deposited_capital: Quote,
    pub loss_pct: Decimal,
    pub threshold_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub account_id: AccountId,
    pub position_id: PositionId,
    pub asset_symbol: String,
    pub quantity: Decimal,
    pub entry_price: Price,
    pub leverage: Decimal,
    pub position_size: Quote,
    pub fees_paid: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub account_id: AccountId,
    pub position_id: PositionId,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub exit_fee: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeCollectedEvent {
    pub account_id: AccountId,
    pub fee_type: FeeType,
    pub amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequestedEvent {
    pub account_id: AccountId,
    pub withdrawal_id: WithdrawalId,
    pub amount: Quote,
    pub fee: Quote,
    pub net_amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalSettledEvent {
    pub account_id: AccountId,
    pub withdrawal_id: WithdrawalId,
    pub status: WithdrawalStatus,
}

/// Bounded, append-only event log. The oldest entries go first once full.
#[derive(Debug)]
pub struct Journal {
    events: VecDeque<Event>,
    next_id: u64,
    max_events: usize,
}

impl Journal {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_id: 1,
            max_events: max_events.max(1),
        }
    }

    pub fn append(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;

        tracing::debug!(event_id = id.0, kind = payload.kind(), account = %payload.account_id(), "journal append");
        self.events.push_back(Event::new(id, timestamp, payload));

        while self.events.len() > self.max_events {
            self.events.pop_front();
        }
        id
    }

    // oldest first
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().skip(self.events.len().saturating_sub(count))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
