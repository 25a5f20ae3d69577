//! Leveraged Ledger Simulation.
//!
//! Walks the ledger through account funding, opening and closing positions,
//! profit withdrawals, liquidation and concurrent access to one account.

use leverage_ledger::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = match LedgerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    println!("Leveraged Ledger Simulation");
    println!("Fixed-point balances, per-account transactions\n");

    scenario_1_account_creation(&config).await;
    scenario_2_position_lifecycle(&config).await;
    scenario_3_withdrawals(&config).await;
    scenario_4_liquidation(&config).await;
    scenario_5_concurrent_opens(&config).await;
    scenario_6_many_accounts(&config).await;

    println!("\nAll simulations completed successfully.");
}

fn engine_at_epoch(config: &LedgerConfig) -> (Arc<LeverageEngine>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
    let engine = LeverageEngine::with_clock(config.clone(), clock.clone()).unwrap();
    (Arc::new(engine), clock)
}

/// Trading power per tier.
async fn scenario_1_account_creation(config: &LedgerConfig) {
    println!("Scenario 1: Account Creation\n");

    let (engine, _) = engine_at_epoch(config);
    for tier in LeverageTier::ALL {
        let account = engine
            .create_account(WalletId(1), "alice", Quote::new(dec!(1000)), tier.multiplier())
            .await
            .unwrap();
        println!("  $1,000 at {}: trading power ${}", tier, account.trading_power);
    }

    let err = engine
        .create_account(WalletId(1), "alice", Quote::new(dec!(1000)), 4)
        .await
        .unwrap_err();
    println!("  $1,000 at 4x: {}\n", err);
}

/// Open at the trading power ceiling, then close at +10%.
async fn scenario_2_position_lifecycle(config: &LedgerConfig) {
    println!("Scenario 2: Position Lifecycle\n");

    let (engine, _) = engine_at_epoch(config);
    let account = engine
        .create_account(WalletId(1), "bob", Quote::new(dec!(1000)), 2)
        .await
        .unwrap();

    let opened = engine
        .open_position(account.id, "SOL", dec!(10), dec!(100), dec!(2))
        .await
        .unwrap();
    println!("  Open 10 SOL @ $100, 2x: notional ${}", opened.position.position_size);
    println!(
        "  Fees: trading ${}, leverage ${}, balance ${}",
        opened.trading_fee, opened.leverage_fee, opened.new_balance
    );

    let rejected = engine
        .open_position(account.id, "SOL", dec!(1), dec!(100), dec!(1))
        .await
        .unwrap_err();
    println!("  Another 1 SOL: {}", rejected);

    let closed = engine.close_position(opened.position.id, dec!(110)).await.unwrap();
    println!(
        "  Close @ $110: leveraged PnL ${}, exit fee ${}, realized ${}",
        closed.leveraged_pnl, closed.exit_fee, closed.realized_pnl
    );
    println!("  Position {}, balance: ${}\n", closed.position.status, closed.new_balance);
}

/// Monthly allowance, pro-ration inside the window, settlement.
async fn scenario_3_withdrawals(config: &LedgerConfig) {
    println!("Scenario 3: Profit Withdrawals\n");

    let (engine, clock) = engine_at_epoch(config);
    let account = engine
        .create_account(WalletId(1), "carol", Quote::new(dec!(1000)), 2)
        .await
        .unwrap();
    let opened = engine
        .open_position(account.id, "SOL", dec!(10), dec!(100), dec!(2))
        .await
        .unwrap();
    engine.close_position(opened.position.id, dec!(110)).await.unwrap();

    let quote = engine.quote_withdrawal(account.id).await.unwrap();
    println!("  Net profit ${}, available ${}", quote.net_profit, quote.available);

    let err = engine
        .request_withdrawal(account.id, Quote::new(dec!(50)))
        .await
        .unwrap_err();
    println!("  Request $50: {}", err);

    let withdrawal = engine
        .request_withdrawal(account.id, Quote::new(dec!(30)))
        .await
        .unwrap();
    println!(
        "  Request $30: fee ${}, net ${}, status {:?}",
        withdrawal.fee, withdrawal.net_amount, withdrawal.status
    );

    let settled = engine
        .settle_withdrawal(withdrawal.id, SettlementOutcome::Completed)
        .await
        .unwrap();
    println!("  Settled: {:?}", settled.status);

    // pro-rated by whole days since the last withdrawal
    for step in [0, 10, 20] {
        clock.advance_days(step);
        let quote = engine.quote_withdrawal(account.id).await.unwrap();
        println!(
            "  +{} days: available ${}",
            step,
            quote.available_floor(config.money_scale)
        );
    }
    println!();
}

/// A losing close pushes the account past -50%.
async fn scenario_4_liquidation(config: &LedgerConfig) {
    println!("Scenario 4: Liquidation\n");

    let (engine, _) = engine_at_epoch(config);
    let account = engine
        .create_account(WalletId(1), "dave", Quote::new(dec!(1000)), 5)
        .await
        .unwrap();
    let opened = engine
        .open_position(account.id, "BTC", dec!(50), dec!(100), dec!(1))
        .await
        .unwrap();

    let status = engine.liquidation_status(account.id).await.unwrap();
    println!("  After open: {:?}", status);

    let closed = engine.close_position(opened.position.id, dec!(88)).await.unwrap();
    println!("  Close @ $88: realized ${}, balance ${}", closed.realized_pnl, closed.new_balance);
    println!("  Liquidated: {}", closed.liquidated);

    let err = engine
        .open_position(account.id, "BTC", dec!(1), dec!(100), dec!(1))
        .await
        .unwrap_err();
    println!("  Open after liquidation: {}\n", err);
}

/// Two opens that only fit one at a time race on the same account.
async fn scenario_5_concurrent_opens(config: &LedgerConfig) {
    println!("Scenario 5: Concurrent Opens\n");

    let (engine, _) = engine_at_epoch(config);
    let account = engine
        .create_account(WalletId(1), "erin", Quote::new(dec!(1000)), 2)
        .await
        .unwrap();

    let account_id = account.id;
    let mut handles = Vec::new();
    for symbol in ["SOL", "ETH"] {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.open_position(account_id, symbol, dec!(15), dec!(100), dec!(1)).await
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Ok(opened) => println!("  {} opened, balance ${}", opened.position.asset_symbol, opened.new_balance),
            Err(err) => println!("  rejected: {}", err),
        }
    }

    let account = engine.get_account(account_id).await.unwrap();
    println!("  Final balance ${}\n", account.current_balance);
}

/// Many accounts trading in parallel, then platform totals.
async fn scenario_6_many_accounts(config: &LedgerConfig) {
    println!("Scenario 6: Platform Stats\n");

    let (engine, _) = engine_at_epoch(config);
    let num_traders = 20u64;

    let mut handles = Vec::new();
    for i in 0..num_traders {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let deposit = dec!(1000) + Decimal::from(i) * dec!(250);
            let tier = LeverageTier::ALL[(i % 3) as usize].multiplier();
            let account = engine
                .create_account(WalletId(i), &format!("trader-{}", i), Quote::new(deposit), tier)
                .await?;

            let opened = engine
                .open_position(account.id, "SOL", dec!(5), dec!(100), dec!(2))
                .await?;
            if i % 2 == 0 {
                let exit = dec!(100) + Decimal::from(i % 7) - dec!(3);
                engine.close_position(opened.position.id, exit).await?;
            }
            Ok::<_, LedgerError>(())
        }));
    }
    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            println!("  trader failed: {}", err);
        }
    }

    let stats = engine.get_platform_stats().await;
    println!("  Accounts: {}, liquidated: {}", stats.total_accounts, stats.liquidated_accounts);
    println!("  Deposited ${}, trading power ${}", stats.total_deposited, stats.total_trading_power);
    println!("  Effective leverage: {:.4}x", stats.effective_leverage);
    println!("  Positions: {} open, {} closed", stats.active_positions, stats.closed_positions);
    for (fee_type, amount) in &stats.fees_by_type {
        println!("  {} fees: ${}", fee_type, amount);
    }
    println!("  Total fees: ${}", stats.total_fees_collected);
    println!("  Events generated: {}", engine.events().await.len());
}
