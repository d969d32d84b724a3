mod args;
mod settings;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use log::{error, info, warn};
use settings::RunnerSettings;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use trade_lifecycle::{
    with_transaction, ExchangeGateway, ExchangeOrderRecord, LifecycleError, OrderEventRecorder,
    PaperGateway, SnapshotStore, Trade, TradeLifecycleManager, TradeState, UnitOfWork,
};

#[derive(Debug, Clone, Copy)]
enum Action {
    Open,
    Close,
}

/// Runs one lifecycle call on the blocking pool; the gateway and store block.
async fn execute(
    manager: Arc<TradeLifecycleManager>,
    mut trade: Trade,
    action: Action,
) -> Result<(Trade, Result<(), LifecycleError>)> {
    tokio::task::spawn_blocking(move || {
        let outcome = match action {
            Action::Open => manager.open_trade(&mut trade),
            Action::Close => manager.close_trade(&mut trade),
        };
        (trade, outcome)
    })
    .await
    .context("Lifecycle task panicked")
}

/// Logs what the exchange reported for the trade's orders. Returns how many
/// of them have a record.
fn reconcile_orders(store: &Arc<dyn UnitOfWork>, trade: &Trade) -> Result<usize> {
    let cids: HashSet<i64> = trade.client_ids().collect();
    let records = with_transaction(&**store, |tx| {
        tx.query_orders(&|o: &ExchangeOrderRecord| cids.contains(&o.cid))
    })
    .context("Failed to read exchange order records")?;

    for record in &records {
        if record.order_state().is_final() {
            info!("  exchange: {}, filled {}", record, record.filled_amount());
        } else {
            warn!("  exchange: {} is still working", record);
        }
    }
    Ok(records.len())
}

/// A refused order leaves the trade in ERROR, which is an answer, not a crash.
fn check(trade: &Trade, action: Action, outcome: Result<(), LifecycleError>) -> Result<()> {
    match outcome {
        Ok(()) => {
            info!("{:?} done: {}", action, trade);
            Ok(())
        }
        Err(e @ LifecycleError::GatewaySubmission(_)) => {
            warn!("{:?} failed, {} needs reconciliation: {}", action, trade, e);
            Ok(())
        }
        Err(e) => {
            error!("{:?} aborted for {}: {}", action, trade, e);
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings =
        RunnerSettings::load(args.config.as_deref()).context("Failed to load settings")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();
    info!("=== Trade Lifecycle Runner Starting ===");

    // 1. Store
    let store_path = args.store.clone().unwrap_or_else(|| settings.store_path.clone());
    let store: Arc<dyn UnitOfWork> = Arc::new(
        SnapshotStore::open(&store_path)
            .with_context(|| format!("Failed to open store {:?}", store_path))?,
    );

    // 2. Exchange
    let gateway = Arc::new(PaperGateway::new());
    for mark in &settings.mark_prices {
        gateway.set_mark_price(mark.symbol.clone(), mark.price);
    }
    gateway.set_authenticated(settings.authenticated);

    // 3. Order events, recorded independently of trade bookkeeping
    let recorder = Arc::new(OrderEventRecorder::new(store.clone()));
    let recording = recorder.clone().spawn(gateway.subscribe_order_events());

    // 4. Lifecycle
    let manager = Arc::new(TradeLifecycleManager::new(
        gateway.clone(),
        store.clone(),
        settings.lifecycle.clone(),
    ));

    let reconcile = manager.clone();
    let open_trades = tokio::task::spawn_blocking(move || reconcile.get_all_open_trades())
        .await
        .context("Reconciliation task panicked")??;
    info!("{} open trade(s) from previous runs", open_trades.len());
    for trade in &open_trades {
        info!("  {}", trade);
    }

    let trade = Trade::new(args.symbol.clone(), args.amount)?;
    let (mut trade, outcome) = execute(manager.clone(), trade, Action::Open).await?;
    check(&trade, Action::Open, outcome)?;

    if trade.state() == TradeState::Open {
        if args.hold_ms > 0 {
            info!("Holding {} for {} ms", trade, args.hold_ms);
            tokio::time::sleep(Duration::from_millis(args.hold_ms)).await;
        }
        let (closed, outcome) = execute(manager.clone(), trade, Action::Close).await?;
        trade = closed;
        check(&trade, Action::Close, outcome)?;
    }

    // Dropping the last gateway handle closes the bus; the recorder drains and stops.
    drop(manager);
    drop(gateway);
    recording.await.context("Order event recorder panicked")?;

    let records = reconcile_orders(&store, &trade)?;
    info!("{} exchange order record(s) for {}", records, trade);

    info!(
        "=== Done: {} order events recorded, {} failed ===",
        recorder.recorded(),
        recorder.failed()
    );
    Ok(())
}
