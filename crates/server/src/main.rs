//! Coordinator service for the sealed-bid energy auction.
//!
//! Exposes the round lifecycle (start, bid, reveal, close, reset) and the
//! read-only queries over JSON-RPC. All state-mutating calls serialize
//! through one write lock; queries share a read lock and observe a
//! consistent snapshot. Time enters exclusively through the configured
//! clock source, taken once per call.

use anyhow::{bail, Context, Result};
use clap::Parser;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use energy_auction_coordinator::{
    flush_payouts, handlers, queries, AuctionCall, AuctionError, CallContext, CallOutcome,
    CoordinatorConfig, CoordinatorState, FileStore, FundsTransfer, SnapshotStore, TransferError,
};
use energy_auction_types::{BidderId, SealedCommitment};

mod clock;
mod types;

use clock::{Clock, ManualClock, SystemClock};
use types::*;

/// How often the background task retries undelivered payouts.
const PAYOUT_FLUSH_INTERVAL_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "auction-server")]
#[command(about = "Sealed-bid energy auction coordinator")]
struct Args {
    /// Listen address for the JSON-RPC server.
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Drive time manually via admin_setTimestamp / admin_advanceTime
    /// instead of the system clock.
    #[arg(long)]
    manual_clock: bool,

    /// Starting timestamp for the manual clock.
    #[arg(long, default_value_t = 0)]
    initial_timestamp: u64,

    /// Snapshot file for durable state. Omit to keep state in memory.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Default bidding window, in seconds, when a start call omits one.
    #[arg(long, default_value_t = 300)]
    default_bidding_duration: u64,

    /// Default reveal window, in seconds, when a start call omits one.
    #[arg(long, default_value_t = 180)]
    default_reveal_duration: u64,
}

/// RPC API definition for the coordinator.
#[rpc(server)]
pub trait AuctionApi {
    // ============ Auction Methods ============

    /// Start a new round.
    #[method(name = "auction_start")]
    async fn auction_start(&self, params: StartRoundParams) -> Result<u64, ErrorObjectOwned>;

    /// Submit a sealed bid with a deposit.
    #[method(name = "auction_submitBid")]
    async fn auction_submit_bid(&self, params: SubmitBidParams)
        -> Result<bool, ErrorObjectOwned>;

    /// Reveal a previously sealed bid.
    #[method(name = "auction_submitReveal")]
    async fn auction_submit_reveal(
        &self,
        params: SubmitRevealParams,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Settle the round.
    #[method(name = "auction_close")]
    async fn auction_close(
        &self,
        params: CloseAuctionParams,
    ) -> Result<SettlementResultRpc, ErrorObjectOwned>;

    /// Re-arm the clock for the next round.
    #[method(name = "auction_reset")]
    async fn auction_reset(&self, params: ResetRoundParams) -> Result<u64, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// Status of a round (current round when `round_id` is omitted).
    #[method(name = "query_getStatus")]
    async fn query_get_status(
        &self,
        round_id: Option<u64>,
    ) -> Result<RoundStatusRpc, ErrorObjectOwned>;

    /// Settlement result, if the round has closed.
    #[method(name = "query_getResult")]
    async fn query_get_result(
        &self,
        round_id: u64,
    ) -> Result<Option<SettlementResultRpc>, ErrorObjectOwned>;

    /// Bidders in the current round, in recording order.
    #[method(name = "query_listBidders")]
    async fn query_list_bidders(&self) -> Result<Vec<String>, ErrorObjectOwned>;

    /// A bidder's bid in the current round.
    #[method(name = "query_getBid")]
    async fn query_get_bid(&self, bidder: String) -> Result<Option<BidRpc>, ErrorObjectOwned>;

    /// A bidder's escrow balance.
    #[method(name = "query_getEscrow")]
    async fn query_get_escrow(&self, bidder: String) -> Result<u64, ErrorObjectOwned>;

    /// Payouts owed but not yet delivered.
    #[method(name = "query_pendingPayouts")]
    async fn query_pending_payouts(&self) -> Result<Vec<PendingPayoutRpc>, ErrorObjectOwned>;

    // ============ Admin Methods ============

    /// Set the clock (manual clock only).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    /// Advance the clock (manual clock only); returns the new time.
    #[method(name = "admin_advanceTime")]
    async fn admin_advance_time(&self, seconds: u64) -> Result<u64, ErrorObjectOwned>;

    /// Attempt delivery of all due payouts now.
    #[method(name = "admin_flushPayouts")]
    async fn admin_flush_payouts(&self) -> Result<FlushSummaryRpc, ErrorObjectOwned>;
}

/// Stand-in settlement rail: acknowledges every transfer and records it
/// in the log. Deployments wire their own [`FundsTransfer`] here.
struct LoggingTransfer;

impl FundsTransfer for LoggingTransfer {
    fn transfer(&self, recipient: &BidderId, amount: u64) -> Result<(), TransferError> {
        info!(%recipient, amount, "transfer executed");
        Ok(())
    }
}

/// Implementation of the coordinator RPC server.
struct AuctionServer {
    state: Arc<RwLock<CoordinatorState>>,
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    manual: Option<Arc<ManualClock>>,
    store: Option<Arc<dyn SnapshotStore>>,
    transfer: Arc<dyn FundsTransfer>,
}

impl AuctionServer {
    fn ctx(&self, sender: &str) -> CallContext {
        CallContext {
            sender: BidderId::from(sender),
            timestamp: self.clock.now_unix(),
        }
    }

    fn rpc_error(err: &AuctionError) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, err.to_string(), None::<()>)
    }

    fn bad_param(msg: impl Into<String>) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32602, msg.into(), None::<()>)
    }

    /// Persist after a successful mutation. Failure here does not undo the
    /// mutation; it is surfaced loudly for the operator.
    fn persist(&self, state: &CoordinatorState) {
        if let Some(store) = &self.store {
            if let Err(err) = store.persist(state) {
                error!("snapshot persist failed: {err}");
            }
        }
    }

    fn dispatch(&self, sender: &str, call: AuctionCall) -> Result<CallOutcome, ErrorObjectOwned> {
        let ctx = self.ctx(sender);
        let mut state = self.state.write();
        let outcome = handlers::handle_call(&mut state, &ctx, &self.config, call)
            .map_err(|err| Self::rpc_error(&err))?;
        self.persist(&state);
        Ok(outcome)
    }
}

#[async_trait]
impl AuctionApiServer for AuctionServer {
    async fn auction_start(&self, params: StartRoundParams) -> Result<u64, ErrorObjectOwned> {
        let outcome = self.dispatch(
            &params.sender,
            AuctionCall::StartRound {
                energy_kwh: params.energy_kwh,
                bidding_duration: params
                    .bidding_duration_secs
                    .unwrap_or(self.config.default_bidding_duration),
                reveal_duration: params
                    .reveal_duration_secs
                    .unwrap_or(self.config.default_reveal_duration),
                reserve_price: params.reserve_price,
            },
        )?;

        match outcome {
            CallOutcome::RoundStarted(round_id) => Ok(round_id),
            _ => unreachable!("start round returns RoundStarted"),
        }
    }

    async fn auction_submit_bid(
        &self,
        params: SubmitBidParams,
    ) -> Result<bool, ErrorObjectOwned> {
        let commitment = SealedCommitment::from_hex(&params.commitment)
            .map_err(|e| Self::bad_param(format!("invalid commitment: {e}")))?;

        self.dispatch(
            &params.sender,
            AuctionCall::SubmitBid {
                round_id: params.round_id,
                commitment,
                deposit: params.deposit,
            },
        )?;

        Ok(true)
    }

    async fn auction_submit_reveal(
        &self,
        params: SubmitRevealParams,
    ) -> Result<bool, ErrorObjectOwned> {
        self.dispatch(
            &params.sender,
            AuctionCall::SubmitReveal {
                round_id: params.round_id,
                value: params.value,
                nonce: params.nonce,
            },
        )?;

        Ok(true)
    }

    async fn auction_close(
        &self,
        params: CloseAuctionParams,
    ) -> Result<SettlementResultRpc, ErrorObjectOwned> {
        let ctx = self.ctx(&params.sender);
        let mut state = self.state.write();

        let result = handlers::handle_close_auction(&mut state, &ctx, params.round_id)
            .map_err(|err| Self::rpc_error(&err))?;

        // Deliver what can be delivered right away; stragglers are picked
        // up by the background flush.
        flush_payouts(&mut state, self.transfer.as_ref(), ctx.timestamp, &self.config);
        self.persist(&state);

        Ok(result.into())
    }

    async fn auction_reset(&self, params: ResetRoundParams) -> Result<u64, ErrorObjectOwned> {
        let outcome = self.dispatch(
            &params.sender,
            AuctionCall::ResetRound {
                bidding_duration: params
                    .bidding_duration_secs
                    .unwrap_or(self.config.default_bidding_duration),
                reveal_duration: params
                    .reveal_duration_secs
                    .unwrap_or(self.config.default_reveal_duration),
            },
        )?;

        match outcome {
            CallOutcome::RoundReset(round_id) => Ok(round_id),
            _ => unreachable!("reset returns RoundReset"),
        }
    }

    async fn query_get_status(
        &self,
        round_id: Option<u64>,
    ) -> Result<RoundStatusRpc, ErrorObjectOwned> {
        let now = self.clock.now_unix();
        let state = self.state.read();
        Ok(queries::round_status(&state, round_id, now).into())
    }

    async fn query_get_result(
        &self,
        round_id: u64,
    ) -> Result<Option<SettlementResultRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state
            .results
            .get(&round_id)
            .cloned()
            .map(SettlementResultRpc::from))
    }

    async fn query_list_bidders(&self) -> Result<Vec<String>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state
            .bidder_order
            .iter()
            .map(|bidder| bidder.to_string())
            .collect())
    }

    async fn query_get_bid(&self, bidder: String) -> Result<Option<BidRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.bids.get(&BidderId::new(bidder)).map(BidRpc::from))
    }

    async fn query_get_escrow(&self, bidder: String) -> Result<u64, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.get_escrow(&BidderId::new(bidder)))
    }

    async fn query_pending_payouts(&self) -> Result<Vec<PendingPayoutRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state
            .pending_payouts
            .iter()
            .map(PendingPayoutRpc::from)
            .collect())
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let Some(manual) = &self.manual else {
            return Err(Self::bad_param("manual clock disabled on this server"));
        };
        manual.set(timestamp);
        info!(timestamp, "clock set");
        Ok(true)
    }

    async fn admin_advance_time(&self, seconds: u64) -> Result<u64, ErrorObjectOwned> {
        let Some(manual) = &self.manual else {
            return Err(Self::bad_param("manual clock disabled on this server"));
        };
        let now = manual.advance(seconds);
        info!(now, "clock advanced");
        Ok(now)
    }

    async fn admin_flush_payouts(&self) -> Result<FlushSummaryRpc, ErrorObjectOwned> {
        let now = self.clock.now_unix();
        let mut state = self.state.write();
        let summary = flush_payouts(&mut state, self.transfer.as_ref(), now, &self.config);
        self.persist(&state);
        Ok(FlushSummaryRpc {
            delivered: summary.delivered,
            rescheduled: summary.rescheduled,
            abandoned: summary.abandoned,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_server=info".parse().unwrap())
                .add_directive("energy_auction_coordinator=info".parse().unwrap())
                .add_directive("jsonrpsee=warn".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let config = CoordinatorConfig {
        default_bidding_duration: args.default_bidding_duration,
        default_reveal_duration: args.default_reveal_duration,
        snapshot_path: args.snapshot.clone(),
        ..Default::default()
    };
    config.validate().context("invalid configuration")?;

    let store: Option<Arc<dyn SnapshotStore>> = config
        .snapshot_path
        .as_ref()
        .map(|path| Arc::new(FileStore::new(path)) as Arc<dyn SnapshotStore>);

    // Refuse to start over an unreadable snapshot; resuming from guessed
    // state would strand deposits or allow double reveals.
    let initial_state = match &store {
        Some(store) => match store.load() {
            Ok(Some(state)) => {
                info!(
                    current_round = ?state.current,
                    pending_payouts = state.pending_payouts.len(),
                    "state restored from snapshot"
                );
                state
            }
            Ok(None) => CoordinatorState::new(),
            Err(err) => bail!("cannot load snapshot: {err}"),
        },
        None => CoordinatorState::new(),
    };

    let manual = args
        .manual_clock
        .then(|| Arc::new(ManualClock::new(args.initial_timestamp)));
    let clock: Arc<dyn Clock> = match &manual {
        Some(manual) => manual.clone(),
        None => Arc::new(SystemClock),
    };

    let state = Arc::new(RwLock::new(initial_state));
    let server = AuctionServer {
        state: state.clone(),
        config: config.clone(),
        clock: clock.clone(),
        manual,
        store: store.clone(),
        transfer: Arc::new(LoggingTransfer),
    };

    // Background retry loop for payouts that failed delivery.
    {
        let state = state.clone();
        let config = config.clone();
        let clock = clock.clone();
        let store = store.clone();
        let transfer: Arc<dyn FundsTransfer> = Arc::new(LoggingTransfer);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(PAYOUT_FLUSH_INTERVAL_SECS));
            loop {
                interval.tick().await;
                let now = clock.now_unix();
                let mut state = state.write();
                let summary = flush_payouts(&mut state, transfer.as_ref(), now, &config);
                if summary.delivered + summary.rescheduled + summary.abandoned > 0 {
                    if let Some(store) = &store {
                        if let Err(err) = store.persist(&state) {
                            error!("snapshot persist failed: {err}");
                        }
                    }
                }
            }
        });
    }

    info!("starting auction coordinator on {}", args.listen);

    let rpc_server = Server::builder().build(args.listen).await?;
    let handle = rpc_server.start(server.into_rpc());

    info!("coordinator running; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
