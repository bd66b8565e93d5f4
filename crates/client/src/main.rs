//! CLI for interacting with the sealed-bid energy auction coordinator.
//!
//! This binary provides commands for:
//! - Starting and resetting rounds
//! - Sealing and submitting bids
//! - Revealing bids
//! - Querying status, results, and escrow
//! - Waiting for a phase to open

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use energy_auction_client::{wait_for_phase, BidBuilder, StatusSnapshot, WaitOutcome};
use energy_auction_types::Phase;

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for the sealed-bid energy auction")]
struct Cli {
    /// Coordinator RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new round
    Start {
        /// Seller identity
        #[arg(long)]
        sender: String,

        /// Energy on offer, in kWh
        #[arg(long)]
        energy_kwh: u64,

        /// Bidding window in seconds (server default when omitted)
        #[arg(long)]
        bidding_duration: Option<u64>,

        /// Reveal window in seconds (server default when omitted)
        #[arg(long)]
        reveal_duration: Option<u64>,

        /// Minimum clearing price (optional)
        #[arg(long)]
        reserve_price: Option<u64>,
    },

    /// Seal and submit a bid
    Bid {
        /// Bidder identity
        #[arg(long)]
        sender: String,

        /// Round ID
        #[arg(long)]
        round_id: u64,

        /// Bid amount (sealed; not sent in the clear)
        #[arg(long)]
        value: u64,

        /// Deposit (defaults to the bid value)
        #[arg(long)]
        deposit: Option<u64>,

        /// Sealing nonce (generated when omitted)
        #[arg(long)]
        nonce: Option<String>,
    },

    /// Compute a sealed commitment offline
    Seal {
        #[arg(long)]
        value: u64,

        #[arg(long)]
        nonce: String,
    },

    /// Reveal a previously sealed bid
    Reveal {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        round_id: u64,

        #[arg(long)]
        value: u64,

        #[arg(long)]
        nonce: String,
    },

    /// Get round status
    Status {
        /// Round ID (current round when omitted)
        #[arg(long)]
        round_id: Option<u64>,
    },

    /// Get a round's settlement result
    Result {
        #[arg(long)]
        round_id: u64,
    },

    /// List bidders in the current round
    Bidders,

    /// Get a bidder's bid in the current round
    GetBid {
        #[arg(long)]
        bidder: String,
    },

    /// Get a bidder's escrow balance
    Escrow {
        #[arg(long)]
        bidder: String,
    },

    /// Close the round and settle
    Close {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        round_id: u64,
    },

    /// Re-arm the clock for the next round
    Reset {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        bidding_duration: Option<u64>,

        #[arg(long)]
        reveal_duration: Option<u64>,
    },

    /// Wait until a phase opens
    Wait {
        /// Target phase: bidding, reveal, awaiting_close, closed
        #[arg(long)]
        phase: String,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },

    /// List undelivered payouts
    PendingPayouts,

    /// Set coordinator time (manual clock servers only)
    SetTimestamp {
        #[arg(long)]
        timestamp: u64,
    },

    /// Advance coordinator time (manual clock servers only)
    AdvanceTime {
        #[arg(long)]
        seconds: u64,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct RoundStatusRpc {
    round_id: Option<u64>,
    phase: String,
    energy_kwh: u64,
    reserve_price: u64,
    bidding_start: u64,
    bidding_end: u64,
    reveal_end: u64,
    closed: bool,
    num_bids: usize,
    num_revealed: usize,
    now: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PayoutRpc {
    recipient: String,
    amount: u64,
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettlementResultRpc {
    round_id: u64,
    winner: Option<String>,
    clearing_price: u64,
    energy_kwh: u64,
    num_revealed: u32,
    settled_at: u64,
    payouts: Vec<PayoutRpc>,
    forfeited: Vec<(String, u64)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BidRpc {
    bidder: String,
    commitment: String,
    deposit: u64,
    submitted_at: u64,
    revealed: bool,
    revealed_value: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PendingPayoutRpc {
    round_id: u64,
    recipient: String,
    amount: u64,
    kind: String,
    attempts: u32,
    not_before: u64,
    status: String,
}

async fn fetch_status(client: &HttpClient, round_id: Option<u64>) -> Result<RoundStatusRpc> {
    let status: RoundStatusRpc = client
        .request("query_getStatus", vec![serde_json::json!(round_id)])
        .await?;
    Ok(status)
}

fn print_status(s: &RoundStatusRpc) {
    match s.round_id {
        Some(round_id) => {
            println!("Round {}:", round_id);
            println!("  Phase: {}", s.phase);
            println!("  Energy: {} kWh", s.energy_kwh);
            if s.reserve_price > 0 {
                println!("  Reserve: {}", s.reserve_price);
            }
            println!("  Bidding: {} -> {}", s.bidding_start, s.bidding_end);
            println!("  Reveal ends: {}", s.reveal_end);
            println!("  Closed: {}", s.closed);
            println!("  Bids: {} ({} revealed)", s.num_bids, s.num_revealed);
            println!("  Server time: {}", s.now);
        }
        None => println!("No round started"),
    }
}

async fn bid_cmd(
    client: &HttpClient,
    sender: &str,
    round_id: u64,
    value: u64,
    deposit: Option<u64>,
    nonce: Option<String>,
) -> Result<()> {
    let mut builder = BidBuilder::new(value);
    if let Some(deposit) = deposit {
        builder = builder.deposit(deposit);
    }
    if let Some(nonce) = nonce {
        builder = builder.nonce(nonce);
    }
    let prepared = builder.build(&mut OsRng)?;

    let params = serde_json::json!({
        "sender": sender,
        "round_id": round_id,
        "commitment": prepared.commitment.to_hex(),
        "deposit": prepared.deposit,
    });
    let _accepted: bool = client.request("auction_submitBid", vec![params]).await?;

    println!("Bid submitted");
    println!("  Round ID: {}", round_id);
    println!("  Commitment: {}", prepared.commitment);
    println!("  Deposit: {}", prepared.deposit);
    println!();
    println!("Keep these secret until the reveal window opens:");
    println!("  Value: {}", prepared.value);
    println!("  Nonce: {}", prepared.nonce);

    Ok(())
}

fn print_result(r: &SettlementResultRpc) {
    println!("Result for round {}:", r.round_id);
    println!("  Winner: {}", r.winner.as_deref().unwrap_or("none"));
    println!("  Clearing price: {}", r.clearing_price);
    println!("  Energy: {} kWh", r.energy_kwh);
    println!("  Revealed bids: {}", r.num_revealed);
    println!("  Settled at: {}", r.settled_at);
    for p in &r.payouts {
        println!("  Payout: {} -> {} ({})", p.amount, p.recipient, p.kind);
    }
    for (bidder, amount) in &r.forfeited {
        println!("  Forfeited: {} from {}", amount, bidder);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let client = HttpClientBuilder::default().build(&cli.rpc)?;

    match cli.command {
        Commands::Start {
            sender,
            energy_kwh,
            bidding_duration,
            reveal_duration,
            reserve_price,
        } => {
            let params = serde_json::json!({
                "sender": sender,
                "energy_kwh": energy_kwh,
                "bidding_duration_secs": bidding_duration,
                "reveal_duration_secs": reveal_duration,
                "reserve_price": reserve_price,
            });
            let round_id: u64 = client.request("auction_start", vec![params]).await?;
            println!("Round ID: {}", round_id);
        }

        Commands::Bid {
            sender,
            round_id,
            value,
            deposit,
            nonce,
        } => {
            bid_cmd(&client, &sender, round_id, value, deposit, nonce).await?;
        }

        Commands::Seal { value, nonce } => {
            let commitment = energy_auction_types::seal_bid(value, &nonce);
            println!("{}", commitment);
        }

        Commands::Reveal {
            sender,
            round_id,
            value,
            nonce,
        } => {
            let params = serde_json::json!({
                "sender": sender,
                "round_id": round_id,
                "value": value,
                "nonce": nonce,
            });
            let _accepted: bool = client.request("auction_submitReveal", vec![params]).await?;
            println!("Bid revealed for round {}", round_id);
        }

        Commands::Status { round_id } => {
            let status = fetch_status(&client, round_id).await?;
            print_status(&status);
        }

        Commands::Result { round_id } => {
            let result: Option<SettlementResultRpc> =
                client.request("query_getResult", vec![round_id]).await?;
            match result {
                Some(r) => print_result(&r),
                None => println!("Round {} not settled yet", round_id),
            }
        }

        Commands::Bidders => {
            let bidders: Vec<String> =
                client.request("query_listBidders", Vec::<()>::new()).await?;
            if bidders.is_empty() {
                println!("No bidders");
            } else {
                for (i, bidder) in bidders.iter().enumerate() {
                    println!("  [{}] {}", i, bidder);
                }
            }
        }

        Commands::GetBid { bidder } => {
            let bid: Option<BidRpc> = client.request("query_getBid", vec![bidder]).await?;
            match bid {
                Some(b) => {
                    println!("Bidder: {}", b.bidder);
                    println!("  Commitment: {}", b.commitment);
                    println!("  Deposit: {}", b.deposit);
                    println!("  Submitted at: {}", b.submitted_at);
                    match b.revealed_value {
                        Some(value) => println!("  Revealed: {}", value),
                        None => println!("  Revealed: no"),
                    }
                }
                None => println!("No bid found"),
            }
        }

        Commands::Escrow { bidder } => {
            let balance: u64 = client.request("query_getEscrow", vec![bidder]).await?;
            println!("Escrow: {}", balance);
        }

        Commands::Close { sender, round_id } => {
            let params = serde_json::json!({
                "sender": sender,
                "round_id": round_id,
            });
            let result: SettlementResultRpc =
                client.request("auction_close", vec![params]).await?;
            print_result(&result);
        }

        Commands::Reset {
            sender,
            bidding_duration,
            reveal_duration,
        } => {
            let params = serde_json::json!({
                "sender": sender,
                "bidding_duration_secs": bidding_duration,
                "reveal_duration_secs": reveal_duration,
            });
            let round_id: u64 = client.request("auction_reset", vec![params]).await?;
            println!("Round ID: {}", round_id);
        }

        Commands::Wait {
            phase,
            timeout_secs,
        } => {
            let target: Phase = phase
                .parse()
                .map_err(|e: String| anyhow!(e))?;

            let client_ref = &client;
            let outcome = wait_for_phase(
                move || {
                    let client = client_ref;
                    async move {
                        let status = fetch_status(client, None).await?;
                        let phase: Phase = status
                            .phase
                            .parse()
                            .map_err(|e: String| anyhow!(e))?;
                        Ok(StatusSnapshot {
                            phase,
                            bidding_start: status.bidding_start,
                            bidding_end: status.bidding_end,
                            reveal_end: status.reveal_end,
                            now: status.now,
                        })
                    }
                },
                target,
                Duration::from_secs(timeout_secs),
            )
            .await?;

            match outcome {
                WaitOutcome::Reached => println!("Phase {} reached", target),
                WaitOutcome::AlreadyPassed => println!("Phase {} already passed", target),
                WaitOutcome::TimedOut => println!("Timed out waiting for {}", target),
            }
        }

        Commands::PendingPayouts => {
            let payouts: Vec<PendingPayoutRpc> = client
                .request("query_pendingPayouts", Vec::<()>::new())
                .await?;
            if payouts.is_empty() {
                println!("No pending payouts");
            } else {
                for p in payouts {
                    println!(
                        "  round {} -> {}: {} ({}, {} attempts, {})",
                        p.round_id, p.recipient, p.amount, p.kind, p.attempts, p.status
                    );
                }
            }
        }

        Commands::SetTimestamp { timestamp } => {
            let _: bool = client.request("admin_setTimestamp", vec![timestamp]).await?;
            println!("Timestamp set to {}", timestamp);
        }

        Commands::AdvanceTime { seconds } => {
            let now: u64 = client.request("admin_advanceTime", vec![seconds]).await?;
            println!("Time advanced to {}", now);
        }
    }

    Ok(())
}
