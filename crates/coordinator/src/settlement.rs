//! Winner determination and payout computation.
//!
//! Vickrey rule: the highest revealed value wins and pays the
//! second-highest. A lone revealer pays the round's reserve price.
//! Ties go to the bid recorded first.

use energy_auction_types::{
    AuctionRound, Bid, BidderId, Payout, PayoutKind, SettlementResult, Timestamp,
};

use crate::error::AuctionError;

/// Winner and clearing price for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Winning bidder and their revealed value, if any bid cleared the
    /// reserve.
    pub winner: Option<(BidderId, u64)>,
    pub clearing_price: u64,
    /// Bids that revealed at or above the reserve.
    pub num_valid: u32,
}

/// Determine the winner and clearing price from bids in recording order.
///
/// The scan replaces the running winner only on a strictly greater value,
/// so among tied maxima the first-recorded bid wins. Reveals below the
/// reserve are disclosed but cannot win or set the price.
pub fn determine_outcome(bids: &[&Bid], reserve: u64) -> Outcome {
    let mut winner: Option<(&Bid, u64)> = None;
    let mut second = 0u64;
    let mut num_valid = 0u32;

    for &bid in bids {
        let Some(value) = bid.revealed_value else {
            continue;
        };
        if value < reserve {
            continue;
        }
        num_valid += 1;

        match winner {
            None => winner = Some((bid, value)),
            Some((_, best)) => {
                if value > best {
                    second = best;
                    winner = Some((bid, value));
                } else if value > second {
                    second = value;
                }
            }
        }
    }

    let clearing_price = match num_valid {
        0 => 0,
        1 => reserve,
        _ => second,
    };

    Outcome {
        winner: winner.map(|(bid, value)| (bid.bidder.clone(), value)),
        clearing_price,
        num_valid,
    }
}

/// Compute the full settlement for a round.
///
/// Pure with respect to coordinator state: the caller applies the result
/// (escrow debits, payout queue, `closed` flag) only after this returns
/// `Ok`, so a failed settlement changes nothing.
///
/// Refunds: the winner gets `deposit - clearing_price` back; every other
/// bidder who revealed gets their full deposit back. Bidders who sealed
/// but never revealed forfeit their deposit to the seller, unless no one
/// won, in which case every deposit is returned in full.
pub fn settle(
    round: &AuctionRound,
    bids: &[&Bid],
    now: Timestamp,
) -> Result<SettlementResult, AuctionError> {
    let outcome = determine_outcome(bids, round.reserve_price);

    let mut payouts = Vec::new();
    let mut forfeited = Vec::new();
    let mut seller_proceeds = 0u64;
    let mut num_revealed = 0u32;

    let winner_id = outcome.winner.as_ref().map(|(bidder, _)| bidder);

    for &bid in bids {
        if bid.revealed() {
            num_revealed += 1;
        }

        if Some(&bid.bidder) == winner_id {
            let refund = bid
                .deposit
                .checked_sub(outcome.clearing_price)
                .ok_or(AuctionError::InsufficientDeposit {
                    required: outcome.clearing_price,
                    got: bid.deposit,
                })?;
            seller_proceeds += outcome.clearing_price;
            if refund > 0 {
                payouts.push(Payout {
                    recipient: bid.bidder.clone(),
                    amount: refund,
                    kind: PayoutKind::WinnerRefund,
                });
            }
        } else if bid.revealed() || winner_id.is_none() {
            payouts.push(Payout {
                recipient: bid.bidder.clone(),
                amount: bid.deposit,
                kind: PayoutKind::LoserRefund,
            });
        } else {
            forfeited.push((bid.bidder.clone(), bid.deposit));
            seller_proceeds += bid.deposit;
        }
    }

    if seller_proceeds > 0 {
        payouts.push(Payout {
            recipient: round.seller.clone(),
            amount: seller_proceeds,
            kind: PayoutKind::SellerProceeds,
        });
    }

    Ok(SettlementResult {
        round_id: round.round_id,
        winner: outcome.winner.map(|(bidder, _)| bidder),
        clearing_price: outcome.clearing_price,
        energy_kwh: round.energy_kwh,
        num_revealed,
        settled_at: now,
        payouts,
        forfeited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_auction_types::seal_bid;

    fn bid(name: &str, deposit: u64, revealed: Option<u64>) -> Bid {
        Bid {
            bidder: BidderId::from(name),
            commitment: seal_bid(revealed.unwrap_or(0), name),
            deposit,
            submitted_at: 0,
            revealed_value: revealed,
        }
    }

    fn round(reserve: u64) -> AuctionRound {
        AuctionRound {
            round_id: 1,
            seller: BidderId::from("seller"),
            energy_kwh: 5,
            reserve_price: reserve,
            bidding_start: 100,
            bidding_end: 200,
            reveal_end: 300,
            closed: false,
        }
    }

    fn payout_for<'a>(result: &'a SettlementResult, name: &str) -> Option<&'a Payout> {
        result.payouts.iter().find(|p| p.recipient.as_str() == name)
    }

    #[test]
    fn highest_wins_at_second_price() {
        let bids = vec![
            bid("a", 20, Some(10)),
            bid("b", 20, Some(7)),
            bid("c", 20, Some(15)),
            bid("d", 20, Some(3)),
        ];
        let refs: Vec<&Bid> = bids.iter().collect();
        let outcome = determine_outcome(&refs, 0);

        assert_eq!(outcome.winner, Some((BidderId::from("c"), 15)));
        assert_eq!(outcome.clearing_price, 10);
        assert_eq!(outcome.num_valid, 4);
    }

    #[test]
    fn tie_goes_to_first_recorded() {
        let bids = vec![
            bid("a", 20, Some(15)),
            bid("b", 20, Some(15)),
            bid("c", 20, Some(7)),
        ];
        let refs: Vec<&Bid> = bids.iter().collect();
        let outcome = determine_outcome(&refs, 0);

        assert_eq!(outcome.winner, Some((BidderId::from("a"), 15)));
        assert_eq!(outcome.clearing_price, 15);
    }

    #[test]
    fn single_revealer_pays_reserve() {
        let bids = vec![bid("a", 100, Some(60)), bid("b", 100, None)];
        let refs: Vec<&Bid> = bids.iter().collect();

        let outcome = determine_outcome(&refs, 50);
        assert_eq!(outcome.winner, Some((BidderId::from("a"), 60)));
        assert_eq!(outcome.clearing_price, 50);

        let outcome = determine_outcome(&refs, 0);
        assert_eq!(outcome.clearing_price, 0);
    }

    #[test]
    fn below_reserve_reveals_cannot_win_or_price() {
        let bids = vec![bid("a", 100, Some(40)), bid("b", 100, Some(60))];
        let refs: Vec<&Bid> = bids.iter().collect();
        let outcome = determine_outcome(&refs, 50);

        assert_eq!(outcome.winner, Some((BidderId::from("b"), 60)));
        assert_eq!(outcome.clearing_price, 50);
        assert_eq!(outcome.num_valid, 1);
    }

    #[test]
    fn settle_refunds_winner_overpayment_and_losers() {
        let bids = vec![
            bid("a", 10, Some(10)),
            bid("b", 7, Some(7)),
            bid("c", 15, Some(15)),
            bid("d", 3, Some(3)),
        ];
        let refs: Vec<&Bid> = bids.iter().collect();
        let result = settle(&round(0), &refs, 400).unwrap();

        assert_eq!(result.winner, Some(BidderId::from("c")));
        assert_eq!(result.clearing_price, 10);
        assert_eq!(result.num_revealed, 4);

        let winner_refund = payout_for(&result, "c").unwrap();
        assert_eq!(winner_refund.kind, PayoutKind::WinnerRefund);
        assert_eq!(winner_refund.amount, 5);

        for loser in ["a", "b", "d"] {
            let refund = payout_for(&result, loser).unwrap();
            assert_eq!(refund.kind, PayoutKind::LoserRefund);
        }
        assert_eq!(payout_for(&result, "a").unwrap().amount, 10);
        assert_eq!(payout_for(&result, "b").unwrap().amount, 7);
        assert_eq!(payout_for(&result, "d").unwrap().amount, 3);

        let proceeds = payout_for(&result, "seller").unwrap();
        assert_eq!(proceeds.kind, PayoutKind::SellerProceeds);
        assert_eq!(proceeds.amount, 10);
    }

    #[test]
    fn settle_forfeits_unrevealed_deposits_to_seller() {
        let bids = vec![
            bid("a", 10, Some(10)),
            bid("b", 8, Some(7)),
            bid("ghost", 9, None),
        ];
        let refs: Vec<&Bid> = bids.iter().collect();
        let result = settle(&round(0), &refs, 400).unwrap();

        assert_eq!(result.winner, Some(BidderId::from("a")));
        assert_eq!(result.forfeited, vec![(BidderId::from("ghost"), 9)]);
        assert!(payout_for(&result, "ghost").is_none());

        // clearing (7) + forfeit (9)
        assert_eq!(payout_for(&result, "seller").unwrap().amount, 16);
    }

    #[test]
    fn settle_with_no_reveals_refunds_everyone() {
        let bids = vec![bid("a", 10, None), bid("b", 8, None)];
        let refs: Vec<&Bid> = bids.iter().collect();
        let result = settle(&round(0), &refs, 400).unwrap();

        assert_eq!(result.winner, None);
        assert_eq!(result.clearing_price, 0);
        assert_eq!(result.num_revealed, 0);
        assert!(result.forfeited.is_empty());
        assert_eq!(payout_for(&result, "a").unwrap().amount, 10);
        assert_eq!(payout_for(&result, "b").unwrap().amount, 8);
        assert!(payout_for(&result, "seller").is_none());
    }

    #[test]
    fn settle_guards_winner_deposit_underflow() {
        // Winner deposited less than the clearing price; the subtraction
        // must fail loudly instead of wrapping.
        let bids = vec![bid("a", 5, Some(20)), bid("b", 100, Some(15))];
        let refs: Vec<&Bid> = bids.iter().collect();
        let err = settle(&round(0), &refs, 400).unwrap_err();

        assert_eq!(
            err,
            AuctionError::InsufficientDeposit {
                required: 15,
                got: 5
            }
        );
    }

    #[test]
    fn settle_skips_zero_winner_refund() {
        let bids = vec![bid("a", 10, Some(12)), bid("b", 10, Some(10))];
        let refs: Vec<&Bid> = bids.iter().collect();
        let result = settle(&round(0), &refs, 400).unwrap();

        // Winner's deposit exactly covers the clearing price.
        assert_eq!(result.clearing_price, 10);
        assert!(payout_for(&result, "a").is_none());
        assert_eq!(payout_for(&result, "seller").unwrap().amount, 10);
    }
}
