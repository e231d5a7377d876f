//! Chat alerts for freshly ingested events.
//!
//! Alerting runs after ingestion and never fails it: a position that cannot
//! be read back is logged and its alert dropped.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{debug, warn};

use keeper_chain::contracts::{helper, uint_arg};
use keeper_chain::{ChainClient, InvestorEvent, PositionView};

use crate::format::{format_signed, format_units};
use crate::notify::Notifier;
use crate::sync::{IngestedEarn, IngestedPositionEvent};
use crate::u256_math::{mul_div, pow10, split_sign, to_signed, ONE6, WAD};

pub struct AlertDispatcher {
    chain: Arc<dyn ChainClient>,
    helper: Address,
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    pub fn new(chain: Arc<dyn ChainClient>, helper: Address, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            chain,
            helper,
            notifier,
        }
    }

    /// One alert per event, enriched with the position's current state.
    pub async fn dispatch_position_events(&self, events: &[IngestedPositionEvent]) {
        for ingested in events {
            let id = ingested.event.position_id();
            let view = match self.peek_position(id).await {
                Ok(view) => view,
                Err(e) => {
                    warn!(position = %id, block = ingested.block, error = %e, "Failed to read position for alert");
                    continue;
                }
            };
            debug!(position = %id, event = ingested.event.name(), "Sending position alert");
            self.notifier
                .send(&format_position_alert(&ingested.event, &view), None, None)
                .await;
        }
    }

    pub async fn dispatch_earns(&self, earns: &[IngestedEarn]) {
        for earn in earns {
            self.notifier.send(&format_earn_alert(earn), None, None).await;
        }
    }

    async fn peek_position(&self, id: U256) -> Result<PositionView, keeper_chain::ChainError> {
        let values = self
            .chain
            .read(self.helper, &helper::peek_position(), &[uint_arg(id)])
            .await?;
        PositionView::from_values(&values)
    }
}

/// Position summary followed by what the event changed.
pub fn format_position_alert(event: &InvestorEvent, view: &PositionView) -> String {
    let borrow_usd = mul_div(view.borrow_value, view.price, ONE6);
    let basis = view.amount.saturating_mul(view.price);
    let cost = mul_div(view.borrow_value.saturating_add(view.amount), view.price, ONE6);
    let roi = to_signed(view.shares_value).saturating_sub(to_signed(cost));

    let roi_line = if view.amount.is_zero() {
        format_signed(roi, 18, 2)
    } else {
        // roi has 18 decimals, amount 6; scale by 100 for a percentage
        let (negative, abs) = split_sign(roi);
        let pct = to_signed(mul_div(abs, pow10(8), view.amount));
        let pct = if negative { -pct } else { pct };
        format!("{} ({}%)", format_signed(roi, 18, 2), format_signed(pct, 18, 2))
    };

    let mut text = format!("**Position #{}**\n\n```\n", event.position_id());
    text.push_str(&format!("Value   {}\n", format_units(view.shares_value, 18, 2)));
    text.push_str(&format!("Borrow  {}\n", format_units(borrow_usd, 18, 2)));
    text.push_str(&format!("Basis   {}\n", format_units(basis, 24, 2)));
    text.push_str(&format!("ROI     {roi_line}\n"));
    text.push_str(&format!("Life    {}\n", format_units(view.life, 18, 2)));
    text.push_str("```\n");

    match event {
        InvestorEvent::Kill { keeper, fee, .. } => {
            text.push_str(&format!(
                "Liquidation: Fee {} Keeper {keeper}",
                format_units(*fee, 6, 2)
            ));
        }
        InvestorEvent::Edit { amount, borrowed, .. } => {
            text.push_str("Change:");
            if amount.is_positive() {
                text.push_str(&format!(" Deposit {}", format_signed(*amount, 6, 2)));
                text.push_str(&format!(" Borrow {}", format_signed(*borrowed, 6, 2)));
            } else if amount.is_negative() {
                let sold = mul_div(amount.unsigned_abs(), view.shares_value, view.shares);
                text.push_str(&format!(" Sell {}", format_units(sold, 18, 2)));
                text.push_str(&format!(
                    " Repay {}",
                    format_signed(borrowed.saturating_neg(), 6, 2)
                ));
            }
        }
    }
    text
}

/// `Strategy Earn` line with profit and TVL in whole units.
pub fn format_earn_alert(earn: &IngestedEarn) -> String {
    format!(
        "Strategy Earn: Address `{}` Profit ${} TVL {}",
        earn.strategy,
        earn.event.profit / WAD,
        earn.event.tvl / WAD
    )
}
