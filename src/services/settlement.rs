use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Partner, WithdrawalRequest, WithdrawalStatus};

pub const BASE_PLATFORM_FEE: f64 = 0.15;
/// Share a referred partner keeps before any rank discount.
pub const REFERRED_PARTNER_BASE_SHARE: f64 = 0.85;

pub const REFUND_CUSTOMER_PERCENT: i64 = 70;
pub const REFUND_PARTNER_PERCENT: i64 = 15;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price of `duration_hours` with the partner: half-hourly rate doubled to an hourly equivalent.
pub fn booking_amount(duration_hours: f64, partner: &Partner) -> f64 {
    round2(duration_hours * partner.hourly_equivalent())
}

/// Fee discount earned by last week's leaderboard position.
pub fn platform_fee_discount(rank: Option<i64>) -> f64 {
    match rank {
        Some(1) => 0.02,
        Some(2) | Some(3) => 0.01,
        _ => 0.0,
    }
}

pub fn calculate_platform_fee_percentage(rank: Option<i64>) -> f64 {
    BASE_PLATFORM_FEE - platform_fee_discount(rank)
}

/// Fee the platform keeps from this partner's earnings.
///
/// An explicit override wins. A referred partner keeps 85% plus the rank
/// discount. Everyone else pays the rank-tiered fee.
pub fn partner_fee_percentage(partner: &Partner, last_week_rank: Option<i64>) -> f64 {
    if let Some(fee) = partner.referral_platform_fee {
        return fee;
    }
    if partner.invited_by.is_some() {
        let share = (REFERRED_PARTNER_BASE_SHARE + platform_fee_discount(last_week_rank)).min(1.0);
        return 1.0 - share;
    }
    calculate_platform_fee_percentage(last_week_rank)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSplit {
    pub refund_amount: f64,
    pub partner_amount: f64,
    pub platform_amount: f64,
}

/// 70% back to the customer, 15% to the partner, the platform keeps the rest.
/// Computed in cents so the three parts always add back up to `amount`.
pub fn refund_split(amount: f64) -> RefundSplit {
    let total_cents = (amount * 100.0).round() as i64;
    let refund_cents = (total_cents * REFUND_CUSTOMER_PERCENT + 50).div_euclid(100);
    let partner_cents = (total_cents * REFUND_PARTNER_PERCENT + 50).div_euclid(100);
    let platform_cents = total_cents - refund_cents - partner_cents;

    RefundSplit {
        refund_amount: refund_cents as f64 / 100.0,
        partner_amount: partner_cents as f64 / 100.0,
        platform_amount: platform_cents as f64 / 100.0,
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn last_week_start(today: NaiveDate) -> NaiveDate {
    week_start(today) - Duration::days(7)
}

pub fn partner_last_week_rank(
    conn: &Connection,
    partner_id: &str,
    today: NaiveDate,
) -> anyhow::Result<Option<i64>> {
    queries::get_rank_for_week(conn, &last_week_start(today), partner_id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceBreakdown {
    pub total_earnings: f64,
    pub platform_fee_percentage: f64,
    pub partner_earnings: f64,
    pub referral_earnings: f64,
    pub total_withdrawn: f64,
    pub available_balance: f64,
}

pub fn available_balance(
    conn: &Connection,
    partner: &Partner,
    today: NaiveDate,
) -> anyhow::Result<BalanceBreakdown> {
    let total_earnings = queries::sum_partner_earnings(conn, &partner.id)?;
    let rank = partner_last_week_rank(conn, &partner.id, today)?;
    let fee = partner_fee_percentage(partner, rank);
    let partner_earnings = round2(total_earnings * (1.0 - fee));
    let total_withdrawn = queries::sum_withdrawn(conn, &partner.id)?;

    Ok(BalanceBreakdown {
        total_earnings: round2(total_earnings),
        platform_fee_percentage: fee,
        partner_earnings,
        referral_earnings: round2(partner.referral_earnings),
        total_withdrawn: round2(total_withdrawn),
        available_balance: round2(partner_earnings + partner.referral_earnings - total_withdrawn),
    })
}

pub fn request_withdrawal(
    conn: &mut Connection,
    partner_id: &str,
    amount: f64,
    now: NaiveDateTime,
) -> Result<WithdrawalRequest, AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::Validation(
            "amount must be a positive number".into(),
        ));
    }
    let amount = round2(amount);
    if amount <= 0.0 {
        return Err(AppError::Validation(
            "amount must be at least 0.01".into(),
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let partner = queries::get_partner(&tx, partner_id)?
        .ok_or_else(|| AppError::not_found("partner"))?;

    let balance = available_balance(&tx, &partner, now.date())?;
    if amount > balance.available_balance {
        tracing::info!(
            partner_id,
            requested = amount,
            available = balance.available_balance,
            "withdrawal exceeds balance"
        );
        return Err(AppError::ExceedsBalance {
            requested: amount,
            available_balance: balance.available_balance,
        });
    }

    if queries::count_withdrawals(&tx, partner_id, WithdrawalStatus::Pending)? > 0 {
        return Err(AppError::PendingExists);
    }

    let request = WithdrawalRequest {
        id: uuid::Uuid::new_v4().to_string(),
        partner_id: partner_id.to_string(),
        amount,
        status: WithdrawalStatus::Pending,
        requested_at: now,
        processed_at: None,
    };
    queries::insert_withdrawal(&tx, &request)?;
    tx.commit()?;

    tracing::info!(partner_id, amount, withdrawal_id = %request.id, "withdrawal requested");
    Ok(request)
}
