//! Output Formatting
//!
//! Every printer takes the output format; `json` prints the value as-is,
//! `table` prints a human-readable layout with amounts in whole tokens.

use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;

use tw_core::{
    level_name, to_display, Address, DownlinePage, IncomePage, IncomeSummary, Participant,
    RankIncome, ReferralPage, Sponsors, TierStatus, TierTable,
};
use tw_engine::{DashboardView, RegistrationOutcome, RoyaltySnapshot, UpgradeOutcome};

use crate::commands::OutputFormat;

/// Print as JSON
pub fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

/// Address with its display id when one is known
fn label(address: &Address, ids: &HashMap<Address, String>) -> String {
    match ids.get(address) {
        Some(id) => format!("{} ({})", id, address.short()),
        None => address.to_string(),
    }
}

fn status_label(status: TierStatus) -> &'static str {
    match status {
        TierStatus::NotQualified => "not qualified",
        TierStatus::Qualified => "QUALIFIED",
        TierStatus::Achieved => "ACHIEVED",
    }
}

/// Print a royalty snapshot
pub fn print_royalty(snapshot: &RoyaltySnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(snapshot),
        OutputFormat::Table => {
            println!("Royalty Tiers for {}", snapshot.address);
            println!("{}", "=".repeat(60));
            for tier in &snapshot.tiers {
                let achievers = snapshot
                    .achievers_count
                    .get(tier.index)
                    .copied()
                    .unwrap_or(0);
                println!("{} [{}]", tier.name, status_label(tier.status));
                print_row(
                    "  Strong leg:",
                    &format!(
                        "{} / {} ({:.0}%)",
                        tier.progress.strong_leg, tier.progress.required_strong, tier.strong_progress_pct
                    ),
                );
                print_row(
                    "  Weak legs:",
                    &format!(
                        "{} + {} ({:.0}%)",
                        tier.progress.weak_leg1, tier.progress.weak_leg2, tier.weak_progress_pct
                    ),
                );
                print_row(
                    "  Required level:",
                    level_name(tier.progress.required_level),
                );
                print_row("  Pool:", &to_display(Some(tier.pool_amount)));
                print_row("  Achievers:", &achievers.to_string());
                if let Some(r) = &tier.royalty {
                    if r.achieved {
                        print_row(
                            "  Paid days:",
                            &format!("{} ({} remaining)", r.paid_days, r.days_remaining),
                        );
                        print_row("  Earned:", &to_display(Some(r.total_earned)));
                    }
                }
            }
            if snapshot.royalty_info.is_none() {
                print_warning("royalty info unavailable, achieved tiers may be missing");
            }
        }
    }
}

/// Print an income page
pub fn print_income(
    page: &IncomePage,
    page_number: u64,
    per_page: u64,
    ids: &HashMap<Address, String>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(page),
        OutputFormat::Table => {
            println!(
                "Income (page {} of {}, {} events)",
                page_number.max(1),
                page.total_pages(per_page),
                page.total_count
            );
            print_separator();
            if page.events.is_empty() {
                println!("No income events");
                return;
            }
            println!(
                "{:<20} {:<18} {:<6} {:>12}  {}",
                "Time", "Type", "Level", "Amount", "From"
            );
            for event in &page.events {
                let time = render_time(event.timestamp);
                println!(
                    "{:<20} {:<18} {:<6} {:>12}  {}",
                    time,
                    event.income_type.label(),
                    event.level_number,
                    to_display(Some(event.amount)),
                    label(&event.address, ids)
                );
            }
        }
    }
}

fn render_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|t| Utc.timestamp_opt(t, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Print a downline page
pub fn print_downline(
    page: &DownlinePage,
    depth: u32,
    ids: &HashMap<Address, String>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(page),
        OutputFormat::Table => {
            println!("Downline depth {} ({} total)", depth, page.total_count);
            print_separator();
            if page.is_empty() {
                println!("No participants");
                return;
            }
            for entry in &page.entries {
                println!(
                    "{:<44} {:<12} refs {:<4} sponsor {}",
                    label(&entry.address, ids),
                    level_name(entry.current_level),
                    entry.direct_referrals,
                    entry.sponsor.short()
                );
            }
        }
    }
}

/// Print sponsors
pub fn print_sponsors(address: &Address, sponsors: &Sponsors, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(sponsors),
        OutputFormat::Table => {
            println!("Sponsors of {}", address);
            print_separator();
            print_row("Direct sponsor:", &sponsors.direct_sponsor.to_string());
            print_row("Matrix sponsor:", &sponsors.matrix_sponsor.to_string());
        }
    }
}

#[derive(Serialize)]
struct StatsView<'a> {
    participant: &'a Participant,
    level_name: &'static str,
    #[serde(flatten)]
    dashboard: &'a DashboardView,
}

/// Print level, income totals, rank income and referral code
pub fn print_stats(participant: &Participant, dashboard: &DashboardView, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StatsView {
            participant,
            level_name: participant.level_name(),
            dashboard,
        }),
        OutputFormat::Table => {
            println!("Participant {}", participant.address);
            print_separator();
            print_row(
                "Level:",
                &format!("{} ({})", participant.current_level, participant.level_name()),
            );
            print_row(
                "Referral code:",
                dashboard.referral_code.as_deref().unwrap_or("(none)"),
            );
            match &dashboard.income {
                Some(s) => print_income_summary(s),
                None => print_warning("income totals unavailable"),
            }
            if let Some(rank) = &dashboard.rank_income {
                print_row("Rank income:", &to_display(Some(rank.total())));
            }
            if let Some(royalty) = &dashboard.royalty {
                let tiers: Vec<String> = royalty
                    .tiers
                    .iter()
                    .map(|t| format!("{} {}", t.name, status_label(t.status)))
                    .collect();
                print_row("Royalty tiers:", &tiers.join(", "));
            }
        }
    }
}

fn print_income_summary(s: &IncomeSummary) {
    print_row("Total income:", &to_display(Some(s.total_income)));
    print_row("Direct referral:", &to_display(Some(s.referral_income)));
    print_row("Upgrade referral:", &to_display(Some(s.upgrade_referral_income)));
    print_row("Level income:", &to_display(Some(s.level_income)));
    print_row("Bonus income:", &to_display(Some(s.bonus_income)));
    print_row("Team size:", &s.total_team_size.to_string());
    print_row("Direct referrals:", &s.direct_referrals.to_string());
}

/// Print a page of direct referrals
pub fn print_referrals(
    page: &ReferralPage,
    page_number: u64,
    per_page: u64,
    ids: &HashMap<Address, String>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(page),
        OutputFormat::Table => {
            println!(
                "Direct referrals (page {} of {}, {} total)",
                page_number.max(1),
                page.total_pages(per_page),
                page.total_count
            );
            print_separator();
            if page.is_empty() {
                println!("No referrals");
                return;
            }
            for entry in &page.entries {
                println!(
                    "{:<44} {:<12} refs {:<4} joined {}",
                    label(&entry.address, ids),
                    level_name(entry.current_level),
                    entry.direct_referrals,
                    render_time(entry.activation_time)
                );
            }
        }
    }
}

/// Print per-level team income
pub fn print_rank_income(address: &Address, income: Option<&RankIncome>, format: OutputFormat) {
    match (format, income) {
        (OutputFormat::Json, _) => print_json(&income),
        (OutputFormat::Table, None) => print_warning("rank income unavailable"),
        (OutputFormat::Table, Some(income)) => {
            println!("Rank income of {}", address);
            print_separator();
            for l in &income.level_incomes {
                print_row(
                    &format!("Level {} ({}):", l.level, level_name(l.level)),
                    &to_display(Some(l.amount)),
                );
            }
            print_row("Direct commission:", &to_display(Some(income.direct_commission)));
            print_row("Total:", &to_display(Some(income.total())));
        }
    }
}

/// Print the referral code
pub fn print_referral_code(address: &Address, code: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "address": address,
            "referral_code": code,
        })),
        OutputFormat::Table => match code {
            Some(code) => println!("{}", code),
            None => print_warning("no referral code available"),
        },
    }
}

#[derive(Serialize)]
struct RegistrationView<'a> {
    approve_tx: Option<String>,
    register_tx: String,
    userid: Option<&'a str>,
}

/// Print a confirmed registration
pub fn print_registration(outcome: &RegistrationOutcome, format: OutputFormat) {
    let view = RegistrationView {
        approve_tx: outcome.approve_tx.map(|t| t.to_hex()),
        register_tx: outcome.register_tx.to_hex(),
        userid: outcome.profile.as_ref().map(|p| p.userid.as_str()),
    };
    match format {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Table => {
            println!("Registration confirmed");
            print_separator();
            if let Some(tx) = &view.approve_tx {
                print_row("Approve tx:", tx);
            }
            print_row("Register tx:", &view.register_tx);
            print_row("User id:", view.userid.unwrap_or("pending"));
        }
    }
}

/// Print a confirmed upgrade
pub fn print_upgrade(outcome: &UpgradeOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "approve_tx": outcome.approve_tx.map(|t| t.to_hex()),
            "upgrade_tx": outcome.upgrade_tx.to_hex(),
            "level": outcome.level,
        })),
        OutputFormat::Table => {
            println!("Upgrade confirmed");
            print_separator();
            print_row(
                "Level:",
                &format!("{} ({})", outcome.level, level_name(outcome.level)),
            );
            if let Some(tx) = &outcome.approve_tx {
                print_row("Approve tx:", &tx.to_hex());
            }
            print_row("Upgrade tx:", &outcome.upgrade_tx.to_hex());
        }
    }
}

/// Print the tier table
pub fn print_tiers(tiers: &TierTable, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(tiers),
        OutputFormat::Table => {
            println!(
                "{:<6} {:<6} {:<8} {:<10} {:>10} {:>12}",
                "Tier", "Depth", "Strong", "Level", "Daily", "Pool"
            );
            for t in tiers.iter() {
                println!(
                    "{:<6} {:<6} {:<8} {:<10} {:>10} {:>12}",
                    t.name,
                    t.activation_depth,
                    t.required_strong,
                    level_name(t.required_level),
                    to_display(Some(t.daily_amount)),
                    to_display(Some(t.pool_amount()))
                );
            }
        }
    }
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("Warning: {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{}", message);
}

/// Print a table row
pub fn print_row(key: &str, value: &str) {
    println!("{:<20} {}", key, value);
}

/// Print a separator line
pub fn print_separator() {
    println!("{}", "-".repeat(40));
}
