use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;
use crate::db::Database;
use crate::models::{Period, Snapshot};
use crate::service::{BudgetService, SplitRequest};

pub const DEFAULT_USER: &str = "default";

/// Flags that take a value and are not positional arguments.
const VALUE_FLAGS: &[&str] = &["--user", "--category", "--desc", "--month"];

/// Command line split into the acting user, the command, and everything after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub user: String,
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl Invocation {
    /// Parse `args` as produced by `std::env::args` (program name first).
    pub fn parse(args: &[String]) -> Self {
        let rest = args.get(1..).unwrap_or_default();
        let user = flag_value(rest, "--user").unwrap_or_else(|| DEFAULT_USER.to_string());

        let mut remaining = Vec::with_capacity(rest.len());
        let mut iter = rest.iter();
        while let Some(arg) = iter.next() {
            if arg == "--user" {
                iter.next();
            } else {
                remaining.push(arg.clone());
            }
        }

        let mut remaining = remaining.into_iter();
        let command = remaining.next();
        Self {
            user,
            command,
            args: remaining.collect(),
        }
    }
}

pub fn as_cli(invocation: &Invocation, db: &mut Database, config: &Config) -> Result<()> {
    let user_id = db.ensure_user(&invocation.user)?.id;
    let args = invocation.args.as_slice();
    let mut svc = BudgetService::new(db, config.engine);

    match invocation.command.as_deref() {
        Some("categories") => cli_categories(&svc, user_id),
        Some("category") => cli_category(args, &svc, user_id),
        Some("assign") => cli_assign(args, &svc, user_id),
        Some("txn") => cli_txn(args, &mut svc, user_id),
        Some("delete-txn") => cli_delete_txn(args, &svc, user_id),
        Some("snapshot") | Some("s") | None => cli_snapshot(args, &svc, user_id),
        Some("snapshots") => cli_snapshots(&svc, user_id),
        Some("invalidate") => cli_invalidate(args, &svc, user_id),
        Some("export") => cli_export(args, &svc, user_id),
        Some("--help" | "-h" | "help") => {
            print_usage();
            Ok(())
        }
        Some("--version" | "-V" | "version") => {
            println!("budgetsnap {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(other) => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("budgetsnap - monthly Ready-To-Assign snapshots");
    println!();
    println!("Usage: budgetsnap [--user <name>] [command]");
    println!();
    println!("Commands:");
    println!("  snapshot [YYYY-MM]            Show budget state for a month (default: current)");
    println!("  snapshots                     List stored snapshots and their validity");
    println!("  categories                    List categories");
    println!("  category add <name>           Create a category");
    println!("  assign <category> <YYYY-MM> <amount>");
    println!("                                Budget money into a category for a month");
    println!("  txn <YYYY-MM-DD> <amount>     Record a transaction (income unless --category)");
    println!("    --category <name>           Charge to the category's allocation that month");
    println!("    --desc <text>               Description");
    println!("  delete-txn <id>               Delete a transaction");
    println!("  invalidate <YYYY-MM>          Mark snapshots from a month onward as stale");
    println!("  export [path]                 Export a month's snapshot to CSV");
    println!("    --month <YYYY-MM>           Month to export (default: current)");
    println!("  --help, -h                    Show this help");
    println!("  --version, -V                 Show version");
    println!();
    println!("Environment:");
    println!("  BUDGETSNAP_DB                 Database path");
    println!("  BUDGETSNAP_MAX_CHAIN          Max months walked back per rebuild; longer");
    println!("                                rebuilds fail until the limit is raised");
    println!("  BUDGETSNAP_LOG                Log filter (e.g. budgetsnap=debug)");
}

fn cli_categories(svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let categories = svc.categories(user_id)?;
    if categories.is_empty() {
        println!("No categories");
        return Ok(());
    }
    println!("{:<4} Name", "ID");
    println!("{}", "─".repeat(30));
    for cat in &categories {
        println!("{:<4} {}", cat.id.unwrap_or(0), cat.name);
    }
    Ok(())
}

fn cli_category(args: &[String], svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let positional = positional(args);
    match positional.as_slice() {
        ["add", name] => {
            let id = svc.add_category(user_id, name)?;
            println!("Created category '{name}' (id {id})");
            Ok(())
        }
        _ => anyhow::bail!("Usage: budgetsnap category add <name>"),
    }
}

fn cli_assign(args: &[String], svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let positional = positional(args);
    let [category, period, amount] = positional.as_slice() else {
        anyhow::bail!("Usage: budgetsnap assign <category> <YYYY-MM> <amount>");
    };
    let period: Period = period.parse()?;
    let amount = parse_amount(amount)?;
    svc.assign(user_id, category, period, amount)?;
    println!("Assigned ${amount:.2} to {category} for {period}");
    Ok(())
}

fn cli_txn(args: &[String], svc: &mut BudgetService<'_>, user_id: i64) -> Result<()> {
    let positional = positional(args);
    let [date, amount] = positional.as_slice() else {
        anyhow::bail!("Usage: budgetsnap txn <YYYY-MM-DD> <amount> [--category <name>] [--desc <text>]");
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{date}' (expected YYYY-MM-DD)"))?;
    let amount = parse_amount(amount)?;
    let category = flag_value(args, "--category");
    let description = flag_value(args, "--desc").unwrap_or_default();

    let id = svc.record_transaction(
        user_id,
        date,
        &description,
        &[SplitRequest {
            category: category.clone(),
            amount,
        }],
    )?;
    match category {
        Some(c) => println!("Recorded transaction {id}: ${amount:.2} spent from {c}"),
        None => println!("Recorded transaction {id}: ${amount:.2} income"),
    }
    Ok(())
}

fn cli_delete_txn(args: &[String], svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let id: i64 = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: budgetsnap delete-txn <id>"))?
        .parse()
        .context("Transaction id must be a number")?;
    svc.delete_transaction(user_id, id)?;
    println!("Deleted transaction {id}");
    Ok(())
}

fn cli_snapshot(args: &[String], svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let period = month_arg(positional(args).first().copied())?;
    let snapshot = svc.snapshot(user_id, period)?;
    let categories = svc.categories(user_id)?;
    print_snapshot(&snapshot, &categories);
    Ok(())
}

fn cli_snapshots(svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let snapshots = svc.stored_snapshots(user_id)?;
    if snapshots.is_empty() {
        println!("No snapshots");
        return Ok(());
    }
    println!("{:<9} {:>14}  State", "Period", "Ready");
    println!("{}", "─".repeat(34));
    for snap in &snapshots {
        let state = if snap.is_valid { "valid" } else { "stale" };
        println!(
            "{:<9} {:>14}  {state}",
            snap.period.to_string(),
            format!("${:.2}", snap.ready_to_assign)
        );
    }
    Ok(())
}

fn cli_invalidate(args: &[String], svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let period: Period = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: budgetsnap invalidate <YYYY-MM>"))?
        .parse()?;
    svc.invalidate(user_id, period)?;
    println!("Snapshots from {period} onward marked stale");
    Ok(())
}

fn cli_export(args: &[String], svc: &BudgetService<'_>, user_id: i64) -> Result<()> {
    let period = month_arg(flag_value(args, "--month").as_deref())?;
    let output_path = positional(args)
        .first()
        .map(|a| shellexpand(a))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            format!("{home}/budgetsnap-{period}.csv")
        });

    let snapshot = svc.snapshot(user_id, period)?;
    let categories = svc.categories(user_id)?;
    let count = crate::export::export_snapshot(&snapshot, &categories, Path::new(&output_path))?;
    println!("Exported {count} categories for {period} to {output_path}");
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, categories: &[crate::models::Category]) {
    println!("budgetsnap — {}", snapshot.period);
    println!("{}", "─".repeat(56));
    println!("  Ready to Assign: ${:.2}", snapshot.ready_to_assign);
    if snapshot.categories.is_empty() {
        return;
    }
    println!();
    println!(
        "  {:<20} {:>10} {:>10} {:>10}",
        "Category", "Assigned", "Activity", "Available"
    );
    for state in &snapshot.categories {
        let name = crate::models::Category::find_by_id(categories, state.category_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("#{}", state.category_id));
        let marker = if state.is_overspent() { " !" } else { "" };
        println!(
            "  {name:<20} {:>10.2} {:>10.2} {:>10.2}{marker}",
            state.assigned, state.activity, state.available
        );
    }
    let overspend = snapshot.overspend();
    if overspend > Decimal::ZERO {
        println!();
        println!("  Overspent: ${overspend:.2} (deducted from next month)");
    }
}

fn month_arg(arg: Option<&str>) -> Result<Period> {
    match arg {
        Some(m) => m.parse(),
        None => Ok(Period::current()),
    }
}

fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned = s.trim().trim_start_matches('$').replace(',', "");
    Decimal::from_str(&cleaned).with_context(|| format!("Invalid amount '{s}'"))
}

/// Value following `flag`, if present.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

/// Arguments that are neither flags nor flag values.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
