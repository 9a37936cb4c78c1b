use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};

use crate::config::{self, Configuration};
use crate::model::time_entry::{TimeEntry, EXPECTED_HOURS_PER_DAY};
use crate::model::work_item::WorkItem;
use crate::providers;
use crate::store::TimeEntryStore;
use crate::tracker::{self, TimeTracker};

pub fn print_usage() {
    println!("sprintlog - track time against the current sprint's work items");
    println!();
    println!("Usage:");
    println!("  sprintlog [status]                      Show today's hours and eligible items");
    println!("  sprintlog log <id> <hours> [options]    Log hours against a work item");
    println!("      --no-burn          Do not deduct the hours from remaining work");
    println!("      --close            Close the work item after logging");
    println!("      --date YYYY-MM-DD  Log against yesterday instead of today");
    println!("  sprintlog config show                   Print the current configuration");
    println!("  sprintlog config set <key> <value>      Update one configuration field");
    println!("      keys: services-url, project, team, pat, allow-entry-without-task");
}

fn build_tracker() -> Result<TimeTracker> {
    let config = config::load_config()?;
    let client = providers::create_tracker(&config);
    let store = TimeEntryStore::open_default().context("Failed to open the time entry store")?;
    Ok(TimeTracker::new(config, client, store))
}

/// Show today's total and the curated work item tree.
pub async fn handle_status() -> Result<()> {
    let tracker = build_tracker()?;

    let Some(loaded) = tracker.find_work_items_to_entry_time().await? else {
        bail!("Not configured yet. Run 'sprintlog config set <key> <value>' first.");
    };

    println!(
        "Logged today: {:.2} of {} hours",
        loaded.total_hours_logged_today, EXPECTED_HOURS_PER_DAY
    );

    if loaded.items.is_empty() {
        if loaded.total_hours_logged_today >= f64::from(EXPECTED_HOURS_PER_DAY) {
            println!("Day is fully logged, nothing left to enter.");
        } else {
            println!("No eligible work items in the current sprint.");
        }
        return Ok(());
    }

    println!();
    for item in &loaded.items {
        print_item(item, 0);
        if let Some(children) = &item.children {
            for child in children {
                print_item(child, 1);
            }
        }
    }
    Ok(())
}

fn print_item(item: &WorkItem, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}#{:<6} [{}] {} ({}, {:.1}h remaining)",
        item.id,
        item.kind.name(),
        item.title,
        item.state,
        item.remaining_work
    );
}

#[derive(Debug, PartialEq)]
struct LogArgs {
    work_item_id: i64,
    hours: f64,
    burn: bool,
    close: bool,
    date: Option<NaiveDate>,
}

fn parse_log_args(args: &[String]) -> Result<LogArgs> {
    let mut positional = Vec::new();
    let mut burn = true;
    let mut close = false;
    let mut date = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--no-burn" => burn = false,
            "--close" => close = true,
            "--date" => {
                let value = iter.next().context("--date needs a value (YYYY-MM-DD)")?;
                date = Some(
                    NaiveDate::parse_from_str(value, "%Y-%m-%d")
                        .with_context(|| format!("Invalid date: {value}"))?,
                );
            }
            other if other.starts_with("--") => bail!("Unknown option: {other}"),
            other => positional.push(other),
        }
    }

    let [id, hours] = positional.as_slice() else {
        bail!("Usage: sprintlog log <work-item-id> <hours> [--no-burn] [--close] [--date YYYY-MM-DD]");
    };
    let work_item_id: i64 = id
        .parse()
        .with_context(|| format!("Invalid work item id: {id}"))?;
    let hours: f64 = hours
        .parse()
        .with_context(|| format!("Invalid hours: {hours}"))?;
    if hours <= 0.0 {
        bail!("Hours must be positive");
    }

    Ok(LogArgs {
        work_item_id,
        hours,
        burn,
        close,
        date,
    })
}

/// How far back `--date` may reach. This is not an editing tool; anything
/// older means correcting history, which happens in the store file directly.
const MAX_BACKDATE_DAYS: i64 = 1;

fn validate_log_date(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date > today {
        bail!("Cannot log time for a future date");
    }
    if today - date > Duration::days(MAX_BACKDATE_DAYS) {
        bail!(
            "--date only reaches back {MAX_BACKDATE_DAYS} day; older records need a manual edit of the store file"
        );
    }
    Ok(())
}

/// Log hours against one work item and push the update remotely.
pub async fn handle_log(args: &[String]) -> Result<()> {
    let parsed = parse_log_args(args)?;
    if let Some(date) = parsed.date {
        validate_log_date(date, Local::now().date_naive())?;
    }
    let mut time_tracker = build_tracker()?;

    let Some(loaded) = time_tracker.find_work_items_to_entry_time().await? else {
        bail!("Not configured yet. Run 'sprintlog config set <key> <value>' first.");
    };

    let Some(target) = tracker::entry_target(&loaded.items, parsed.work_item_id) else {
        bail!(
            "Work item {} is not eligible for time entry today. Run 'sprintlog status' to see the list.",
            parsed.work_item_id
        );
    };

    let mut entry = TimeEntry::new(parsed.hours, target);
    entry.burn = parsed.burn;
    entry.close_work_item = parsed.close;
    if let Some(date) = parsed.date {
        entry.date = date;
    }

    let target_id = entry.work_item.id;
    let refreshed = time_tracker.save_time_entries(vec![entry]).await?;

    println!("Logged {:.2}h against #{target_id}.", parsed.hours);
    if let Some(loaded) = refreshed {
        println!(
            "Logged today: {:.2} of {} hours",
            loaded.total_hours_logged_today, EXPECTED_HOURS_PER_DAY
        );
    }
    Ok(())
}

pub async fn handle_config(args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("show") | None => {
            let config = config::load_config()?;
            print_config(&config);
            Ok(())
        }
        Some("set") => {
            let [_, key, value] = args else {
                bail!("Usage: sprintlog config set <key> <value>");
            };
            let mut config = config::load_config()?;
            apply_config_value(&mut config, key, value)?;
            config::save_config(&config)?;
            if !config.is_valid() {
                println!("Saved. Configuration is still incomplete; all of services-url, project, team and pat are required.");
            } else {
                println!("Saved.");
            }
            Ok(())
        }
        Some(other) => bail!("Unknown config command: {other}"),
    }
}

fn apply_config_value(config: &mut Configuration, key: &str, value: &str) -> Result<()> {
    match key {
        "services-url" => config.services_url = value.to_string(),
        "project" => config.project = value.to_string(),
        "team" => config.team = value.to_string(),
        "pat" => config.pat = value.to_string(),
        "allow-entry-without-task" => {
            config.allow_entry_without_task = value
                .parse()
                .with_context(|| format!("Expected true or false, got: {value}"))?;
        }
        other => bail!("Unknown config key: {other}"),
    }
    Ok(())
}

fn print_config(config: &Configuration) {
    let mask = |s: &str| {
        if s.is_empty() {
            "(unset)".to_string()
        } else {
            "********".to_string()
        }
    };
    let show = |s: &str| {
        if s.is_empty() {
            "(unset)".to_string()
        } else {
            s.to_string()
        }
    };
    println!("services-url              {}", show(&config.services_url));
    println!("project                   {}", show(&config.project));
    println!("team                      {}", show(&config.team));
    println!("pat                       {}", mask(&config.pat));
    println!(
        "allow-entry-without-task  {}",
        config.allow_entry_without_task
    );
}
