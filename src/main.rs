// 🏫 COSTA School Administration - CLI + terminal UI entry point
//
// `costa-school <command> ...` runs one admin command against the configured database.
// With no arguments the terminal UI starts behind the login gate.

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use costa_school::{
    format_amount, format_signed_amount, logging, AppConfig, LedgerAggregator, LogTarget,
    RecordStore, ReportRenderer, StoreError,
};

const USAGE: &str = "\
Usage: costa-school [command]

Commands:
  init                                       create the database schema
  add-class <name>
  add-student <name> <age> <YYYY-MM-DD> [class]
  add-uniform <type> <size> <stock> <unit_cost>
  add-expense <YYYY-MM-DD> <amount> <category>
  add-income <YYYY-MM-DD> <amount> <source>
  list <classes|students|uniforms>
  summary <start> <end>
  cashbook <start> <end>
  by-category <start> <end>                  income per source, expenses per category
  report <start> <end> [dir]                 write the PDF report
  audit                                      recent changes

Without a command the terminal UI starts.";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = AppConfig::load()?;

    if args.is_empty() {
        // UI mode (default)
        logging::init(LogTarget::File(config.log_file.clone()))?;
        return run_ui_mode(&config);
    }

    logging::init(LogTarget::Stderr)?;
    let mut store = RecordStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    store.set_actor("cli");

    match run_command(&store, &config, &args) {
        Ok(()) => Ok(()),
        // Expected failures get a message, not a backtrace
        Err(e) => match e.downcast_ref::<StoreError>() {
            Some(StoreError::DuplicateKey { .. })
            | Some(StoreError::Invalid(_))
            | Some(StoreError::UnknownClass(_))
            | Some(StoreError::Overflow(_)) => {
                eprintln!("❌ {}", e);
                std::process::exit(2);
            }
            _ => Err(e),
        },
    }
}

fn run_command(store: &RecordStore, config: &AppConfig, args: &[String]) -> Result<()> {
    let command = args[0].as_str();
    let rest = &args[1..];

    match command {
        "init" => {
            println!("✓ Database ready at {}", config.db_path.display());
        }
        "add-class" => {
            let name = arg(rest, 0, "name")?;
            warn_similar(&store.similar_class_names(name)?, "class");
            let id = store.create_class(name)?;
            println!("✓ Class '{}' created (id {})", name.trim(), id);
        }
        "add-student" => {
            let name = arg(rest, 0, "name")?;
            let age: i64 = arg(rest, 1, "age")?
                .parse()
                .context("age must be a whole number")?;
            let date = parse_date(arg(rest, 2, "enrollment date")?)?;
            let class_id = match rest.get(3) {
                Some(class) => Some(
                    store
                        .find_class_id(class)?
                        .with_context(|| format!("no class named '{}'", class))?,
                ),
                None => None,
            };

            warn_similar(&store.similar_student_names(name)?, "student");
            let id = store.create_student(name, age, date, class_id)?;
            println!("✓ Student '{}' enrolled (id {})", name.trim(), id);
        }
        "add-uniform" => {
            let item_type = arg(rest, 0, "type")?;
            let size = arg(rest, 1, "size")?;
            let stock: i64 = arg(rest, 2, "stock")?
                .parse()
                .context("stock must be a whole number")?;
            let cost = parse_amount(arg(rest, 3, "unit cost")?)?;
            let id = store.create_uniform_item(item_type, size, stock, cost)?;
            println!("✓ Uniform item added (id {})", id);
        }
        "add-expense" => {
            let date = parse_date(arg(rest, 0, "date")?)?;
            let amount = parse_amount(arg(rest, 1, "amount")?)?;
            let id = store.create_expense(date, amount, arg(rest, 2, "category")?)?;
            println!("✓ Expense recorded (id {})", id);
        }
        "add-income" => {
            let date = parse_date(arg(rest, 0, "date")?)?;
            let amount = parse_amount(arg(rest, 1, "amount")?)?;
            let id = store.create_income(date, amount, arg(rest, 2, "source")?)?;
            println!("✓ Income recorded (id {})", id);
        }
        "list" => list(store, config, arg(rest, 0, "classes|students|uniforms")?)?,
        "summary" => {
            let (start, end) = parse_range(rest)?;
            let summary = LedgerAggregator::new(store).compute_ledger_summary(start, end)?;

            println!("📊 Ledger {} to {}", start, end);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("  Total Income:   {} {}", config.currency_label, format_amount(summary.total_income));
            println!("  Total Expenses: {} {}", config.currency_label, format_amount(summary.total_expense));
            println!("  Balance:        {} {}", config.currency_label, format_signed_amount(summary.balance));
            println!(
                "  Records:        {} income, {} expense",
                summary.income_records.len(),
                summary.expense_records.len()
            );
        }
        "cashbook" => {
            let (start, end) = parse_range(rest)?;
            let rows = LedgerAggregator::new(store).cashbook(start, end)?;

            println!("📒 Cashbook {} to {}", start, end);
            for row in &rows {
                println!(
                    "  {}  {:<8} {:<24} {:>14} {:>14}",
                    row.date,
                    row.kind.as_str(),
                    row.description,
                    format_signed_amount(row.signed_amount),
                    format_signed_amount(row.running_balance)
                );
            }
            if rows.is_empty() {
                println!("  (no entries)");
            }
        }
        "by-category" => {
            let (start, end) = parse_range(rest)?;
            let breakdown = LedgerAggregator::new(store).category_totals(start, end)?;

            println!("🗂️  By category {} to {}", start, end);
            for (heading, rows) in [("Income", &breakdown.income), ("Expenses", &breakdown.expense)] {
                println!("  {}:", heading);
                for row in rows.iter() {
                    println!(
                        "    {:<24} {:>4}  {} {}",
                        row.label,
                        row.records,
                        config.currency_label,
                        format_amount(row.total)
                    );
                }
                if rows.is_empty() {
                    println!("    (none)");
                }
            }
        }
        "report" => {
            let (start, end) = parse_range(rest)?;
            let dir = rest.get(2).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

            let summary = LedgerAggregator::new(store).compute_ledger_summary(start, end)?;
            let renderer = ReportRenderer::new(&config.report_title, &config.currency_label);
            let doc = renderer.render(start, end, &summary)?;

            let path = dir.join(&doc.filename);
            std::fs::write(&path, &doc.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("📄 Report written to {}", path.display());
        }
        "audit" => {
            for event in store.list_audit_log(50)? {
                println!(
                    "  {}  {:<8} {:<22} {:<8} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.actor,
                    event.action,
                    event.entity_id.map(|id| id.to_string()).unwrap_or_default(),
                    event.details
                );
            }
        }
        "help" | "--help" | "-h" => println!("{}", USAGE),
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }

    Ok(())
}

fn list(store: &RecordStore, config: &AppConfig, what: &str) -> Result<()> {
    match what {
        "classes" => {
            for class in store.list_classes()? {
                println!("  {:>4}  {}", class.id, class.name);
            }
        }
        "students" => {
            for row in store.list_students_with_class_names()? {
                println!(
                    "  {:>4}  {:<28} {:>3}  {}  {}",
                    row.student.id,
                    row.student.name,
                    row.student.age,
                    row.student.enrollment_date,
                    row.class_name.as_deref().unwrap_or("-")
                );
            }
        }
        "uniforms" => {
            for item in store.list_uniform_items()? {
                println!(
                    "  {:>4}  {:<20} {:<6} {:>5}  {} {}",
                    item.id,
                    item.item_type,
                    item.size,
                    item.stock,
                    config.currency_label,
                    format_amount(item.unit_cost)
                );
            }
        }
        other => bail!("cannot list '{}': expected classes, students or uniforms", other),
    }
    Ok(())
}

fn arg<'a>(rest: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    rest.get(index)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{}>\n\n{}", name, USAGE))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("'{}' is not a YYYY-MM-DD date", s))
}

fn parse_amount(s: &str) -> Result<Decimal> {
    Decimal::from_str(&s.replace(',', ""))
        .with_context(|| format!("'{}' is not an amount", s))
}

/// <start> <end>, defaulting to the current calendar year
fn parse_range(rest: &[String]) -> Result<(NaiveDate, NaiveDate)> {
    match (rest.first(), rest.get(1)) {
        (Some(start), Some(end)) => Ok((parse_date(start)?, parse_date(end)?)),
        (None, None) => {
            let year = Local::now().date_naive().year();
            let start = NaiveDate::from_ymd_opt(year, 1, 1).context("invalid year")?;
            let end = NaiveDate::from_ymd_opt(year, 12, 31).context("invalid year")?;
            Ok((start, end))
        }
        _ => bail!("expected both <start> and <end>"),
    }
}

fn warn_similar(matches: &[costa_school::SimilarMatch], kind: &str) {
    for m in matches {
        println!("⚠️  Similar {} already exists: '{}' ({:.0}% match)", kind, m.existing, m.score * 100.0);
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    let mut store = RecordStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    let policy = Box::new(costa_school::FixedCredentialPolicy::from_config(config)?);
    let renderer = ReportRenderer::new(&config.report_title, &config.currency_label);

    let mut app = ui::App::new(&mut store, costa_school::Session::new(policy), renderer, config);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin costa-server --features server");
    std::process::exit(1);
}
