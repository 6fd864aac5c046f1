//! retention-runner: headless churn scoring runner.
//!
//! Usage:
//!   retention-runner --seed 42 --customers 1000 --db retention.db
//!   retention-runner --data-dir ./data --ipc-mode

use anyhow::Result;
use retention_core::{
    engine::RetentionEngine,
    intervention::InterventionConfig,
    population,
    store::RetentionStore,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Score {
        customer_id: String,
    },
    Simulate {
        customer_id:          String,
        #[serde(default)]
        planned_discount:     f64,
        #[serde(default)]
        loyalty_points_bonus: u64,
    },
    Compare {
        customer_id: String,
        strategy_a:  InterventionConfig,
        strategy_b:  InterventionConfig,
    },
    Outreach {
        customer_id:       String,
        intervention_type: String,
        #[serde(default)]
        details:           String,
    },
    Rank,
    TopRisk {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Summary,
    Quit,
}

fn default_limit() -> usize {
    10
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let customers = parse_arg(&args, "--customers", 1000usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    if !ipc_mode {
        println!("Retention engine: retention-runner");
        println!("  seed:      {seed}");
        println!("  customers: {customers}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let store = RetentionStore::open(db)?;
    store.migrate()?;

    let engine = RetentionEngine::build(data_dir, None)?;
    store.replace_competitor_prices(engine.competitors().records())?;

    if store.customer_count()? == 0 {
        let generated = population::generate(customers, seed);
        store.upsert_customers(&generated)?;
        log::info!("runner: seeded {} customers from seed {seed}", generated.len());
    }

    let batch_id = run_batch(&engine, &store)?;

    if ipc_mode {
        run_ipc_loop(&engine, &store)?;
    } else {
        print_summary(&engine, &store, &batch_id)?;
    }

    Ok(())
}

/// Rank every stored customer and persist the top slice.
fn run_batch(engine: &RetentionEngine, store: &RetentionStore) -> Result<String> {
    let population = store.all_customers()?;
    let outcome = engine.rank_batch(&population);
    let batch_id = uuid::Uuid::new_v4().to_string();
    store.replace_at_risk_customers(&batch_id, &outcome.ranked, chrono::Utc::now())?;
    log::info!(
        "runner: batch {batch_id} stored {} at-risk customers ({} skipped)",
        outcome.ranked.len(),
        outcome.skipped.len(),
    );
    Ok(batch_id)
}

fn run_ipc_loop(engine: &RetentionEngine, store: &RetentionStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }
        match handle_command(engine, store, cmd) {
            Ok(reply) => writeln!(stdout, "{reply}")?,
            Err(e) => write_error(&mut stdout, &e.to_string())?,
        }
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &RetentionEngine, store: &RetentionStore, cmd: IpcCommand) -> Result<serde_json::Value> {
    let reply = match cmd {
        IpcCommand::Score { customer_id } => {
            serde_json::to_value(engine.score_customer(store, &customer_id)?)?
        }
        IpcCommand::Simulate { customer_id, planned_discount, loyalty_points_bonus } => {
            let result = engine.simulate_customer(store, &customer_id, planned_discount, loyalty_points_bonus)?;
            serde_json::to_value(result)?
        }
        IpcCommand::Compare { customer_id, strategy_a, strategy_b } => {
            serde_json::to_value(engine.compare_customer(store, &customer_id, &strategy_a, &strategy_b)?)?
        }
        IpcCommand::Outreach { customer_id, intervention_type, details } => {
            let features = retention_core::directory::lookup(store, &customer_id)?;
            serde_json::to_value(engine.draft_outreach(&features, &intervention_type, &details))?
        }
        IpcCommand::Rank => {
            let batch_id = run_batch(engine, store)?;
            serde_json::json!({ "batch_id": batch_id, "stored": store.at_risk_count()? })
        }
        IpcCommand::TopRisk { limit } => serde_json::to_value(store.top_at_risk(limit)?)?,
        IpcCommand::Summary => serde_json::to_value(engine.portfolio_summary(&store.all_customers()?))?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(reply)
}

fn write_error(stdout: &mut io::Stdout, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(stdout, "{err_json}")?;
    stdout.flush()?;
    Ok(())
}

fn print_summary(engine: &RetentionEngine, store: &RetentionStore, batch_id: &str) -> Result<()> {
    let summary = engine.portfolio_summary(&store.all_customers()?);

    println!("=== PORTFOLIO SUMMARY ===");
    println!("  batch_id:        {batch_id}");
    println!("  customers:       {}", summary.total_customers);
    println!("  avg churn prob:  {:.3}", summary.avg_churn_probability);
    println!("  high risk:       {}", summary.high_risk_count);
    println!("  medium risk:     {}", summary.medium_risk_count);
    println!("  low risk:        {}", summary.low_risk_count);
    println!("  est. revenue:    ${:.0}", summary.total_revenue_est);

    println!();
    println!("=== TOP AT-RISK CUSTOMERS ===");
    let top = store.top_at_risk(10)?;
    if top.is_empty() {
        println!("  (No customers ranked)");
    } else {
        for c in &top {
            println!(
                "  {} | {:.3} | {} | {}",
                c.customer_id,
                c.churn_probability,
                c.churn_risk,
                c.factors.first().map(String::as_str).unwrap_or("-"),
            );
        }
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
