//! ledger-runner: headless driver for the LedgerLens analytics engine.
//!
//! Usage:
//!   ledger-runner --data-dir ./csv_exports --scope supplier
//!   ledger-runner --config ledgerlens.json --forecast --months 6 --token "Bearer abc"
//!   ledger-runner --sqlite ledger.db --ipc-mode

use anyhow::{Context, Result};
use ledgerlens_core::{
    config::{DataSource, EngineConfig},
    engine::AnalyticsEngine,
    finance::HttpFinanceClient,
    service::{classification_body, AnalyticsService, ApiResponse},
    types::PartyScope,
};
use std::env;
use std::io::{self, BufRead, Write};

/// One request per stdin line. `authorization` carries the full header value.
#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Classify {
        #[serde(default = "default_scope")]
        scope: PartyScope,
        #[serde(default)]
        authorization: Option<String>,
    },
    PredictBudget {
        #[serde(default)]
        authorization: Option<String>,
        #[serde(default)]
        months: Option<String>,
    },
    Quit,
}

fn default_scope() -> PartyScope {
    PartyScope::Client
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = build_config(&args)?;
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let forecast_mode = args.iter().any(|a| a == "--forecast");

    let finance = HttpFinanceClient::new(&config.finance)
        .context("Cannot build finance client")?;
    let service = AnalyticsService::new(AnalyticsEngine::new(config), Box::new(finance));

    if ipc_mode {
        return run_ipc_loop(&service);
    }

    print_banner(service.engine().config());
    if forecast_mode {
        let token = flag_value(&args, "--token");
        let months = flag_value(&args, "--months");
        let response = service.predict_budget(token, months);
        print_forecast(&response)?;
    } else {
        let scope: PartyScope = flag_value(&args, "--scope")
            .unwrap_or("client")
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let run = service.engine().classify(scope)?;
        println!("{}", serde_json::to_string_pretty(&classification_body(&run))?);
        println!();
        print_classification(&run);
    }
    Ok(())
}

fn build_config(args: &[String]) -> Result<EngineConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::for_csv_dir("./csv_exports"),
    };
    if let Some(dir) = flag_value(args, "--data-dir") {
        config.data_source = DataSource::Csv { dir: dir.into() };
    }
    if let Some(path) = flag_value(args, "--sqlite") {
        config.data_source = DataSource::Sqlite { path: path.into() };
    }
    config.seed = parse_arg(args, "--seed", config.seed);
    config.validate()?;
    Ok(config)
}

fn run_ipc_loop(service: &AnalyticsService) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();
    log::info!("IPC mode: reading requests from stdin");

    loop {
        buffer.clear();
        if handle.read_line(&mut buffer)? == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Classify {
                scope,
                authorization,
            } => service.classify(authorization.as_deref(), scope),
            IpcCommand::PredictBudget {
                authorization,
                months,
            } => service.predict_budget(authorization.as_deref(), months.as_deref()),
        };
        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_banner(config: &EngineConfig) {
    println!("LedgerLens: ledger-runner");
    match &config.data_source {
        DataSource::Csv { dir } => println!("  source:    csv {}", dir.display()),
        DataSource::Sqlite { path } => println!("  source:    sqlite {}", path.display()),
    }
    println!("  seed:      {}", config.seed);
    println!("  segments:  {}", config.segment_count);
    println!("  finance:   {}", config.finance.budget_url());
    println!();
}

fn print_classification(run: &ledgerlens_core::engine::ClassificationRun) {
    println!("=== {} CLASSIFICATION ===", run.scope.key_name().to_uppercase());
    println!("  parties:          {}", run.parties.len());
    println!("  train / test:     {} / {}", run.report.train_size, run.report.test_size);
    println!("  labelled good:    {}", run.report.positive_labels);
    println!("  predicted good:   {}", run.report.predicted_positive);
    println!();
    println!("=== SEGMENTS (worst to best payers) ===");
    for s in &run.segments {
        println!(
            "  segment {} | members: {:>4} | mean ratio: {:.1}%",
            s.segment,
            s.members,
            s.mean_payment_ratio * 100.0
        );
    }
    println!();
    println!("=== FEATURE IMPORTANCE ===");
    for (name, imp) in ledgerlens_core::aggregator::FEATURE_NAMES
        .iter()
        .zip(&run.report.feature_importances)
    {
        println!("  {name:<14} {imp:.3}");
    }
}

fn print_forecast(response: &ApiResponse) -> Result<()> {
    if !response.is_success() {
        anyhow::bail!(
            "forecast failed ({}): {}",
            response.status,
            response.body["message"].as_str().unwrap_or("unknown error")
        );
    }
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    println!();
    println!("=== BUDGET FORECAST ===");
    let predictions = response.body["predictions"].as_array().cloned().unwrap_or_default();
    for p in predictions {
        println!(
            "  {} | brut: {:>12.2} | net: {:>12.2} | expenses: {:>12.2} | balance: {:>12.2}",
            p["month"].as_str().unwrap_or("?"),
            p["total_income_brut"].as_f64().unwrap_or(0.0),
            p["total_income_net"].as_f64().unwrap_or(0.0),
            p["total_expenses"].as_f64().unwrap_or(0.0),
            p["net_balance"].as_f64().unwrap_or(0.0),
        );
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
