//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::ar_model_adapter::Ar1Model;
use crate::adapters::cache_adapter::JsonDirCache;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{run_backtest, BacktestRequest, BacktestResult, ModelSpec};
use crate::domain::bars::{build, BarMode, BarSpec, TailPolicy};
use crate::domain::config_validation::{validate_config, RunConfig};
use crate::domain::error::AlphaginiError;
use crate::domain::forecast::{FallbackForecaster, Forecaster};
use crate::domain::ohlcv::PriceBasis;
use crate::domain::timeframe::Timeframe;
use crate::ports::cache_port::CachePort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "alphagini", about = "Threshold bars and forecast-driven backtests")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [data] csv
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Write the JSON result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_cache: bool,
    },
    /// Convert time bars into volume, dollar or tick bars
    Convert {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[command(subcommand)]
        mode: ConvertMode,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range and native interval of a CSV file
    Info {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConvertMode {
    Volume(ThresholdArgs),
    Dollar(ThresholdArgs),
    Tick(ThresholdArgs),
}

#[derive(Args, Debug)]
pub struct ThresholdArgs {
    #[arg(long)]
    pub threshold: f64,
    /// Price used to weight volume in dollar mode
    #[arg(long, default_value = "hlc3")]
    pub price_basis: String,
    /// Discard a final bar that never reached the threshold
    #[arg(long)]
    pub drop_tail: bool,
}

impl ConvertMode {
    pub fn to_spec(&self) -> Result<BarSpec, AlphaginiError> {
        let (mode, args) = match self {
            ConvertMode::Volume(a) => (BarMode::Volume, a),
            ConvertMode::Dollar(a) => (BarMode::Dollar, a),
            ConvertMode::Tick(a) => (BarMode::Tick, a),
        };
        let price_basis: PriceBasis = args.price_basis.parse()?;
        let tail = if args.drop_tail {
            TailPolicy::Drop
        } else {
            TailPolicy::Keep
        };
        let spec = BarSpec::new(mode, args.threshold)
            .with_price_basis(price_basis)
            .with_tail(tail);
        spec.validate()?;
        Ok(spec)
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            csv,
            output,
            no_cache,
        } => run_backtest_command(&config, csv.as_ref(), output.as_ref(), no_cache),
        Command::Convert {
            csv,
            out,
            symbol,
            mode,
        } => run_convert(&csv, &out, symbol.as_deref(), &mode),
        Command::Validate { config } => run_validate(&config),
        Command::Info { csv, symbol } => run_info(&csv, symbol.as_deref()),
    }
}

fn fail(err: AlphaginiError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_run_config(path: &Path) -> Result<RunConfig, AlphaginiError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)
}

/// Resolve a request's model to a forecaster. External models degrade to
/// the naive forecast on failure.
pub fn build_forecaster(spec: &ModelSpec) -> Box<dyn Forecaster> {
    match spec.builtin() {
        Some(kind) => Box::new(kind),
        None => Box::new(FallbackForecaster::new(Ar1Model::new())),
    }
}

/// Load data for `request`, then serve the result from `cache` or run it.
/// Returns the result and whether it came from the cache. Cache entries are
/// keyed by the request and the data source's identity.
pub fn execute_backtest(
    data: &dyn DataPort,
    request: &BacktestRequest,
    cache: Option<&dyn CachePort>,
) -> Result<(BacktestResult, bool), AlphaginiError> {
    request.validate()?;
    let fingerprint = request.fingerprint_for(data.source_id().as_deref())?;

    if let Some(cache) = cache {
        if let Some(hit) = cache.get(&fingerprint)? {
            tracing::info!(%fingerprint, "cache hit");
            return Ok((hit, true));
        }
    }

    let series = data.fetch_bars(request.symbol.as_deref(), request.start, request.end)?;
    tracing::info!(bars = series.len(), "loaded price series");

    let forecaster = build_forecaster(&request.model);
    let mut result = run_backtest(&series, request, forecaster.as_ref())?;
    result.fingerprint = fingerprint.clone();

    if let Some(cache) = cache {
        cache.put(&fingerprint, &result)?;
    }
    Ok((result, false))
}

/// Build threshold bars from `input` and write them to `output`.
/// Returns the number of bars written.
pub fn convert_bars(
    input: &Path,
    output: &Path,
    symbol: Option<&str>,
    spec: &BarSpec,
) -> Result<usize, AlphaginiError> {
    let series = CsvAdapter::new(input.to_path_buf()).fetch_bars(symbol, None, None)?;
    if series.is_empty() {
        return Err(AlphaginiError::empty(format!("bars in {}", input.display())));
    }
    let bars = build(&series, spec)?;
    CsvAdapter::write_bars(output, &bars)?;
    Ok(bars.len())
}

fn run_backtest_command(
    config_path: &Path,
    csv_override: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
    no_cache: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let run_config = match load_run_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    // Stage 2: Resolve data source and cache
    let csv_path = match csv_override
        .cloned()
        .or_else(|| run_config.csv.as_ref().map(PathBuf::from))
    {
        Some(p) => p,
        None => {
            return fail(AlphaginiError::ConfigMissing {
                section: "data".into(),
                key: "csv".into(),
            });
        }
    };
    let data = CsvAdapter::new(csv_path);
    let cache = match (&run_config.cache_dir, no_cache) {
        (Some(dir), false) => Some(JsonDirCache::new(dir)),
        _ => None,
    };

    let request = &run_config.request;
    eprintln!(
        "Running backtest: {} / {} on {}",
        request.model_name(),
        request.strategy_name(),
        data.path().display()
    );

    // Stage 3: Run (or fetch from cache)
    let (result, cached) = match execute_backtest(
        &data,
        request,
        cache.as_ref().map(|c| c as &dyn CachePort),
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    // Stage 4: Console summary
    print_summary(&result, cached);

    // Stage 5: Emit JSON
    let report = JsonReportAdapter::new();
    match output_path {
        Some(path) => match report.write(&result, path) {
            Ok(()) => {
                eprintln!("\nResult written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },
        None => match report.render(&result) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },
    }
}

fn fmt_opt(value: Option<f64>, scale: f64, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{suffix}", v * scale),
        None => "n/a".to_string(),
    }
}

fn print_summary(result: &BacktestResult, cached: bool) {
    let m = &result.metrics;
    eprintln!("\n=== Backtest Results{} ===", if cached { " (cached)" } else { "" });
    if let Some(symbol) = &result.symbol {
        eprintln!("Symbol:           {symbol}");
    }
    eprintln!("Bars:             {} train / {} test", result.train_bars, result.test_bars);
    eprintln!("Total Return:     {:.2}%", m.rel_return * 100.0);
    eprintln!("Abs Return:       {:.2}", m.abs_return);
    eprintln!("CAGR:             {}", fmt_opt(m.cagr, 100.0, "%"));
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino);
    eprintln!("Max Drawdown:     {:.1}%", m.max_drawdown * 100.0);
    eprintln!("Trades:           {}", m.trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);

    eprintln!("\n=== Forecast ({}) ===", result.forecaster);
    eprintln!("RMSE:             {}", fmt_opt(m.rmse, 1.0, ""));
    eprintln!("MAE:              {}", fmt_opt(m.mae, 1.0, ""));
    eprintln!("MAPE:             {}", fmt_opt(m.mape, 1.0, "%"));
    eprintln!("Naive RMSE:       {}", fmt_opt(result.baseline_rmse, 1.0, ""));
}

fn run_convert(input: &Path, output: &Path, symbol: Option<&str>, mode: &ConvertMode) -> ExitCode {
    let spec = match mode.to_spec() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    eprintln!(
        "Building {} bars (threshold {}) from {}",
        spec.mode,
        spec.threshold,
        input.display()
    );
    match convert_bars(input, output, symbol, &spec) {
        Ok(count) => {
            eprintln!("{} bars written to: {}", count, output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let run_config = match load_run_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let request = &run_config.request;
    eprintln!("\nData:");
    eprintln!("  csv:       {}", run_config.csv.as_deref().unwrap_or("(from --csv)"));
    eprintln!("  symbol:    {}", request.symbol.as_deref().unwrap_or("(any)"));
    match request.timeframe {
        Some(tf) => eprintln!("  timeframe: {tf}"),
        None => eprintln!("  timeframe: (inferred)"),
    }
    if let Some(spec) = &request.bars {
        eprintln!("\nBars:");
        eprintln!("  mode:      {}", spec.mode);
        eprintln!("  threshold: {}", spec.threshold);
        eprintln!("  basis:     {}", spec.price_basis);
    }
    eprintln!("\nRun:");
    eprintln!("  model:     {}", request.model_name());
    eprintln!("  strategy:  {}", request.strategy_name());
    eprintln!("  cash:      {}", request.initial_cash);
    eprintln!("  lookback:  {} days", request.lookback_days);
    if let Some(dir) = &run_config.cache_dir {
        eprintln!("  cache:     {dir}");
    }
    match request.fingerprint() {
        Ok(fp) => eprintln!("  request:   {fp}"),
        Err(e) => return fail(e),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(csv_path: &Path, symbol: Option<&str>) -> ExitCode {
    let adapter = CsvAdapter::new(csv_path.to_path_buf());

    let symbols = match adapter.list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if !symbols.is_empty() && symbol.is_none() {
        println!("symbols: {}", symbols.join(", "));
    }

    match adapter.data_range(symbol) {
        Ok(Some((first, last, count))) => {
            println!("{}: {} bars, {} to {}", symbol.unwrap_or("all"), count, first, last);
        }
        Ok(None) => {
            eprintln!("{}: no data found", symbol.unwrap_or("all"));
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail(e),
    }

    let series = match adapter.fetch_bars(symbol, None, None) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    match Timeframe::infer(&series) {
        Ok(tf) => println!("interval: {tf} ({:.0} periods/year)", tf.periods_per_year()),
        Err(e) => eprintln!("interval: unknown ({e})"),
    }
    ExitCode::SUCCESS
}
