use clap::{Parser, Subcommand};
use plcctl::executor::locate;
use plcctl::{
    display_from_env, screen, CodeGenerator, Config, DisplayId, Error, Instruction, LlmClient,
    LlmCodeGenerator, LlmPlanner, Orchestrator, RunConfig, ScreenExecutor, StepPlanner,
    TemplateStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plcctl")]
#[command(about = "Drive TIA Portal from a natural-language order")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory holding input_text/, parsed_steps/ and capture/
    #[arg(long, global = true, env = "PLCCTL_ROOT", default_value = ".")]
    root: PathBuf,

    /// Display to act on, numbered from 1 (defaults to MONITOR_ID, then 1)
    #[arg(long, global = true)]
    monitor: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan the stored order and replay the steps
    Run {
        /// Store this order first
        #[arg(long)]
        order: Option<String>,
        /// Give up on a step after this many retries
        #[arg(long)]
        max_retries: Option<u32>,
        /// Seconds to wait before retrying a failed step
        #[arg(long)]
        retry_delay: Option<f64>,
        /// Multiply the retry delay by this after every failure
        #[arg(long)]
        backoff: Option<f64>,
    },
    /// Store the order for the next run
    Order {
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Plan the stored order and print the steps without executing them
    Plan,
    /// Generate SCL code for the stored order and print it
    Generate,
    /// List connected displays
    Displays,
    /// Locate a template on the selected display
    FindTemplate {
        /// Template file name in the capture directory
        name: String,
        #[arg(long)]
        threshold: Option<f32>,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plcctl={},inputctl={}", level, level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    // The credential may live in a .env next to the project
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(err: &Error) -> u8 {
    match err {
        Error::RetriesExhausted { .. } => 2,
        _ => 1,
    }
}

fn dispatch(cli: Cli) -> plcctl::Result<()> {
    let display = match cli.monitor.as_deref() {
        Some(raw) => raw
            .parse::<DisplayId>()
            .map_err(|e| Error::Configuration(format!("--monitor: {}", e)))?,
        None => display_from_env()?,
    };
    let config = Config::load();
    let mut run = RunConfig::resolve(&config, &cli.root, display);

    match cli.command {
        Commands::Run {
            order,
            max_retries,
            retry_delay,
            backoff,
        } => {
            if max_retries.is_some() {
                run.retry.max_retries = max_retries;
            }
            if let Some(secs) = retry_delay {
                run.retry.delay = parse_secs(secs, "--retry-delay")?;
            }
            if let Some(backoff) = backoff {
                run.retry.backoff = backoff;
            }
            run_all(&config, run, order.as_deref())
        }
        Commands::Order { text } => {
            let order = Instruction::store(&run.instruction_path, &text.join(" "))?;
            info!(path = %run.instruction_path.display(), order = %order.preview(80), "Order stored");
            Ok(())
        }
        Commands::Plan => run_plan(&config, &run),
        Commands::Generate => run_generate(&config, &run),
        Commands::Displays => run_displays(),
        Commands::FindTemplate { name, threshold } => {
            run_find_template(&run, &name, threshold.unwrap_or(run.threshold))
        }
    }
}

fn parse_secs(secs: f64, flag: &str) -> plcctl::Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Configuration(format!("{}: {}", flag, e)))
}

fn llm_client(config: &Config) -> plcctl::Result<LlmClient> {
    let client = LlmClient::new(config.llm.to_llm_config()?)?;
    debug!(backend = %config.llm.backend, model = client.config().model(), "LLM client ready");
    Ok(client)
}

fn run_all(config: &Config, run: RunConfig, order: Option<&str>) -> plcctl::Result<()> {
    // Credential problems must surface before anything touches the screen
    let llm = llm_client(config)?;

    if let Some(order) = order {
        Instruction::store(&run.instruction_path, order)?;
    }

    let planner = LlmPlanner::new(&llm, &run.steps_path)
        .with_temperature(config.llm.planner_temperature);
    let generator = LlmCodeGenerator::new(&llm)
        .with_temperature(config.llm.generator_temperature)
        .with_max_tokens(config.llm.generator_max_tokens);
    let executor = ScreenExecutor::new(&run)?;

    let report = Orchestrator::new(planner, generator, executor, run).run()?;
    println!(
        "Done: {} step(s), {} retr{}",
        report.steps(),
        report.retries(),
        if report.retries() == 1 { "y" } else { "ies" }
    );
    Ok(())
}

fn run_plan(config: &Config, run: &RunConfig) -> plcctl::Result<()> {
    let llm = llm_client(config)?;
    let instruction = Instruction::load(&run.instruction_path)?;

    let steps = LlmPlanner::new(&llm, &run.steps_path)
        .with_temperature(config.llm.planner_temperature)
        .plan(&instruction, run.display)?;

    println!("{}", serde_json::to_string_pretty(steps.steps())?);
    eprintln!("Saved to {}", run.steps_path.display());
    Ok(())
}

fn run_generate(config: &Config, run: &RunConfig) -> plcctl::Result<()> {
    let llm = llm_client(config)?;
    let instruction = Instruction::load(&run.instruction_path)?;

    let code = LlmCodeGenerator::new(&llm)
        .with_temperature(config.llm.generator_temperature)
        .with_max_tokens(config.llm.generator_max_tokens)
        .generate(&instruction)?;

    println!("{}", code);
    Ok(())
}

fn run_displays() -> plcctl::Result<()> {
    let displays = screen::list_displays()?;
    if displays.is_empty() {
        eprintln!("No displays found");
    }
    for display in &displays {
        println!("{}", display);
    }
    Ok(())
}

fn run_find_template(run: &RunConfig, name: &str, threshold: f32) -> plcctl::Result<()> {
    let store = TemplateStore::new(&run.template_dir);
    eprintln!("Finding template '{}' on display {}...", name, run.display);

    let target = locate(&store, run.display, name, threshold)?;
    println!("{}", serde_json::to_string_pretty(&target.detection)?);
    eprintln!(
        "Found at desktop ({}, {}) conf={:.3}",
        target.x, target.y, target.detection.confidence
    );
    Ok(())
}
