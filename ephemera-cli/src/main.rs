use ephemera_cli::catalog::Architecture;
use ephemera_cli::cli::{
    actions, download_bar, render_progress, CliArgs, Commands, ConsoleObserver, Menu,
};
use ephemera_cli::{NAME, VERSION};
use ephemera_core::{HttpFetcher, LifecycleConfig, LifecycleOrchestrator, ProcessLauncher};

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::io;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = if let Some(level_str) = &args.log_level {
            parse_level(level_str)
        } else if args.verbose {
            Level::DEBUG
        } else if args.quiet {
            Level::ERROR
        } else {
            Level::WARN
        };

        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            for directive in [
                format!("ephemera={}", level),
                "hyper=warn".to_string(),
                "reqwest=warn".to_string(),
            ] {
                if let Ok(directive) = directive.parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    });
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to WARN. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::WARN
        }
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = LifecycleConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    debug!("Temp root: {}", config.temp_root().display());

    // Strictly sequential: one workspace and one child process at a time.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(dispatch(args, config))
}

async fn dispatch(args: CliArgs, config: LifecycleConfig) -> Result<()> {
    let arch = Architecture::detect();
    debug!("Detected architecture: {}", arch);

    let bar = download_bar(args.quiet);
    let progress_bar = bar.clone();
    let fetcher = HttpFetcher::new(&config)?
        .with_progress(move |progress| render_progress(&progress_bar, &progress));

    let orchestrator =
        LifecycleOrchestrator::new(config, Arc::new(fetcher), Arc::new(ProcessLauncher))
            .with_observer(Arc::new(ConsoleObserver::new(args.quiet, args.pause, bar)));

    let mut out = io::stdout();
    match &args.command {
        None => {
            // Unbuffered so `--pause` prompts can read stdin between menu lines.
            let mut input = io::BufReader::with_capacity(1, io::stdin());
            Menu::new(&orchestrator, arch)
                .run(&mut input, &mut out)
                .await?
        }
        Some(Commands::List) => actions::list(&mut out, arch)?,
        Some(Commands::Run(run_args)) => {
            actions::run_tool(&orchestrator, arch, &run_args.tool, &mut out).await?
        }
        Some(Commands::RunAll) => actions::run_all(&orchestrator, arch, &mut out).await?,
        Some(Commands::Fetch(fetch_args)) => {
            actions::run_descriptor(&orchestrator, &fetch_args.descriptor(), &mut out).await?
        }
        Some(Commands::Sweep) => actions::sweep(&orchestrator, &mut out)?,
    }

    Ok(())
}
