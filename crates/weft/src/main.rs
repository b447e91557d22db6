mod builtin;
mod cli;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use weft_core::config::ConfigService;
use weft_core::engine::{ExecutionEngine, RunOptions, StateStore};
use weft_core::graph::export::{self, ExportFormat, GraphSummary};
use weft_core::hooks::HookBus;
use weft_core::registry::SharedMethodRegistry;
use weft_core::{Error, FlowPlan};

use crate::builtin::TableProvider;
use crate::cli::{CacheCommand, Cli, Command, GraphArgs, MetricsArgs, RunArgs};

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn dispatch(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Graph(args) => graph(args).await,
        Command::Status => status().await,
        Command::Engines => engines().await,
        Command::Metrics(args) => metrics(args).await,
        Command::Cache { command } => cache(command).await,
    }
}

/// Project directory a config file belongs to
fn project_dir(config: &Path) -> PathBuf {
    config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Build the registry with every built-in provider registered
async fn build_registry(hooks: Arc<HookBus>, project: &Path) -> Result<SharedMethodRegistry, Error> {
    let inner = weft_core::MethodRegistry::new().with_disabled_from(project);
    let registry = SharedMethodRegistry::from_registry(inner).with_hooks(hooks);
    registry.scan(Arc::new(TableProvider)).await?;
    Ok(registry)
}

fn compile(config: &Path) -> Result<FlowPlan, Error> {
    ConfigService::new().compile_file(config)
}

async fn run(args: RunArgs) -> Result<(), Error> {
    let project = project_dir(&args.config);
    let flow = compile(&args.config)?;
    let hooks = Arc::new(HookBus::new());
    let registry = build_registry(hooks.clone(), &project).await?;
    let engine = ExecutionEngine::new(registry, hooks).with_state_store(StateStore::new(&project));

    let opts = RunOptions {
        only: if args.only.is_empty() {
            None
        } else {
            Some(args.only.into_iter().collect())
        },
        exclude: args.exclude.into_iter().collect::<HashSet<String>>(),
        resume: args.resume,
        force: args.force,
        cancel: None,
    };

    let report = engine.run(&flow, opts).await?;
    let (succeeded, failed, skipped, cancelled) = report.status_counts();
    println!(
        "flow '{}' finished: {} succeeded, {} failed, {} skipped, {} cancelled",
        report.flow, succeeded, failed, skipped, cancelled
    );
    Ok(())
}

async fn graph(args: GraphArgs) -> Result<(), Error> {
    let flow = compile(&args.config)?;
    let rendered = if args.summary {
        GraphSummary::new(&flow.graph, &flow.plan).render()
    } else {
        let format = ExportFormat::parse(&args.format)
            .ok_or_else(|| Error::Other(format!("unknown graph format '{}'", args.format)))?;
        export::render(&flow.graph, format)
    };
    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .map_err(|e| Error::Other(format!("failed to write '{}': {}", path.display(), e)))?;
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

async fn status() -> Result<(), Error> {
    let hooks = Arc::new(HookBus::new());
    let registry = build_registry(hooks, Path::new(".")).await?;
    let components = registry.components().await;
    println!("registrations: {}", registry.len().await);
    println!("components: {}", components.len());
    for component in components {
        let methods = registry.methods_of(&component).await;
        println!("  {} ({} methods)", component, methods.len());
    }
    Ok(())
}

async fn engines() -> Result<(), Error> {
    let hooks = Arc::new(HookBus::new());
    let registry = build_registry(hooks, Path::new(".")).await?;
    for component in registry.components().await {
        println!("{}", component);
        for method in registry.methods_of(&component).await {
            let engines = registry.list_engines(&component, &method).await?;
            println!("  {} [{}]", method, engines.join(", "));
        }
    }
    Ok(())
}

async fn metrics(args: MetricsArgs) -> Result<(), Error> {
    let project = project_dir(&args.config);
    let state = StateStore::new(&project);
    let Some(report) = state.load_report()? else {
        println!("no recorded run for this project");
        return Ok(());
    };
    match args.format.as_str() {
        "markdown" => print!("{}", report.to_markdown()),
        "json" => println!("{}", report.to_json()),
        other => return Err(Error::Other(format!("unknown metrics format '{}'", other))),
    }
    Ok(())
}

async fn cache(command: CacheCommand) -> Result<(), Error> {
    match command {
        CacheCommand::Plan { config } => {
            let project = project_dir(&config);
            let flow = compile(&config)?;
            let hooks = Arc::new(HookBus::new());
            let registry = build_registry(hooks.clone(), &project).await?;
            let engine =
                ExecutionEngine::new(registry, hooks).with_state_store(StateStore::new(&project));
            engine.preload_signatures().await?;
            for entry in engine.cache_plan(&flow).await? {
                let marker = if entry.hit { "hit " } else { "miss" };
                println!("{} {} {}", marker, entry.step, entry.signature);
            }
            Ok(())
        }
        CacheCommand::Warm { config } => {
            run(RunArgs {
                config,
                only: Vec::new(),
                exclude: Vec::new(),
                resume: false,
                force: false,
            })
            .await
        }
        CacheCommand::Clear { config, steps } => {
            let steps = if steps.is_empty() { None } else { Some(steps) };
            match config {
                Some(config) => {
                    let project = project_dir(&config);
                    let flow = compile(&config)?;
                    let hooks = Arc::new(HookBus::new());
                    let registry = build_registry(hooks.clone(), &project).await?;
                    let engine = ExecutionEngine::new(registry, hooks)
                        .with_state_store(StateStore::new(&project));
                    engine.cache_clear(&flow, steps.as_deref()).await?;
                }
                None => {
                    let state = StateStore::new(Path::new("."));
                    state.clear_signatures(steps.as_deref())?;
                }
            }
            println!("cache cleared");
            Ok(())
        }
    }
}
