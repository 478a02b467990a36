//! Command-line driver evaluating command trees against a simulated editor.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use crate::app::context::{ExecutionContext, SelectionAccess};
use crate::app::evaluator::Evaluator;
use crate::app::registry::{CommandRegistry, Dispatch};
use crate::domain::model::{Outcome, Selection};
use crate::infra::config::Config;
use crate::infra::editor::{DocumentState, SimulatedEditor};
use crate::infra::loader::{load_document, load_tree};
use crate::infra::logging;
use crate::infra::providers::builtin_providers;

#[derive(Parser)]
#[command(name = "cmdtree", author, version, about = "Evaluate nested editor command trees", long_about = None)]
pub struct Cli {
    /// Use this configuration file instead of the global and workspace layers
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the first command whose scope passes
    Run(EvalArgs),
    /// Run every command whose scope passes and collect each result
    Execute(EvalArgs),
    /// Validate a command tree and print it normalized
    Check { tree: PathBuf },
    /// Print shell completions
    Completions { shell: Shell },
}

#[derive(Args)]
struct EvalArgs {
    /// Command tree file (.json, .yaml, .yml)
    tree: PathBuf,
    /// Editor document with selections and active context keys
    #[arg(long)]
    document: Option<PathBuf>,
    #[arg(long, value_enum)]
    dispatch: Option<Dispatch>,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Run,
    Execute,
}

/// Output of `run` and `execute`.
#[derive(Debug, Serialize)]
pub struct Report {
    pub result: Outcome,
    pub selections: Vec<Selection>,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    logging::init(&config.logging.filter());

    match cli.command {
        Commands::Run(args) => print_report(&evaluate(&config, args, Mode::Run).await?),
        Commands::Execute(args) => print_report(&evaluate(&config, args, Mode::Execute).await?),
        Commands::Check { tree } => {
            let tree = load_tree(&tree)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "cmdtree", &mut io::stdout());
            Ok(())
        }
    }
}

async fn evaluate(config: &Config, args: EvalArgs, mode: Mode) -> Result<Report> {
    let tree = load_tree(&args.tree)?;
    let state = match &args.document {
        Some(path) => load_document(path)?,
        None => DocumentState::default(),
    };

    let editor = SimulatedEditor::new(state);
    let registry = CommandRegistry::from_config(&config.extensions, &builtin_providers())?;
    let dispatch = args.dispatch.unwrap_or(config.defaults.dispatch());
    let executor = registry.executor(dispatch, &editor);
    let cx = ExecutionContext::from_host(&editor).with_executor(&executor);
    let evaluator = Evaluator::new(config.evaluator.options());

    tracing::debug!(?mode, ?dispatch, tree = %args.tree.display(), "evaluating command tree");
    let result = match mode {
        Mode::Run => evaluator.run(&cx, &tree).await?,
        Mode::Execute => evaluator.execute(&cx, &tree).await?,
    };

    Ok(Report {
        result,
        selections: editor.selections(),
    })
}

fn print_report(report: &Report) -> Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}
