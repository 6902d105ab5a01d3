use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace};

use taskvars::config::{ApiFields, ConfigLoader, FeatureFlags, PlatformPaths};
use taskvars::spec::{Document, Param, ParamValue};
use taskvars::substitution::{self, Bindings, RunContext};
use taskvars::TaskVarsError;

#[derive(Parser)]
#[command(name = "taskvars")]
#[command(about = "Validate and substitute variable references in task templates", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct FlagArgs {
    /// Feature flag file (bare key map or config-map document)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// API tier: alpha, beta or stable
    #[arg(long)]
    api_fields: Option<String>,

    /// Allow enum on string parameters
    #[arg(long)]
    enable_param_enum: bool,

    /// Allow CEL in when expressions
    #[arg(long)]
    enable_cel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every variable reference and declaration in a document
    Validate {
        /// Task or StepAction YAML/JSON document
        file: PathBuf,

        #[command(flatten)]
        flags: FlagArgs,
    },
    /// Print a document with every reference replaced
    Substitute {
        /// Task or StepAction YAML/JSON document
        file: PathBuf,

        /// Parameter value as name=value; `[...]` and `{...}` values are
        /// read as YAML arrays and objects
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,

        /// Run context YAML (task and run names, params, bound workspaces)
        #[arg(long)]
        context: Option<PathBuf>,

        #[command(flatten)]
        flags: FlagArgs,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 2)
        .init();

    debug!("taskvars started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Validate { file, flags } => run_validate(&file, &flags),
        Commands::Substitute {
            file,
            params,
            context,
            flags,
        } => run_substitute(&file, &params, context.as_deref(), &flags),
    };

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e:#}");
        let code = e
            .downcast_ref::<TaskVarsError>()
            .map_or(1, TaskVarsError::exit_code);
        std::process::exit(code);
    }
}

fn load_flags(args: &FlagArgs) -> Result<FeatureFlags> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }
    let mut flags = loader.load()?;

    if let Some(tier) = &args.api_fields {
        flags.enable_api_fields = tier.parse::<ApiFields>()?;
    }
    if args.enable_param_enum {
        flags.enable_param_enum = true;
    }
    if args.enable_cel {
        flags.enable_cel_in_when_expression = true;
    }
    debug!("Using feature flags: {:?}", flags);
    Ok(flags)
}

/// Load, default and validate a document
fn load_valid(file: &Path, flags: &FeatureFlags) -> Result<Document> {
    let mut document = Document::load(file)?;
    let validated = match &mut document {
        Document::Task(task) => {
            task.spec.set_defaults();
            task.validate(flags)
        }
        Document::StepAction(action) => {
            action.spec.set_defaults();
            action.validate(flags)
        }
    };
    validated.map_err(TaskVarsError::validation)?;
    Ok(document)
}

fn run_validate(file: &Path, flag_args: &FlagArgs) -> Result<()> {
    let flags = load_flags(flag_args)?;
    let document = load_valid(file, &flags)?;
    info!("{} {} is valid", document.kind(), document.name());
    println!("{} {:?} is valid", document.kind(), document.name());
    Ok(())
}

fn run_substitute(
    file: &Path,
    raw_params: &[String],
    context: Option<&Path>,
    flag_args: &FlagArgs,
) -> Result<()> {
    let flags = load_flags(flag_args)?;
    let document = load_valid(file, &flags)?;

    let mut run = match context {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read run context {}", path.display()))?;
            serde_yaml::from_str::<RunContext>(&content)
                .with_context(|| format!("Invalid run context {}", path.display()))?
        }
        None => RunContext::default(),
    };
    // command line values win over the context file
    for raw in raw_params {
        let param = parse_param(raw)?;
        run.params.retain(|p| p.name != param.name);
        run.params.push(param);
    }
    if run.task_name.is_empty() {
        run.task_name = document.name().to_string();
    }

    let paths = PlatformPaths::default();
    let rendered = match document {
        Document::Task(mut task) => {
            let bindings = Bindings::for_task(&task.spec, &run.params, &run, &paths)
                .map_err(TaskVarsError::binding)?;
            task.spec = substitution::substitute_task(&task.spec, &bindings)?;
            serde_yaml::to_string(&task)?
        }
        Document::StepAction(mut action) => {
            let bindings = Bindings::for_step_action(
                &action.spec,
                &action.metadata.name,
                &run.params,
                &run,
                &paths,
            )
            .map_err(TaskVarsError::binding)?;
            action.spec = substitution::substitute_step_action(&action.spec, &bindings)?;
            serde_yaml::to_string(&action)?
        }
    };
    print!("{}", rendered);
    Ok(())
}

fn parse_param(raw: &str) -> Result<Param> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid --param {:?}: expected name=value", raw))?;
    let value = if value.starts_with('[') || value.starts_with('{') {
        serde_yaml::from_str::<ParamValue>(value)
            .with_context(|| format!("Invalid value for parameter {:?}", name))?
    } else {
        ParamValue::string(value)
    };
    Ok(Param::new(name, value))
}
