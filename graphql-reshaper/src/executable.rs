//! Main entry point of the `reshaper` command.

use std::fs;
use std::io::IsTerminal;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::configuration::Configuration;
use crate::configuration::generate_config_schema;
use crate::json_ext::Object;
use crate::query;
use crate::reshaper::Reshaper;

/// Options for the reshaper
#[derive(Parser, Debug)]
#[command(
    name = "reshaper",
    about = "Rewrites GraphQL requests for an upstream schema",
    version
)]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace).
    #[arg(
        long = "log",
        default_value = "info",
        alias = "log-level",
        env = "RESHAPER_LOG"
    )]
    log_level: String,

    /// Configuration file.
    #[arg(short, long = "config", env = "RESHAPER_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Schema the requests are validated against.
    #[arg(short, long = "schema", env = "RESHAPER_SCHEMA_PATH")]
    schema_path: Option<PathBuf>,

    /// Operation to reshape when the request defines several.
    #[arg(long)]
    operation_name: Option<String>,

    /// Request variables as a JSON object.
    #[arg(long)]
    variables: Option<String>,

    /// Prints the reshaped query tree as JSON instead of the query.
    #[arg(long)]
    tree: bool,

    /// Prints the configuration schema.
    #[arg(long)]
    print_config_schema: bool,

    /// Request file, read from standard input when missing or `-`.
    query: Option<PathBuf>,
}

/// This is the reshaper entrypoint.
pub fn main() -> Result<()> {
    let opt = Opt::parse();

    if opt.print_config_schema {
        let schema = generate_config_schema();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    // stdout carries the result, logs go to stderr
    let builder = tracing_subscriber::fmt::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_new(&opt.log_level).context("could not parse log configuration")?,
        );
    let initialized = if std::io::stderr().is_terminal() {
        builder.try_init()
    } else {
        builder.json().try_init()
    };
    initialized.map_err(|err| anyhow!(err))?;

    let configuration = match &opt.config_path {
        Some(path) => read_configuration(path)?,
        None => Configuration::default(),
    };
    let schema = match &opt.schema_path {
        Some(path) => {
            let sdl = fs::read_to_string(path)
                .with_context(|| format!("could not read schema {}", path.display()))?;
            Some(Arc::new(query::parse_schema(&sdl)?))
        }
        None => None,
    };
    let variables = match &opt.variables {
        Some(variables) => serde_json::from_str::<Object>(variables)
            .context("variables must be a JSON object")?,
        None => Object::new(),
    };
    let source = read_query(opt.query.as_deref())?;

    let reshaper = Reshaper::builder()
        .configuration(configuration)
        .and_schema(schema)
        .build();
    let request = reshaper
        .reshape(&source, opt.operation_name.as_deref(), &variables)
        .context("could not reshape the request")?;
    tracing::info!(introspection = request.introspection, "request reshaped");

    if opt.tree {
        println!("{}", serde_json::to_string_pretty(&request.transformed)?);
    } else {
        println!("{}", request.query);
    }
    Ok(())
}

fn read_configuration(path: &Path) -> Result<Configuration> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("could not read configuration {}", path.display()))?;
    content
        .parse()
        .with_context(|| format!("invalid configuration {}", path.display()))
}

fn read_query(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("could not read request {}", path.display())),
        _ => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("could not read request from standard input")?;
            Ok(source)
        }
    }
}
