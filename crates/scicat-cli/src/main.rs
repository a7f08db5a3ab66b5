//! scicat CLI
//!
//! Thin command layer over the scicat catalog:
//! - Installing the sciunit / neuronunit schema into a snapshot store
//! - Listing stored models, model kinds and tests from a context
//! - Rebuilding stored models into live instances

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use scicat_graph::GraphStore;
use scicat_schema::{Catalog, CatalogConfig, ContextId, StandardSchema};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scicat")]
#[command(author, version, about = "SciUnit model catalog")]
struct Cli {
    /// JSON configuration file (missing file → defaults)
    #[arg(long, global = true, default_value = "scicat.json")]
    config: PathBuf,
    /// Snapshot file (overrides `store_path`)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Context URI (overrides `default_context`)
    #[arg(long, global = true)]
    context: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schema commands.
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Stored model commands.
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
    /// Stored test commands.
    Test {
        #[command(subcommand)]
        command: TestCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Save the sciunit and neuronunit schema contexts into the store.
    Init,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List stored models visible from the context.
    List,
    /// List the Model kind and its stored subclasses.
    ListKinds {
        /// Print full identifiers instead of `prefix:Name`
        #[arg(long)]
        full: bool,
    },
    /// Rebuild every stored model and print its class and attributes.
    Load,
}

#[derive(Subcommand)]
enum TestCommands {
    /// List stored tests visible from the context.
    List,
}

// ============================================================================
// Session
// ============================================================================

struct Session {
    config: CatalogConfig,
    catalog: Catalog,
    schema: StandardSchema,
    store: GraphStore,
}

impl Session {
    fn open(config: CatalogConfig) -> Result<Self> {
        let catalog = StandardSchema::catalog(config.namespaces());
        let schema = StandardSchema::install(&catalog)?;
        let store = GraphStore::open_or_create(&config.store_path)
            .with_context(|| format!("opening store {}", config.store_path.display()))?;
        Ok(Self {
            config,
            catalog,
            schema,
            store,
        })
    }

    fn context(&self) -> Result<ContextId> {
        Ok(self
            .catalog
            .open_context(&self.config.default_context, &self.store)?)
    }
}

fn load_config(cli: &Cli) -> Result<CatalogConfig> {
    let mut config = CatalogConfig::load_or_default(&cli.config)?;
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    if let Some(context) = &cli.context {
        config.default_context = context.clone();
    }
    Ok(config)
}

fn init_tracing(config: &CatalogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_schema_init(session: &mut Session, out: &mut dyn Write) -> Result<()> {
    for ctx in [session.schema.sciunit, session.schema.neuronunit] {
        let summary = session.catalog.save_context(ctx, &mut session.store)?;
        writeln!(
            out,
            "{} {} ({} types, {} descriptors)",
            "saved".green().bold(),
            session.catalog.contexts().uri(ctx)?,
            summary.types,
            summary.descriptors
        )?;
    }
    session.store.save_to_path(&session.config.store_path)?;
    writeln!(
        out,
        "{} {}",
        "wrote".green().bold(),
        session.config.store_path.display()
    )?;
    Ok(())
}

fn cmd_model_list(session: &Session, out: &mut dyn Write) -> Result<()> {
    let ctx = session.context()?;
    let namespaces = session.catalog.namespaces();
    for record in session.catalog.list_models(ctx, &session.store)? {
        writeln!(
            out,
            "{}\t{}\t{}",
            record.ident,
            namespaces.abbreviate(&record.class),
            record.name.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn cmd_model_list_kinds(session: &Session, full: bool, out: &mut dyn Write) -> Result<()> {
    let ctx = session.context()?;
    for kind in session.catalog.list_model_kinds(ctx, &session.store, full)? {
        writeln!(out, "{kind}")?;
    }
    Ok(())
}

fn cmd_model_load(session: &Session, out: &mut dyn Write) -> Result<()> {
    let ctx = session.context()?;
    let mut failures = 0usize;
    for record in session.catalog.list_models(ctx, &session.store)? {
        match session.catalog.instantiate(ctx, &session.store, &record) {
            Ok(instance) => {
                let attrs: Vec<String> = instance
                    .attrs()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                writeln!(
                    out,
                    "{} {} → {} [{}]",
                    "ok".green().bold(),
                    record.ident,
                    instance.class().descriptor,
                    attrs.join(", ")
                )?;
            }
            Err(err) => {
                failures += 1;
                writeln!(out, "{} {}: {err}", "error".red().bold(), record.ident)?;
            }
        }
    }
    if failures > 0 {
        return Err(anyhow!("{failures} model(s) could not be loaded"));
    }
    Ok(())
}

fn cmd_test_list(session: &Session, out: &mut dyn Write) -> Result<()> {
    let ctx = session.context()?;
    let namespaces = session.catalog.namespaces();
    for test in session.catalog.list_tests(ctx, &session.store)? {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            test.ident,
            namespaces.abbreviate(&test.class),
            test.name.as_deref().unwrap_or("-"),
            test.description.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn run(cli: Cli, config: CatalogConfig, out: &mut dyn Write) -> Result<()> {
    let mut session = Session::open(config)?;
    match cli.command {
        Commands::Schema {
            command: SchemaCommands::Init,
        } => cmd_schema_init(&mut session, out),
        Commands::Model { command } => match command {
            ModelCommands::List => cmd_model_list(&session, out),
            ModelCommands::ListKinds { full } => cmd_model_list_kinds(&session, full, out),
            ModelCommands::Load => cmd_model_load(&session, out),
        },
        Commands::Test {
            command: TestCommands::List,
        } => cmd_test_list(&session, out),
    }
}

fn config_path_hint(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);
    tracing::debug!(config = %config_path_hint(&cli.config), "configuration loaded");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(cli, config, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scicat").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("c.scpd");
        let parsed = cli(&[
            "--config",
            dir.path().join("none.json").to_str().unwrap(),
            "--store",
            store.to_str().unwrap(),
            "--context",
            "urn:ctx1",
            "model",
            "list-kinds",
        ]);
        let config = load_config(&parsed).unwrap();
        assert_eq!(config.store_path, store);
        assert_eq!(config.default_context, "urn:ctx1");
        assert!(matches!(
            parsed.command,
            Commands::Model {
                command: ModelCommands::ListKinds { full: false }
            }
        ));
    }

    #[test]
    fn init_then_list_kinds_from_schema_context() {
        colored::control::set_override(false);
        let dir = tempdir().unwrap();
        let store = dir.path().join("c.scpd");
        let base = |cmd: &[&str]| {
            let mut args = vec![
                "--config",
                "missing.json",
                "--store",
                store.to_str().unwrap(),
                "--context",
                scicat_schema::vocab::BASE_NU_SCHEMA_URL,
            ];
            args.extend_from_slice(cmd);
            cli(&args)
        };

        let parsed = base(&["schema", "init"]);
        let config = load_config(&parsed).unwrap();
        let mut out = Vec::new();
        run(parsed, config, &mut out).unwrap();
        assert!(store.exists());

        let parsed = base(&["model", "list-kinds"]);
        let config = load_config(&parsed).unwrap();
        let mut out = Vec::new();
        run(parsed, config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "sciunit:Model",
                "sciunit:RunnableModel",
                "neuronunit:LEMSModel",
                "neuronunit:ChannelModel",
                "neuronunit:ReducedModel",
            ]
        );
    }
}
