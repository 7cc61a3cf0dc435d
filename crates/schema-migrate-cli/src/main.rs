//! schema-migrate CLI - cross-paradigm database schema migration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use schema_migrate::{
    adapter_for, parse_program, Database, MigrationProgram, Paradigm, TransformEngine,
    TransformOutcome,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "schema-migrate")]
#[command(about = "Cross-paradigm database schema migration")]
#[command(version)]
struct Cli {
    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a schema, run a migration program, export the result
    Migrate {
        /// Source schema file (.sql, .json, or canonical .model.json)
        schema: PathBuf,

        /// Migration program file
        #[arg(short, long)]
        migration: PathBuf,

        /// Source format: relational, document, or model
        /// [default: inferred from the schema file extension]
        #[arg(long)]
        from: Option<String>,

        /// Target format: relational, document, or model
        /// [default: the program's TO clause]
        #[arg(long)]
        to: Option<String>,

        /// Output file [default: stdout]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the canonical model for a schema, optionally after a program
    Inspect {
        /// Schema file (.sql, .json, or canonical .model.json)
        schema: PathBuf,

        /// Migration program to apply before printing
        #[arg(short, long)]
        migration: Option<PathBuf>,

        /// Source format override
        #[arg(long)]
        from: Option<String>,
    },

    /// Parse a migration program and report errors
    Check {
        /// Migration program file
        migration: PathBuf,
    },
}

/// A schema representation the CLI can read or write: a paradigm's native
/// format, or the canonical model as JSON.
#[derive(Clone, Copy)]
enum Format {
    Native(Paradigm),
    Model,
}

impl Format {
    fn parse(name: &str) -> anyhow::Result<Self> {
        if name.eq_ignore_ascii_case("model") {
            return Ok(Format::Model);
        }
        Paradigm::parse(name)
            .map(Format::Native)
            .ok_or_else(|| anyhow!("unknown format '{name}' (expected relational, document, graph, columnar, or model)"))
    }

    /// Infer from a file name: `.sql` is relational DDL, `.model.json` is
    /// the canonical model, any other `.json` is a document schema.
    fn infer(path: &Path) -> anyhow::Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if name.ends_with(".sql") {
            Ok(Format::Native(Paradigm::Relational))
        } else if name.ends_with(".model.json") {
            Ok(Format::Model)
        } else if name.ends_with(".json") {
            Ok(Format::Native(Paradigm::Document))
        } else {
            bail!("cannot infer schema format of {path:?}; pass --from")
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity);

    match cli.command {
        Commands::Migrate {
            schema,
            migration,
            from,
            to,
            output,
        } => {
            let program = load_program(&migration)?;
            let db = import_schema(&schema, from.as_deref(), program.source)?;

            let outcome = TransformEngine::new(db).run(&program.operations);
            report_diagnostics(&outcome);
            if let Some(failure) = outcome.failure {
                bail!("{failure}");
            }

            let target = match to.as_deref() {
                Some(name) => Format::parse(name)?,
                None => Format::Native(program.target.ok_or_else(|| {
                    anyhow!("program has no TO clause; pass --to")
                })?),
            };
            let rendered = export_schema(&outcome.database, target)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered)
                        .with_context(|| format!("writing {path:?}"))?;
                    info!(path = ?path, "wrote migrated schema");
                }
                None => print!("{rendered}"),
            }
        }

        Commands::Inspect {
            schema,
            migration,
            from,
        } => {
            let mut db = import_schema(&schema, from.as_deref(), None)?;
            if let Some(path) = migration {
                let program = load_program(&path)?;
                let outcome = TransformEngine::new(db).run(&program.operations);
                report_diagnostics(&outcome);
                if let Some(failure) = outcome.failure {
                    bail!("{failure}");
                }
                db = outcome.database;
            }
            print_database(&db);
        }

        Commands::Check { migration } => {
            let program = load_program(&migration)?;
            println!(
                "{} v{}: {} operations OK",
                program.name,
                program.version,
                program.operations.len()
            );
        }
    }

    Ok(())
}

fn load_program(path: &Path) -> anyhow::Result<MigrationProgram> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let program = parse_program(&text).with_context(|| format!("parsing {path:?}"))?;
    info!(
        name = %program.name,
        operations = program.operations.len(),
        "parsed migration program"
    );
    Ok(program)
}

fn import_schema(
    path: &Path,
    explicit: Option<&str>,
    program_source: Option<Paradigm>,
) -> anyhow::Result<Database> {
    let format = match explicit {
        Some(name) => Format::parse(name)?,
        None => Format::infer(path).or_else(|e| program_source.map(Format::Native).ok_or(e))?,
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let db_name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("database")
        .to_string();
    let db = match format {
        Format::Model => Database::from_json(&text)?,
        Format::Native(paradigm) => adapter_for(paradigm)?.import(&text, &db_name)?,
    };
    info!(entities = db.entity_types.len(), "imported schema");
    Ok(db)
}

fn export_schema(db: &Database, format: Format) -> anyhow::Result<String> {
    Ok(match format {
        Format::Model => db.to_json()?,
        Format::Native(paradigm) => adapter_for(paradigm)?.export(db)?,
    })
}

fn report_diagnostics(outcome: &TransformOutcome) {
    for diag in &outcome.diagnostics {
        eprintln!("note (operation {}): {}", diag.operation_index, diag.message);
    }
}

fn print_database(db: &Database) {
    println!("database: {} ({:?}, v{})", db.name, db.paradigm, db.version);
    for entity in db.entity_types.values() {
        println!("\n[entity] {}", entity.full_name());
        for attr in &entity.attributes {
            let mut marks = String::new();
            if attr.is_key {
                marks.push_str(" (PK)");
            }
            if attr.is_optional {
                marks.push_str(" (optional)");
            }
            println!("  - {}: {:?}{}", attr.name, attr.data_type, marks);
        }
        for rel in &entity.relationships {
            let kind = if rel.is_aggregate() {
                "embeds"
            } else {
                "references"
            };
            println!(
                "  - {} {} {} [{:?}]",
                rel.name(),
                kind,
                rel.target(),
                rel.cardinality()
            );
        }
        for key in &entity.keys {
            println!("  - key {:?} ({})", key.kind, key.attributes.join(", "));
        }
    }
    for reltype in db.relationship_types.values() {
        println!(
            "\n[edge] {}: {} -> {}",
            reltype.name, reltype.source, reltype.target
        );
    }
}

fn setup_logging(verbosity: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
