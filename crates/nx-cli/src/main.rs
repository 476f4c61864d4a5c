//! # nx-cli
//!
//! Command-line front end for the NXDL template engine.
//!
//! Exit codes: `0` on success, `2` when a conversion is rejected by
//! validation, `1` for every other failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use nx_pipeline::{ConversionConfig, Converter, Inspector, StrictnessLevel};
use nx_schema::SchemaLoader;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nx")]
#[command(about = "NXDL template engine CLI")]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert instrument data into a container
    Convert {
        /// YAML conversion settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Application definition (overrides the config file)
        #[arg(short, long)]
        application: Option<String>,

        /// Schema search path, repeatable
        #[arg(short, long = "schema-path")]
        schema_paths: Vec<PathBuf>,

        /// Base class or definition overlaid on the application, repeatable
        #[arg(long = "mixin")]
        mixins: Vec<String>,

        /// Reader input file, repeatable
        #[arg(short, long = "input")]
        inputs: Vec<PathBuf>,

        /// Mapping file
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Output container (overrides the config file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Reject the conversion on warnings too
        #[arg(long)]
        strict: bool,
    },

    /// Print the template of an application definition
    Template {
        /// Application definition name
        application: String,

        /// Schema search path, repeatable
        #[arg(short, long = "schema-path", required = true)]
        schema_paths: Vec<PathBuf>,

        /// Base class or definition overlaid on the application, repeatable
        #[arg(long = "mixin")]
        mixins: Vec<String>,
    },

    /// Annotate a committed container against its application definition
    Inspect {
        /// Container file
        file: PathBuf,

        /// Schema search path, repeatable
        #[arg(short, long = "schema-path", required = true)]
        schema_paths: Vec<PathBuf>,

        /// Application definition; read from the entry's `definition` when omitted
        #[arg(short, long)]
        application: Option<String>,

        /// Base class or definition overlaid on the application, repeatable
        #[arg(long = "mixin")]
        mixins: Vec<String>,
    },

    /// Rewrite an NXDL XML file in the indentation dialect
    Nxdl2dialect {
        /// NXDL XML file
        input: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite an indentation dialect file as NXDL XML
    Dialect2nxdl {
        /// Dialect file
        input: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            config,
            application,
            schema_paths,
            mixins,
            inputs,
            mapping,
            output,
            strict,
        } => {
            let mut settings = match config {
                Some(path) => ConversionConfig::load(&path)?,
                None => {
                    let (Some(application), Some(output)) = (application.clone(), output.clone())
                    else {
                        bail!("either --config or both --application and --output are required");
                    };
                    ConversionConfig::new(application, output)
                }
            };
            if let Some(application) = application {
                settings.application = application;
            }
            if let Some(output) = output {
                settings.output = output;
            }
            if mapping.is_some() {
                settings.mapping = mapping;
            }
            settings.schema_paths.extend(schema_paths);
            settings.mixins.extend(mixins);
            settings.inputs.extend(inputs);
            if strict {
                settings.strictness = StrictnessLevel::Strict;
            }
            convert(settings)
        }
        Commands::Template {
            application,
            schema_paths,
            mixins,
        } => {
            let loader = SchemaLoader::from_paths(schema_paths);
            let template = nx_template::build_template(&loader, &application, &mixins)?;
            print!("{}", template.dump());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect {
            file,
            schema_paths,
            application,
            mixins,
        } => {
            let mut inspector = Inspector::new(schema_paths).with_mixins(mixins);
            if let Some(application) = application {
                inspector = inspector.with_application(application);
            }
            let report = inspector
                .inspect_file(&file)
                .with_context(|| format!("inspecting {}", file.display()))?;
            print!("{}", report.render());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Nxdl2dialect { input, output } => {
            let xml = read(&input)?;
            let text = nx_dialect::nxdl_to_dialect(&xml)?;
            emit(output.as_deref(), &text)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Dialect2nxdl { input, output } => {
            let text = read(&input)?;
            let xml = nx_dialect::dialect_to_nxdl(&text)?;
            emit(output.as_deref(), &xml)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn convert(settings: ConversionConfig) -> anyhow::Result<ExitCode> {
    tracing::info!(
        application = %settings.application,
        output = %settings.output.display(),
        "Converting"
    );
    match Converter::new(settings).convert() {
        Ok(outcome) => {
            if !outcome.report.is_empty() {
                print!("{}", outcome.report.render());
            }
            println!(
                "Wrote {} ({} groups, {} datasets, {} links, {} attributes)",
                outcome.output.display(),
                outcome.summary.groups,
                outcome.summary.datasets,
                outcome.summary.links,
                outcome.summary.attributes
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => match err.report() {
            Some(report) => {
                print!("{}", report.render());
                eprintln!("{err}");
                Ok(ExitCode::from(2))
            }
            None => Err(err.into()),
        },
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn emit(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote file");
        }
        None => print!("{text}"),
    }
    Ok(())
}
