use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use schemagen::config::GeneratorConfig;
use schemagen::migration::Skeleton;
use schemagen::serializer::DiagramOptions;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "schemagen")]
#[command(about = "Translate Laravel migrations to PlantUML ER diagrams and back")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render migration files as one PlantUML diagram
    ToPuml {
        /// Migration files (`.php`)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate one migration file per table from a PlantUML diagram
    ToMigrations {
        /// Diagram file (`.puml`)
        input: PathBuf,

        /// Output directory (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };

    match cli.command {
        Commands::ToPuml { files, output } => to_puml(&config, &files, output.as_deref()),
        Commands::ToMigrations { input, output } => {
            to_migrations(&config, &input, output.as_deref())
        }
    }
}

fn to_puml(config: &GeneratorConfig, files: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        sources.push(source);
    }

    let diagram =
        schemagen::migrations_to_diagram(&sources, config, DiagramOptions::new(Utc::now()));

    match output {
        Some(path) => {
            fs::write(path, &diagram)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{diagram}"),
    }
    Ok(())
}

fn to_migrations(config: &GeneratorConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let skeleton = match &config.migration_template {
        Some(path) => Skeleton::load(path)?,
        None => Skeleton::default(),
    };

    let files = schemagen::diagram_to_migrations(&source, &skeleton, config, Utc::now())?;

    match output {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            for file in &files {
                let path = dir.join(&file.file_name);
                fs::write(&path, &file.contents)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                log::info!("wrote {}", path.display());
            }
        }
        None => {
            for file in &files {
                println!("// {}", file.file_name);
                print!("{}", file.contents);
            }
        }
    }
    Ok(())
}
