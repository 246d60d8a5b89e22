//! Command-line interface for the harvester.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{validate_date, HarvestConfig};
use crate::converter::OaiDcConverter;
use crate::error::{HarvesterError, Result};
use crate::fetcher::RecordFetcher;
use crate::retrieval::{run_retrieval, RetrievalReport};
use crate::sink::{CheckpointStore, FileCheckpoint, JsonLinesSink, MemoryCheckpoint, RecordSink};

/// PFR Harvester - Retrieve paper metadata from an OAI-PMH archive.
#[derive(Parser)]
#[command(name = "pfr-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest records and write them as JSON lines.
    ///
    /// Settings not given on the command line are read from the ARX_*
    /// environment variables.
    Harvest {
        /// Archive set to harvest (e.g., cs)
        #[arg(short, long)]
        set: Option<String>,

        /// Start date in YYYY-MM-DD format, used when no checkpoint exists
        #[arg(long)]
        start_date: Option<String>,

        /// Maximum number of records, 0 for no limit
        #[arg(short, long)]
        limit: Option<i64>,

        /// OAI-PMH endpoint
        #[arg(long)]
        host: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// File holding the time of the last successful retrieval
        #[arg(short, long)]
        checkpoint: Option<PathBuf>,
    },

    /// Convert a saved ListRecords response to JSON lines.
    Convert {
        /// Path to the XML response
        file: PathBuf,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest {
            set,
            start_date,
            limit,
            host,
            output,
            checkpoint,
        } => {
            let overrides = Overrides {
                set,
                start_date,
                limit,
                host,
            };
            harvest_command(&overrides, output.as_deref(), checkpoint.as_deref())
        }
        Commands::Convert { file } => convert_command(&file),
    }
}

/// Command-line values taking precedence over the environment.
#[derive(Debug, Default)]
struct Overrides {
    set: Option<String>,
    start_date: Option<String>,
    limit: Option<i64>,
    host: Option<String>,
}

impl Overrides {
    fn lookup(&self, key: &str) -> Option<String> {
        let value = match key {
            "ARX_SET" => self.set.clone(),
            "ARX_START_DATE" => self.start_date.clone(),
            "ARX_LIMIT" => self.limit.map(|l| l.to_string()),
            "ARX_HOST" => self.host.clone(),
            _ => None,
        };
        value.or_else(|| std::env::var(key).ok())
    }
}

/// Execute the harvest command.
fn harvest_command(
    overrides: &Overrides,
    output: Option<&Path>,
    checkpoint: Option<&Path>,
) -> Result<()> {
    if let Some(date) = overrides.start_date.as_deref() {
        validate_date(date)?;
    }
    let config = HarvestConfig::from_lookup(|key| overrides.lookup(key))?;

    eprintln!(
        "{} set {} from {} ({})",
        style("Harvesting").bold(),
        style(&config.set).cyan(),
        style(config.host.as_str()).green(),
        config
            .record_limit()
            .map_or_else(|| "no limit".to_string(), |l| format!("limit {l}"))
    );

    let fetcher = RecordFetcher::from_config(config)?;

    let mut checkpoint: Box<dyn CheckpointStore> = match checkpoint {
        Some(path) => Box::new(FileCheckpoint::new(path)),
        None => Box::new(MemoryCheckpoint::default()),
    };

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut sink = JsonLinesSink::new(writer);

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message("Requesting first page...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = run_retrieval(fetcher, &mut sink, checkpoint.as_mut(), |progress| {
        pb.set_message(format!(
            "{} / {} records (page {})",
            progress.total,
            progress.complete_list_size.as_deref().unwrap_or("?"),
            progress.page
        ));
    });
    pb.finish_and_clear();

    let report = result?;
    sink.into_inner()?;
    print_report(&report, output);
    Ok(())
}

fn print_report(report: &RetrievalReport, output: Option<&Path>) {
    eprintln!("  From: {}", report.from);
    eprintln!("  Pages: {}", report.pages);
    eprintln!("  Records: {}", style(report.records).green());
    if let Some(path) = output {
        eprintln!();
        eprintln!("{} {}", style("Saved to:").green().bold(), path.display());
    }
}

/// Execute the convert command.
fn convert_command(file: &Path) -> Result<()> {
    if !file.is_file() {
        return Err(HarvesterError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Input file does not exist: {}", file.display()),
        )));
    }

    let data = std::fs::read(file)?;
    let page = OaiDcConverter::new().convert_bytes(&data)?;

    let mut sink = JsonLinesSink::new(BufWriter::new(io::stdout().lock()));
    for record in &page.records {
        sink.push(record)?;
    }
    sink.into_inner()?;

    eprintln!(
        "{} {} records{}",
        style("Converted").bold(),
        style(page.len()).green(),
        page.next_token()
            .map(|t| format!(", resumption token {}", style(t).cyan()))
            .unwrap_or_default()
    );
    Ok(())
}
