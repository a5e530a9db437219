mod entity;
mod error;
mod input;

use std::io::Write;

use clap::Parser;
use typemapper::{MapperConfig, MappingRegistry, RowMapper};

use crate::entity::Customer;
use crate::error::CliError;
use crate::input::Row;

#[derive(Parser)]
#[command(name = "typemapper", about = "Map column=value rows onto typed records")]
struct Cli {
    /// Path to TOML configuration file; defaults apply when omitted.
    #[arg(long, env = "TYPEMAPPER_CONFIG")]
    config: Option<String>,

    /// Input file: `column=value` lines, rows separated by blank lines.
    #[arg(long, env = "TYPEMAPPER_INPUT")]
    input: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => {
            tracing::info!(config = %path, "loading configuration");
            MapperConfig::load(path)?
        }
        None => MapperConfig::default(),
    };

    let registry = MappingRegistry::from_config(&config);
    let mapper = RowMapper::new(&registry, config.on_conversion_failure);
    tracing::info!(
        converters = registry.converters().len(),
        policy = ?mapper.policy(),
        "mapper ready"
    );

    let content = std::fs::read_to_string(&cli.input).map_err(|e| CliError::Input {
        path: cli.input.clone(),
        detail: e.to_string(),
    })?;
    let rows = input::parse_rows(&content)?;

    let total = map_rows(&mapper, rows, &mut std::io::stdout().lock())?;
    tracing::info!(rows = total, "done");
    Ok(())
}

/// Map every row onto a `Customer` and write it as one JSON line.
fn map_rows<W: Write>(
    mapper: &RowMapper<'_>,
    rows: Vec<Row>,
    out: &mut W,
) -> Result<usize, CliError> {
    let total = rows.len();
    for (index, row) in rows.into_iter().enumerate() {
        let row_no = index + 1;
        let (customer, report) = mapper
            .map_new::<Customer, _, _, _>(row)
            .map_err(|e| e.with_context(format!("row {row_no}")))?;
        if !report.is_complete() {
            tracing::warn!(
                row = row_no,
                skipped = report.skipped.len(),
                unmatched = ?report.unmatched,
                "row mapped partially"
            );
        }
        serde_json::to_writer(&mut *out, &customer)?;
        writeln!(out)?;
    }
    Ok(total)
}
