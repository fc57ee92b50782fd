//! cellpatch CLI - write JSON records into an XLSX worksheet

use anyhow::{Context, Result};
use cellpatch::{
    read_manifest, read_sheet_cells, update_with_options, Manifest, Record, SheetLookup,
    UpdateOptions,
};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cellpatch")]
#[command(author, version, about = "Patch worksheet cells of an XLSX workbook from JSON records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write records into successive rows of a sheet
    Apply {
        /// Input workbook (.xlsx)
        input: PathBuf,

        /// Output workbook, replaced if it exists
        #[arg(short, long)]
        output: PathBuf,

        /// Display name of the sheet to patch (exact match)
        #[arg(short, long)]
        sheet: String,

        /// JSON file holding an array of objects mapping column letters to values
        #[arg(short, long)]
        records: PathBuf,

        /// Treat row 1 as a data row
        #[arg(long)]
        no_skip_header: bool,

        /// Map sheets to parts by declaration order instead of relationships
        #[arg(long)]
        positional: bool,
    },

    /// List all sheets in a workbook: position, sheetId and name
    Sheets {
        /// Input workbook
        input: PathBuf,
    },

    /// Print every cell of a sheet as reference, type and value
    Cells {
        /// Input workbook
        input: PathBuf,

        /// Display name of the sheet
        #[arg(short, long)]
        sheet: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            input,
            output,
            sheet,
            records,
            no_skip_header,
            positional,
        } => {
            let options = UpdateOptions {
                skip_header: !no_skip_header,
                sheet_lookup: if positional {
                    SheetLookup::Positional
                } else {
                    SheetLookup::Relationships
                },
            };
            apply(&input, &output, &sheet, &records, &options)
        }
        Commands::Sheets { input } => list_sheets(&input),
        Commands::Cells { input, sheet } => show_cells(&input, &sheet),
    }
}

fn apply(
    input: &Path,
    output: &Path,
    sheet: &str,
    records_path: &Path,
    options: &UpdateOptions,
) -> Result<()> {
    let file = File::open(records_path)
        .with_context(|| format!("Failed to open '{}'", records_path.display()))?;
    let records: Vec<Record> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse records from '{}'", records_path.display()))?;
    tracing::debug!("loaded {} record(s)", records.len());

    let report = update_with_options(input, output, &records, sheet, options)
        .with_context(|| format!("Failed to update '{}'", input.display()))?;

    println!("Total rows updated: {}", report.rows_updated);
    if report.rows_updated < records.len() {
        eprintln!(
            "Warning: {} record(s) not written, sheet has no more data rows",
            records.len() - report.rows_updated
        );
    }
    println!("Wrote '{}'", output.display());

    Ok(())
}

fn list_sheets(input: &Path) -> Result<()> {
    let manifest =
        read_manifest(input).with_context(|| format!("Failed to open '{}'", input.display()))?;

    for line in sheet_lines(&manifest) {
        println!("{}", line);
    }

    Ok(())
}

fn sheet_lines(manifest: &Manifest) -> Vec<String> {
    manifest
        .sheets()
        .iter()
        .enumerate()
        .map(|(i, sheet)| {
            let id = sheet
                .sheet_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!("{}\t{}\t{}", i + 1, id, sheet.name)
        })
        .collect()
}

fn show_cells(input: &Path, sheet: &str) -> Result<()> {
    let cells = read_sheet_cells(input, sheet, SheetLookup::Relationships)
        .with_context(|| format!("Failed to read sheet '{}' of '{}'", sheet, input.display()))?;

    for cell in cells {
        println!(
            "{}\t{}\t{}",
            cell.reference,
            cell.cell_type.as_deref().unwrap_or("-"),
            cell.value.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
