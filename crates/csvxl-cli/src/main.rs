use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser as ClapParser, Subcommand};
use csvxl::{Configuration, CsvParser, CsvWriter, ExcelParser, ExcelWriter, Parser, Writer};

#[derive(ClapParser)]
#[command(about = "Convert between worksheet ranges and CSV text.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the rows of a worksheet as CSV.
    ToCsv {
        /// Workbook to read.
        input: PathBuf,

        #[command(flatten)]
        placement: Placement,

        /// Write CSV here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Emit stored values instead of evaluating formulas.
        #[arg(long)]
        no_calculate: bool,
    },
    /// Write the records of a CSV file into a worksheet.
    FromCsv {
        /// CSV file to read.
        input: PathBuf,

        /// Workbook to create or update.
        output: PathBuf,

        #[command(flatten)]
        placement: Placement,

        /// Escape fields that a spreadsheet would treat as formulas.
        #[arg(long)]
        sanitize: bool,
    },
}

#[derive(Args)]
struct Placement {
    /// Worksheet name (default: first sheet when reading, `Export` when writing).
    #[arg(long)]
    sheet: Option<String>,

    /// Rows to skip before the first record.
    #[arg(long, default_value_t = 0)]
    row_offset: u32,

    /// Columns to skip before the first field.
    #[arg(long, default_value_t = 0)]
    column_offset: u32,

    /// Field delimiter of the CSV side.
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl Placement {
    fn configuration(&self) -> Result<Configuration> {
        if !self.delimiter.is_ascii() {
            anyhow::bail!("delimiter must be a single ASCII character, got '{}'", self.delimiter);
        }
        Ok(Configuration {
            delimiter: self.delimiter as u8,
            ..Configuration::default()
        })
    }
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::ToCsv {
            input,
            placement,
            output,
            no_calculate,
        } => {
            let config = Configuration {
                calculate_formulas: !no_calculate,
                ..placement.configuration()?
            };
            let mut parser = ExcelParser::from_path(&input, placement.sheet.as_deref(), config.clone())
                .with_context(|| format!("open {}", input.display()))?;
            parser.set_row_offset(placement.row_offset);
            parser.set_column_offset(placement.column_offset);

            let sink: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path).with_context(|| format!("create {}", path.display()))?,
                )),
                None => Box::new(io::stdout().lock()),
            };
            let mut writer = CsvWriter::new(sink, &config)?;
            let rows = copy_records(&mut parser, &mut writer)?;
            writer.into_inner()?.flush()?;
            parser.close();
            log::debug!("wrote {rows} CSV record(s) from {}", input.display());
        }
        Command::FromCsv {
            input,
            output,
            placement,
            sanitize,
        } => {
            let config = Configuration {
                sanitize_for_injection: sanitize,
                ..placement.configuration()?
            };
            let file = File::open(&input).with_context(|| format!("open {}", input.display()))?;
            let mut parser = CsvParser::new(BufReader::new(file), &config)?;
            let mut writer = ExcelWriter::from_path(&output, placement.sheet.as_deref(), config)
                .with_context(|| format!("open {}", output.display()))?;
            writer.set_row_offset(placement.row_offset);
            writer.set_column_offset(placement.column_offset);

            let rows = copy_records(&mut parser, &mut writer)?;
            writer
                .close()
                .with_context(|| format!("save {}", output.display()))?;
            log::debug!("wrote {rows} row(s) to {}", output.display());
        }
    }
    Ok(())
}

/// Copy every record, header included, from `parser` to `writer`.
fn copy_records(parser: &mut impl Parser, writer: &mut impl Writer) -> Result<usize> {
    let mut rows = 0;
    while let Some(record) = parser.read()? {
        writer.write_record(record.iter().map(Option::as_deref))?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}
