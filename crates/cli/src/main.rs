//! CLI tool for generating personalized certificates from a PowerPoint template.

use anyhow::{Context, Result};
use certgen_convert::{Converter, LibreOffice};
use certgen_core::{Error, ExportSummary, OutputFormat};
use certgen_export::{
    available_formats, ExportEvent, Exporter, ARCHIVE_CONTENT_TYPE, ARCHIVE_FILENAME,
};
use certgen_pptx::{read_slides, Template};
use certgen_xlsx::ParticipantReader;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Generate one certificate per participant from a template with {{NOMBRE}}.
#[derive(Parser, Debug)]
#[command(name = "certgen")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the columns of a participant spreadsheet
    Columns {
        /// Participant spreadsheet (.xlsx)
        participants: PathBuf,

        /// Sheet to read (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// List the output formats available on this machine
    Formats {
        /// Converter program to use instead of searching PATH for soffice
        #[arg(long)]
        converter: Option<PathBuf>,
    },

    /// Show a template's slide text and how many markers it contains
    Inspect {
        /// Template presentation (.pptx)
        template: PathBuf,
    },

    /// Generate the certificates into a ZIP archive
    Generate(GenerateArgs),
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Template presentation (.pptx) containing {{NOMBRE}}
    #[arg(short, long)]
    template: PathBuf,

    /// Participant spreadsheet (.xlsx)
    #[arg(short, long)]
    participants: PathBuf,

    /// Spreadsheet column holding the names
    #[arg(short, long)]
    column: String,

    /// Sheet to read (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Output format of each certificate
    #[arg(short, long, value_enum, default_value_t = FormatArg::Pptx)]
    format: FormatArg,

    /// Converter program to use instead of searching PATH for soffice
    #[arg(long)]
    converter: Option<PathBuf>,

    /// Archive to write
    #[arg(short, long, default_value = ARCHIVE_FILENAME)]
    output: PathBuf,

    /// Print a JSON summary instead of a status line
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    /// PowerPoint, as the template
    #[value(alias = "native")]
    Pptx,
    /// PDF, converted with LibreOffice
    #[value(alias = "fixed-layout")]
    Pdf,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pptx => OutputFormat::Native,
            FormatArg::Pdf => OutputFormat::FixedLayout,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let result = match args.command {
        Command::Columns {
            ref participants,
            ref sheet,
        } => list_columns(participants, sheet.as_deref()),
        Command::Formats { ref converter } => list_formats(converter.as_deref()),
        Command::Inspect { ref template } => inspect_template(template),
        Command::Generate(ref generate_args) => generate(generate_args, args.verbose),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Print the column names of a participant spreadsheet.
fn list_columns(path: &Path, sheet: Option<&str>) -> Result<()> {
    let list = read_participants(path, sheet)?;
    for column in list.columns() {
        println!("{}", column);
    }
    Ok(())
}

/// Print each output format and whether it can be produced here.
fn list_formats(converter_path: Option<&Path>) -> Result<()> {
    let converter = locate_converter(converter_path);
    let available = available_formats(Some(&converter as &dyn Converter));

    for format in OutputFormat::ALL {
        match (available.contains(&format), converter.program()) {
            (true, Some(program)) if format.requires_conversion() => {
                println!("{} (via {})", format, program.display())
            }
            (true, _) => println!("{}", format),
            (false, _) => println!("{} (unavailable: LibreOffice not found)", format),
        }
    }
    Ok(())
}

/// Print a template's slide text and marker statistics.
fn inspect_template(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    for slide in read_slides(&bytes)? {
        println!("Slide {}:", slide.number);
        for text in slide.texts() {
            for line in text.lines() {
                println!("  {}", line);
            }
        }
    }

    let template = Template::parse(bytes)?;
    println!(
        "Markers: {} replaceable, {} split across formatting runs",
        template.marker_count(),
        template.split_marker_count()
    );
    Ok(())
}

/// Run a full export and write the archive.
fn generate(args: &GenerateArgs, verbose: bool) -> Result<()> {
    // both inputs are read exactly once
    let template_bytes = fs::read(&args.template)
        .with_context(|| format!("Failed to read template {}", args.template.display()))?;
    let list = read_participants(&args.participants, args.sheet.as_deref())?;
    let names = list.names(&args.column)?;

    let format = OutputFormat::from(args.format);
    let converter = locate_converter(args.converter.as_deref());
    let exporter = Exporter::new(template_bytes)?.with_converter(&converter);

    let mut entries = Vec::new();
    let archive = exporter.export_all_with(&names, format, |event| match event {
        ExportEvent::Started { total } => {
            if verbose {
                eprintln!("Generating {} certificate(s) as {}", total, format);
            }
        }
        ExportEvent::Generated { index, filename, .. } => {
            if verbose {
                eprintln!("  [{}/{}] {}", index + 1, names.len(), filename);
            }
        }
        // the error itself is reported once, by main
        ExportEvent::Failed { index, name, .. } => {
            eprintln!("Certificate {} ({:?}) failed", index + 1, name);
        }
        ExportEvent::Finished { entries: written } => entries = written.to_vec(),
    })?;

    write_output(&args.output, &archive)?;

    if args.json {
        let summary = ExportSummary {
            archive: args.output.display().to_string(),
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            format,
            entries,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Generated {} certificate(s) into {}",
            entries.len(),
            args.output.display()
        );
    }

    Ok(())
}

/// Read a participant spreadsheet from disk.
fn read_participants(path: &Path, sheet: Option<&str>) -> Result<certgen_core::ParticipantList> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut reader = ParticipantReader::new();
    if let Some(sheet) = sheet {
        reader = reader.with_sheet(sheet);
    }

    Ok(reader.parse(Cursor::new(bytes))?)
}

/// The converter given on the command line, or whatever is on PATH.
fn locate_converter(path: Option<&Path>) -> LibreOffice {
    let converter = match path {
        Some(program) => LibreOffice::with_program(program),
        None => LibreOffice::locate(),
    };
    if !converter.is_available() {
        log::debug!("PDF output unavailable: no usable converter");
    }
    converter
}

/// Write the archive to a file.
fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}

const IO_HEADLINE: &str = "A file could not be read or written.";

/// A user-facing message for each kind of failure.
fn describe_error(err: &anyhow::Error) -> String {
    let headline = match err.downcast_ref::<Error>() {
        Some(Error::MalformedTemplate(_)) => "The template is not a readable PowerPoint (.pptx) file.",
        Some(Error::ConverterUnavailable(_)) => {
            "PDF output needs LibreOffice (soffice), which is not available. Install it or use --format pptx."
        }
        Some(Error::ConversionFailed(_)) => {
            "Converting a certificate to PDF failed. No archive was written."
        }
        Some(Error::InvalidSpreadsheet(_)) => "The participant list is not a readable Excel (.xlsx) file.",
        Some(Error::ColumnNotFound { .. }) => "The chosen name column does not exist.",
        Some(Error::Io(_)) => IO_HEADLINE,
        Some(Error::Unexpected(_)) => "Unexpected failure.",
        // reading and writing files from the CLI reports plain io errors
        None if err.downcast_ref::<std::io::Error>().is_some() => IO_HEADLINE,
        None => "Unexpected failure.",
    };
    format!("Error: {}\n  {:#}", headline, err)
}
