//! Mask the personal information in one document.
//!
//! Prints the chosen view to stdout, or writes an export.
//!
//! Usage:
//!   mask_document resume.docx
//!   mask_document --preset strict --view diff resume.pdf.txt
//!   mask_document --keyword Acme --disable address --export docx --output masked.docx resume.docx
//!   mask_document --extractor pdftotext-stdin scanned.doc
//!
//! Set `RUST_LOG=debug` (or pass `--verbose`) for pipeline logging.

use careermask::config::PipelineConfig;
use careermask::detect::{Category, KeywordSet};
use careermask::export::ExportTarget;
use careermask::external::ExternalExtractor;
use careermask::format::Format;
use careermask::pipeline::{Document, Pipeline};
use careermask::policy::{CategoryPolicy, Preset};
use careermask::view::{ViewKind, ViewSynchronizer};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
Usage: mask_document [OPTIONS] <FILE>

Options:
  --format <ID>        Input format (txt, md, html, rtf, csv, json,
                       spreadsheet, doc, docx, odt, or any known
                       extension); sniffed when omitted
  --preset <ID>        basic | standard | strict (default: standard)
  --keyword <WORD>     Extra literal to mask (repeatable)
  --ignore-case        Match keywords case-insensitively
  --enable <CATEGORY>  Enable a category (repeatable)
  --disable <CATEGORY> Disable a category (repeatable)
  --view <ID>          raw | masked | diff (default: masked)
  --export <TARGET>    text | markdown | csv | xlsx | docx | pdf
  --output <PATH>      Write the export here (default: <FILE>.masked.<ext>)
  --config <PATH>      Pipeline configuration (JSON)
  --extractor <PROG>   External text extractor used when decoding finds
                       too little text (reads the file on stdin)
  --summary            Print span counts per category to stderr
  --verbose, -v        Debug logging
  --help, -h           Show this help";

struct CliArgs {
    input: PathBuf,
    format: Option<Format>,
    preset: Preset,
    keywords: Vec<String>,
    ignore_case: bool,
    enable: Vec<Category>,
    disable: Vec<Category>,
    view: ViewKind,
    export: Option<ExportTarget>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    extractor: Option<String>,
    summary: bool,
    verbose: bool,
}

impl CliArgs {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut input = None;
        let mut parsed = CliArgs {
            input: PathBuf::new(),
            format: None,
            preset: Preset::Standard,
            keywords: Vec::new(),
            ignore_case: false,
            enable: Vec::new(),
            disable: Vec::new(),
            view: ViewKind::Masked,
            export: None,
            output: None,
            config: None,
            extractor: None,
            summary: false,
            verbose: false,
        };

        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            let mut value = || -> Result<String, String> {
                i += 1;
                args.get(i).cloned().ok_or_else(|| format!("{} needs a value", arg))
            };
            match arg {
                "--format" => {
                    let id = value()?;
                    parsed.format = Some(Format::from_id(&id).ok_or_else(|| format!("unknown format '{}'", id))?);
                },
                "--preset" => {
                    let id = value()?;
                    parsed.preset = Preset::from_id(&id).ok_or_else(|| format!("unknown preset '{}'", id))?;
                },
                "--keyword" => parsed.keywords.push(value()?),
                "--ignore-case" => parsed.ignore_case = true,
                "--enable" => parsed.enable.push(category(&value()?)?),
                "--disable" => parsed.disable.push(category(&value()?)?),
                "--view" => {
                    let id = value()?;
                    parsed.view = ViewKind::from_id(&id).ok_or_else(|| format!("unknown view '{}'", id))?;
                },
                "--export" => {
                    let id = value()?;
                    parsed.export =
                        Some(ExportTarget::from_id(&id).ok_or_else(|| format!("unknown export target '{}'", id))?);
                },
                "--output" | "-o" => parsed.output = Some(PathBuf::from(value()?)),
                "--config" => parsed.config = Some(PathBuf::from(value()?)),
                "--extractor" => parsed.extractor = Some(value()?),
                "--summary" => parsed.summary = true,
                "--verbose" | "-v" => parsed.verbose = true,
                "--help" | "-h" => return Err(String::new()),
                other if other.starts_with('-') => return Err(format!("unknown option '{}'", other)),
                other => input = Some(PathBuf::from(other)),
            }
            i += 1;
        }

        parsed.input = input.ok_or_else(|| "missing input file".to_string())?;
        Ok(parsed)
    }
}

fn category(id: &str) -> Result<Category, String> {
    Category::from_id(id).ok_or_else(|| format!("unknown category '{}'", id))
}

fn run(args: CliArgs) -> careermask::Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_str(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::with_config(config);

    let mut policy = CategoryPolicy::from_preset(args.preset);
    for c in &args.enable {
        policy.set_enabled(*c, true);
    }
    for c in &args.disable {
        policy.set_enabled(*c, false);
    }
    let keywords = KeywordSet::from_keywords(args.keywords.iter().cloned(), args.ignore_case);

    let mut document = Document::new(fs::read(&args.input)?);
    if let Some(name) = args.input.file_name() {
        document = document.with_file_name(name.to_string_lossy());
    }
    if let Some(format) = args.format {
        document = document.with_format(format);
    }
    log::info!("processing {} as {}", args.input.display(), document.resolved_format());

    let normalized = match &args.extractor {
        Some(program) => {
            let runtime = tokio::runtime::Runtime::new()?;
            let extractor = ExternalExtractor::new(program.as_str());
            runtime
                .block_on(pipeline.process_with_fallback(&document, &policy, &keywords, &extractor))?
                .normalized
        },
        None => pipeline.decode(&document)?,
    };
    let mut view = ViewSynchronizer::new(normalized, pipeline.detector(), keywords, policy)?;
    for warning in &view.normalized().warnings {
        eprintln!("warning: {}", warning);
    }
    if args.summary {
        for (category, count) in view.summary() {
            eprintln!("{:>16}: {}", category.id(), count);
        }
    }

    match args.export {
        Some(target) => {
            let text = view.view_text(ViewKind::Masked)?;
            let bytes = careermask::export::export(&text, &view.normalized().offset_map, target)?;
            let output = args
                .output
                .clone()
                .unwrap_or_else(|| args.input.with_extension(format!("masked.{}", target.extension())));
            fs::write(&output, bytes)?;
            eprintln!("wrote {}", output.display());
        },
        None => {
            view.switch_view(args.view)?;
            println!("{}", view.active_text()?);
        },
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = match CliArgs::from_args() {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("error: {}\n", message);
            }
            eprintln!("{}", USAGE);
            return if message.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            };
        },
    };

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        },
    }
}
