//! sierraecg CLI — Sierra ECG XLI decompression.

#[cfg(feature = "fast-alloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Args, Parser, Subcommand};
use sierraecg::{rewrite_document, DecodeOptions, EcgRecord, WaveformDocument};
use std::io::{IsTerminal, Read, Write};
use std::process;

#[derive(Parser)]
#[command(name = "sierraecg", about = "Philips Sierra ECG XML decoder (XLI)")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace XLI-compressed waveforms with plain sample text
    Decompress(DecompressArgs),
    /// Print version, leads and sample statistics
    Info(InfoArgs),
}

#[derive(Args)]
struct DecompressArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output file (optional; without -o <stem>.plain.xml, -o - = stdout)
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Args)]
struct InfoArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// JSON output
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CommonArgs {
    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Number of leads to decode (1-16; default: document, then 12)
    #[arg(long)]
    leads: Option<usize>,

    /// Samples per lead (default: document, then 5500)
    #[arg(long)]
    samples: Option<usize>,

    /// Lead duration in milliseconds (default: 11000)
    #[arg(long)]
    duration_ms: Option<u32>,

    /// Fail on leads that expand to fewer bytes than expected
    #[arg(long)]
    strict_length: bool,
}

impl CommonArgs {
    fn to_options(&self) -> DecodeOptions {
        let mut opts = DecodeOptions::default();
        opts.set_lead_count(self.leads);
        opts.set_samples_per_lead(self.samples);
        opts.set_duration_ms(self.duration_ms);
        opts.set_strict_length(self.strict_length);
        opts
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Decompress(args) => run_decompress(args),
        Command::Info(args) => run_info(args),
    }
}

fn read_input(path: &str) -> Result<String, String> {
    if path == "-" {
        if std::io::stdin().is_terminal() {
            eprintln!("reading from stdin (Ctrl+D to finish)...");
        }
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("read error (stdin): {e}"))?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("read error '{path}': {e}"))
    }
}

/// Parses and decodes the input document.
fn load(common: &CommonArgs) -> Result<(String, WaveformDocument, EcgRecord), String> {
    let opts = common.to_options();
    opts.validate().map_err(|e| e.to_string())?;

    let xml = read_input(&common.input)?;
    let doc = WaveformDocument::parse(&xml).map_err(|e| e.to_string())?;
    let record = doc.decode(&opts).map_err(|e| e.to_string())?;
    log::info!(
        "{}: version {}, {} leads decoded",
        common.input,
        record.version(),
        record.valid()
    );
    Ok((xml, doc, record))
}

fn run_decompress(args: DecompressArgs) -> Result<(), String> {
    let (xml, _doc, record) = load(&args.common)?;
    let output = rewrite_document(&xml, &record).map_err(|e| e.to_string())?;

    let output_path = resolve_output_path(args.output.as_deref(), &args.common.input, "plain.xml")?;
    write_to_output(&output_path, |mut writer| {
        writer
            .write_all(output.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| format!("write error: {e}"))
    })
}

fn run_info(args: InfoArgs) -> Result<(), String> {
    let (_xml, doc, record) = load(&args.common)?;
    let mut stdout = std::io::stdout().lock();

    if args.json {
        let leads: Vec<serde_json::Value> = record
            .leads()
            .iter()
            .map(|lead| {
                let (min, max) = lead.min_max().unzip();
                serde_json::json!({
                    "name": lead.name(),
                    "samples": lead.samples().len(),
                    "duration_ms": lead.duration_ms(),
                    "min": min,
                    "max": max,
                })
            })
            .collect();
        let info = serde_json::json!({
            "version": record.version().as_str(),
            "document_type": doc.document_type(),
            "sampling_rate": doc.sampling_rate(),
            "valid": record.valid(),
            "leads": leads,
        });
        let text = serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?;
        writeln!(stdout, "{text}").map_err(|e| format!("write error: {e}"))
    } else {
        write_info_text(&mut stdout, &doc, &record).map_err(|e| format!("write error: {e}"))
    }
}

fn write_info_text(out: &mut impl Write, doc: &WaveformDocument, record: &EcgRecord) -> std::io::Result<()> {
    writeln!(out, "version:       {}", record.version())?;
    if let Some(doc_type) = doc.document_type() {
        writeln!(out, "document type: {doc_type}")?;
    }
    if let Some(rate) = doc.sampling_rate() {
        writeln!(out, "sampling rate: {rate} Hz")?;
    }
    writeln!(out, "leads:         {}", record.valid())?;
    for lead in record.leads() {
        match lead.min_max() {
            Some((min, max)) => writeln!(
                out,
                "  {:<10} {:>6} samples  min {:>6}  max {:>6}",
                lead.name(),
                lead.samples().len(),
                min,
                max
            )?,
            None => writeln!(out, "  {:<10} {:>6} samples", lead.name(), 0)?,
        }
    }
    Ok(())
}

/// Erstellt einen BufWriter fuer stdout oder eine Datei.
fn create_buf_writer(path: &str) -> Result<std::io::BufWriter<Box<dyn Write>>, String> {
    if path == "-" {
        Ok(std::io::BufWriter::new(Box::new(std::io::stdout())))
    } else {
        let file = std::fs::File::create(path).map_err(|e| format!("write error: {e}"))?;
        Ok(std::io::BufWriter::new(Box::new(file)))
    }
}

/// Schreibt Output entweder nach stdout ("-") oder atomar in eine Datei (tmp+rename).
fn write_to_output(
    output_path: &str,
    write_fn: impl FnOnce(std::io::BufWriter<Box<dyn Write>>) -> Result<(), String>,
) -> Result<(), String> {
    if output_path == "-" {
        return write_fn(create_buf_writer("-")?);
    }

    let tmp_path = format!("{output_path}.tmp");
    let writer = create_buf_writer(&tmp_path)?;
    if let Err(e) = write_fn(writer) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, output_path).map_err(|e| format!("rename error: {e}"))
}

fn resolve_output_path(explicit: Option<&str>, input: &str, ext: &str) -> Result<String, String> {
    if let Some(path) = explicit {
        return Ok(path.to_string());
    }
    if input == "-" {
        return Err("reading from stdin requires -o".into());
    }
    let path = std::path::Path::new(input);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "invalid input path".to_string())?;
    let parent = path.parent().unwrap_or_else(|| std::path::Path::new(""));
    Ok(parent.join(format!("{stem}.{ext}")).to_string_lossy().to_string())
}
