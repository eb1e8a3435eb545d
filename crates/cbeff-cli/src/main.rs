//! cbeff - Convert biometric samples in CBEFF containers to images
//!
//! This tool extracts ISO 19794 records from CBEFF XML or binary
//! containers and has a bio-utils rendering service turn them into images.

mod renderer;

use anyhow::{bail, Context, Result};
use cbeff_core::binary::DEFAULT_SIGNATURE_WINDOW;
use cbeff_core::render::render_result;
use cbeff_core::{
    detect_format, BirSelection, CompressionRatio, Container, ContainerFormat, ExtractionResult,
    Extractor, ExtractorConfig, HealthStatus, ImageRenderer, IsoVersion, KeyedResult, Modality,
};
use clap::{Args, Parser, ValueEnum};
use renderer::HttpRenderer;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Convert biometric samples in CBEFF containers to images
#[derive(Parser, Debug)]
#[command(name = "cbeff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output image path (single-record conversion of one file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output directory for --all-birs and --directory
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Input format
    #[arg(long, value_enum, default_value = "cbeff")]
    format: InputFormat,

    /// Modality to use instead of the detected one (FINGER, IRIS, FACE)
    #[arg(short, long)]
    modality: Option<Modality>,

    /// ISO 19794 version to use instead of the one derived from the modality
    #[arg(long)]
    iso_version: Option<IsoVersion>,

    /// Convert every usable BIR of an XML container
    #[arg(long)]
    all_birs: bool,

    /// Base URL of the rendering service
    #[arg(long, env = "CBEFF_RENDERER_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Image compression ratio (1-100)
    #[arg(short, long, default_value = "95", value_parser = clap::value_parser!(u8).range(1..=100))]
    compression: u8,

    /// Extension of written images
    #[arg(long, default_value = "jpg")]
    extension: String,

    /// Width in bytes of the binary signature scan window
    #[arg(long, default_value_t = DEFAULT_SIGNATURE_WINDOW)]
    signature_window: usize,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only list extracted records without contacting the renderer
    #[arg(long)]
    list_only: bool,

    /// Do not check the renderer before converting
    #[arg(long)]
    skip_health_check: bool,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single container to convert
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of containers to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// What the input files contain
#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormat {
    /// CBEFF XML or binary CBEFF, detected per file
    Cbeff,
    /// A raw ISO 19794 record (requires --modality)
    Iso,
}

#[derive(Default)]
struct RunStats {
    files_processed: usize,
    records_extracted: usize,
    images_written: usize,
    failed: usize,
}

impl RunStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} file(s), {} record(s) extracted, {} image(s) written, {} failed",
            self.files_processed, self.records_extracted, self.images_written, self.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    validate(&cli)?;

    let renderer = if cli.list_only {
        None
    } else {
        let renderer = HttpRenderer::new(&cli.url, Duration::from_secs(cli.timeout))
            .context("Failed to build renderer client")?;
        if !cli.skip_health_check {
            check_health(&renderer);
        }
        Some(renderer)
    };
    let renderer = renderer.as_ref().map(|r| r as &dyn ImageRenderer);

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file, renderer)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory, renderer)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Rejects option combinations clap cannot express
fn validate(cli: &Cli) -> Result<()> {
    if matches!(cli.format, InputFormat::Iso) && cli.modality.is_none() {
        bail!("--format iso requires --modality");
    }
    if cli.input.directory.is_some() && cli.output.is_some() {
        bail!("--output cannot be used with --directory; use --output-dir");
    }
    if cli.input.file.is_some() && !cli.all_birs && !cli.list_only && cli.output.is_none() {
        bail!("--output is required to convert a single record");
    }
    Ok(())
}

fn check_health(renderer: &dyn ImageRenderer) {
    match renderer.health() {
        HealthStatus::Healthy {
            status_code,
            message,
        } => info!("Renderer healthy (HTTP {}): {}", status_code, message.trim()),
        HealthStatus::Unhealthy { error } => {
            warn!("Renderer health check failed, continuing anyway: {}", error)
        }
    }
}

/// Process a single container
fn process_single_file(cli: &Cli, file: &Path, renderer: Option<&dyn ImageRenderer>) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let mut stats = RunStats::default();
    process_file(cli, file, false, renderer, &mut stats)?;

    if !cli.list_only {
        stats.print_summary();
        if stats.failed > 0 {
            bail!("{} record(s) failed to convert", stats.failed);
        }
    }

    Ok(())
}

/// Process a directory of containers recursively
fn process_directory(
    cli: &Cli,
    directory: &Path,
    renderer: Option<&dyn ImageRenderer>,
) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut stats = RunStats::default();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if is_output_image(path, &cli.extension) {
            trace!("Skipping rendered image: {}", path.display());
            continue;
        }

        debug!("Processing container: {}", path.display());
        if let Err(e) = process_file(cli, path, true, renderer, &mut stats) {
            // Log error but continue with other files
            warn!("Error processing {}: {:#}", path.display(), e);
            stats.failed += 1;
        }
    }

    info!("Processed {} file(s)", stats.files_processed);

    if !cli.list_only {
        stats.print_summary();
    }

    Ok(())
}

/// Images written by a previous run share the output extension
fn is_output_image(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("record")
        .to_string()
}

fn keyed(key: String, result: ExtractionResult) -> KeyedResult {
    KeyedResult {
        key,
        subtype: None,
        ordinal: 1,
        result,
    }
}

fn extractor(cli: &Cli) -> Extractor {
    let selection = if cli.all_birs {
        BirSelection::All
    } else {
        BirSelection::First
    };
    Extractor::with_config(
        ExtractorConfig::new()
            .selection(selection)
            .modality_override(cli.modality)
            .iso_version_override(cli.iso_version.clone())
            .signature_window(cli.signature_window),
    )
}

/// Reads a file and extracts the records to convert
fn load_records(cli: &Cli, path: &Path) -> Result<Vec<KeyedResult>> {
    trace!("Reading {}", path.display());
    let data =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;
    trace!("Read {} bytes from {}", data.len(), path.display());

    if let InputFormat::Iso = cli.format {
        let modality = cli.modality.context("--format iso requires --modality")?;
        if data.is_empty() {
            bail!("ISO record is empty: {}", path.display());
        }
        let mut result = ExtractionResult::new(data, modality);
        if let Some(version) = &cli.iso_version {
            result = result.with_iso_version(version.clone());
        }
        return Ok(vec![keyed(file_stem(path), result)]);
    }

    let container = Container::from_raw(&data);
    let extractor = extractor(cli);

    if cli.all_birs {
        if let (ContainerFormat::Xml, Some(text)) = (detect_format(&container), container.as_text())
        {
            if cli.modality.is_some() || cli.iso_version.is_some() {
                debug!("Overrides do not apply to --all-birs; each BIR carries its own modality");
            }
            return extractor
                .extract_all(text)
                .with_context(|| format!("Failed to extract BIRs from {}", path.display()));
        }
        debug!(
            "{} is not CBEFF XML; extracting a single record",
            path.display()
        );
    }

    let result = extractor
        .extract(&container)
        .with_context(|| format!("Failed to extract {}", path.display()))?;
    Ok(vec![keyed(file_stem(path), result)])
}

/// Where the image for one record goes
fn target_path(cli: &Cli, source: &Path, key: &str, batch: bool) -> Result<PathBuf> {
    let image_name = |name: &str| format!("{}.{}", name, cli.extension);
    let path = match (batch, cli.all_birs) {
        (false, false) => cli
            .output
            .clone()
            .context("--output is required to convert a single record")?,
        (false, true) => cli.output_dir.join(image_name(key)),
        (true, false) => cli.output_dir.join(image_name(&file_stem(source))),
        (true, true) => cli
            .output_dir
            .join(file_stem(source))
            .join(image_name(key)),
    };
    Ok(path)
}

/// First 8 hex chars of the blake3 digest
fn short_digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex()[..8].to_string()
}

fn print_record(source: &Path, record: &KeyedResult, batch: bool) {
    let result = &record.result;
    let key = if batch {
        format!("{}:{}", source.display(), record.key)
    } else {
        record.key.clone()
    };
    println!(
        "{}\t{}\t{}\t{} bytes\t{}",
        key,
        result.modality,
        result.iso_version,
        result.bdb.len(),
        short_digest(result.as_bytes())
    );
}

/// Extract, render and write every record of one file
fn process_file(
    cli: &Cli,
    path: &Path,
    batch: bool,
    renderer: Option<&dyn ImageRenderer>,
    stats: &mut RunStats,
) -> Result<()> {
    let records = load_records(cli, path)?;
    stats.files_processed += 1;
    stats.records_extracted += records.len();

    debug!(
        "Extracted {} record(s) from {}",
        records.len(),
        path.display()
    );

    if cli.list_only {
        for record in &records {
            print_record(path, record, batch);
        }
        return Ok(());
    }

    let renderer = renderer.context("No renderer configured")?;
    let ratio = CompressionRatio::new(cli.compression)?;

    for record in &records {
        let target = target_path(cli, path, &record.key, batch)?;
        match convert(renderer, &record.result, ratio, &target, cli.force) {
            Ok(()) => {
                println!("Wrote {}", target.display());
                stats.images_written += 1;
            }
            Err(e) => {
                error!("Failed to convert {}: {:#}", record.key, e);
                stats.failed += 1;
            }
        }
    }

    Ok(())
}

fn convert(
    renderer: &dyn ImageRenderer,
    result: &ExtractionResult,
    ratio: CompressionRatio,
    target: &Path,
    force: bool,
) -> Result<()> {
    if target.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            target.display()
        );
    }

    trace!(
        "Rendering {} byte {} record ({})",
        result.bdb.len(),
        result.modality,
        result.iso_version
    );
    let image = render_result(renderer, result, ratio)?;
    write_image(target, &image)
}

fn write_image(output_path: &Path, image: &[u8]) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(output_path, image)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}
