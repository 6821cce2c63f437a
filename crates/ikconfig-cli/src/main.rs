//! extract-ikconfig - Extract the embedded .config from compiled Linux kernel images
//!
//! This tool decompresses a kernel image, locates the `IKCFG_ST` section
//! written by `CONFIG_IKCONFIG` and prints the configuration it carries.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use ikconfig_core::{CompressionFormat, KernelConfigMap, KernelImage};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Extract the embedded .config from compiled Linux kernel images
#[derive(Parser, Debug)]
#[command(name = "extract-ikconfig")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Kernel image (vmlinux, vmlinuz, bzImage, ...) or a directory of images
    path: PathBuf,

    /// Compression of the kernel image: gzip, bzip2, lzma, xz, lzo, lz4, zstd,
    /// none, or unknown to detect it from the image's magic bytes
    #[arg(short, long, default_value = "unknown")]
    compression: CompressionFormat,

    /// Output format
    #[arg(long, value_enum, default_value = "config")]
    format: OutputFormat,

    /// Only print these keys (may be repeated)
    #[arg(short, long = "key", value_name = "KEY")]
    keys: Vec<String>,

    /// Keep the decompressed image and print its path
    #[arg(long)]
    keep: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Output format for the extracted configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Parsed KEY=VALUE lines, sorted by key
    Config,
    /// The embedded .config exactly as stored
    Raw,
}

fn main() -> ExitCode {
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
        .with_writer(io::stderr)
        .init();

    let result = if cli.path.is_dir() {
        process_directory(&cli, &cli.path)
    } else {
        process_single_file(&cli, &cli.path)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Process a single kernel image
fn process_single_file(cli: &Cli, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let mut out = io::stdout().lock();
    process_image(cli, file, &mut out)
}

/// Process every regular, non-hidden file below a directory
fn process_directory(cli: &Cli, directory: &Path) -> Result<()> {
    info!("Scanning directory: {}", directory.display());

    let mut out = io::stdout().lock();
    let mut processed = 0;
    let mut failed = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            trace!("Skipping hidden file: {}", path.display());
            continue;
        }

        debug!("Processing image: {}", path.display());
        writeln!(out, "==> {} <==", path.display())?;
        if let Err(e) = process_image(cli, path, &mut out) {
            // Log error but continue with other images
            warn!("Error processing {}: {:#}", path.display(), e);
            failed += 1;
        }
        processed += 1;
    }

    info!("Processed {} images, {} failed", processed, failed);

    if failed > 0 {
        bail!("{} of {} images failed", failed, processed);
    }
    Ok(())
}

/// Extract and print the configuration of one image
fn process_image(cli: &Cli, path: &Path, out: &mut impl Write) -> Result<()> {
    let mut kernel = KernelImage::open(path, cli.compression)
        .with_context(|| format!("Failed to open kernel image: {}", path.display()))?;

    let text = kernel
        .config_text()
        .with_context(|| format!("Failed to extract config from {}", path.display()))?;

    if let (Some(format), Some(offset)) =
        (kernel.resolved_compression(), kernel.payload_offset())
    {
        info!(
            "{}: {} compressed payload at offset {:#x}",
            path.display(),
            format,
            offset
        );
    }

    let config = KernelConfigMap::parse(&text);
    debug!("{} config entries", config.len());

    if cli.keys.is_empty() {
        match cli.format {
            OutputFormat::Raw => out.write_all(text.as_bytes())?,
            OutputFormat::Config => write_config(&config, out)?,
        }
    } else {
        write_keys(&config, &cli.keys, cli.format, out)?;
    }

    if cli.keep {
        if let Some(kept) = kernel.keep_decompressed() {
            eprintln!("Decompressed image kept at {}", kept.display());
        }
    }

    Ok(())
}

/// Write all entries as sorted KEY=VALUE lines
fn write_config(config: &KernelConfigMap, out: &mut impl Write) -> io::Result<()> {
    for (key, value) in config.iter() {
        writeln!(out, "{}={}", key, value)?;
    }
    Ok(())
}

/// Write the requested keys, failing if any is absent
fn write_keys(
    config: &KernelConfigMap,
    keys: &[String],
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    for key in keys {
        let value = config.get(key)?;
        match format {
            OutputFormat::Config => writeln!(out, "{}={}", key, value)?,
            OutputFormat::Raw => writeln!(out, "{}", value)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn kernel_image(config: &str) -> Vec<u8> {
        let mut image = vec![0u8; 512];
        image.extend_from_slice(b"IKCFG_ST");
        image.extend_from_slice(&gzip(config.as_bytes()));
        image.extend_from_slice(b"IKCFG_ED");
        gzip(&image)
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("extract-ikconfig").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_process_image_config_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vmlinuz");
        fs::write(&path, kernel_image("CONFIG_B=y\n# comment\nCONFIG_A=\"x\"\n")).unwrap();

        let cli = cli(&[path.to_str().unwrap()]);
        let mut out = Vec::new();
        process_image(&cli, &path, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "CONFIG_A=\"x\"\nCONFIG_B=y\n");
    }

    #[test]
    fn test_process_image_raw_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vmlinuz");
        let text = "# comment\nCONFIG_B=y\n";
        fs::write(&path, kernel_image(text)).unwrap();

        let cli = cli(&["--format", "raw", "-c", "gzip", path.to_str().unwrap()]);
        let mut out = Vec::new();
        process_image(&cli, &path, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), text);
    }

    #[test]
    fn test_process_image_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vmlinuz");
        fs::write(&path, kernel_image("CONFIG_HZ=250\nCONFIG_SMP=y\n")).unwrap();

        let cli_ok = cli(&["-k", "CONFIG_HZ", path.to_str().unwrap()]);
        let mut out = Vec::new();
        process_image(&cli_ok, &path, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "CONFIG_HZ=250\n");

        let cli_missing = cli(&["-k", "CONFIG_NOPE", path.to_str().unwrap()]);
        assert!(process_image(&cli_missing, &path, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_unsupported_compression_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vmlinuz");
        fs::write(&path, kernel_image("CONFIG_HZ=250\n")).unwrap();

        let cli = cli(&["-c", "lz4", path.to_str().unwrap()]);
        assert!(process_image(&cli, &path, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_compression_argument() {
        assert_eq!(cli(&["x"]).compression, CompressionFormat::Unknown);
        assert_eq!(cli(&["-c", "zst", "x"]).compression, CompressionFormat::Zstd);
        assert_eq!(
            cli(&["--compression", "BZIP2", "x"]).compression,
            CompressionFormat::Bzip2
        );
        assert!(Cli::try_parse_from(["extract-ikconfig", "-c", "brotli", "x"]).is_err());
    }

    #[test]
    fn test_process_image_after_setup_stub() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bzImage");
        let mut image = vec![0x4du8; 0x2000];
        image.extend_from_slice(&kernel_image("CONFIG_HZ=100\n"));
        fs::write(&path, image).unwrap();

        let cli = cli(&[path.to_str().unwrap()]);
        let mut out = Vec::new();
        process_image(&cli, &path, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "CONFIG_HZ=100\n");
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
