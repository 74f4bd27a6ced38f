//! mjit - Source-to-source JIT preprocessor
//!
//! Main CLI entry point: translates one annotated C++ source file, writing
//! the result to a file or stdout. On failure a diagnostic of the form
//! `<file>:<line>: mjit error: <message>` goes to stderr and any partially
//! written output file is removed.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use mjit::{translate, MjitConfig, INPUT_EXTENSIONS};

#[derive(Parser)]
#[command(name = "mjit")]
#[command(version)]
#[command(about = "Rewrites MFEM_KERNEL/MFEM_EMBED/MFEM_TEMPLATE directives into compilable C++", long_about = None)]
struct Cli {
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// External compiler command override
    #[arg(long)]
    cxx: Option<String>,

    /// External compiler flags override
    #[arg(long)]
    flags: Option<String>,

    /// Include directory handed to the external compiler
    #[arg(long)]
    include_dir: Option<String>,

    /// Print a translation summary to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Input source file (.cc .cpp .cxx .h .hpp .cu)
    input: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            // informational exit, distinct from the failure exit code
            let _ = e.print();
            process::exit(2);
        }
        Err(e) => e.exit(),
    };

    if let Err(err) = run(&cli) {
        eprintln!("{err:#}");
        if let Some(output) = &cli.output {
            let _ = fs::remove_file(output);
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ext = cli
        .input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !INPUT_EXTENSIONS.contains(&ext) {
        bail!(
            "mjit error: unrecognized input extension '{}' (expected one of {})",
            cli.input.display(),
            INPUT_EXTENSIONS.join(", ")
        );
    }

    let start_dir = cli
        .input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut cfg = MjitConfig::find_and_load(&start_dir)
        .with_context(|| format!("loading mjit.toml near {}", cli.input.display()))?;
    if let Some(cxx) = &cli.cxx {
        cfg.compiler.command = cxx.clone();
    }
    if let Some(flags) = &cli.flags {
        cfg.compiler.flags = flags.clone();
    }
    if let Some(dir) = &cli.include_dir {
        cfg.paths.include_dir = dir.clone();
    }

    let input = File::open(&cli.input)
        .with_context(|| format!("opening {}", cli.input.display()))?;
    let reader = BufReader::new(input);
    let file_name = cli.input.display().to_string();

    let stats = match &cli.output {
        Some(path) => {
            let out = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(out);
            let mut ctx = mjit::ParseContext::new(reader, &mut writer, file_name);
            let stats = translate::run(&mut ctx, &cfg)?;
            writer.flush()?;
            stats
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let mut ctx = mjit::ParseContext::new(reader, &mut lock, file_name);
            let stats = translate::run(&mut ctx, &cfg)?;
            lock.flush()?;
            stats
        }
    };

    if cli.verbose {
        eprintln!(
            "mjit: {} -> {} ({} kernels, {} templates, {} embeds)",
            cli.input.display(),
            cli.output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<stdout>".to_string()),
            stats.kernels,
            stats.templates,
            stats.embeds
        );
    }
    Ok(())
}
