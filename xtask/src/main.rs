use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Workspace tasks for pspx")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Formatting, lints and the full test run, stopping at the first failure
    Ci {
        /// Print the time each step took
        #[arg(long)]
        timings: bool,
    },
    /// Format the workspace
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Lint every target with warnings denied
    Clippy,
    /// Run one test suite, or all of them
    Test {
        #[arg(value_enum)]
        suite: Option<Suite>,
        /// Doc tests only
        #[arg(long, conflicts_with = "suite")]
        doc: bool,
    },
    /// Run the dispatch benchmarks
    Bench {
        /// Only benchmarks whose name contains this
        filter: Option<String>,
    },
    /// Run a flat guest image through the pspx binary
    Run {
        image: PathBuf,
        /// Instruction budget
        #[arg(short = 'n', long, default_value_t = 10_000_000)]
        instructions: u64,
        /// Back kernel timers with the host clock instead of the virtual one
        #[arg(long)]
        host_clock: bool,
        #[arg(long)]
        release: bool,
    },
}

/// Groups of tests that can run on their own
#[derive(Clone, Copy, ValueEnum)]
enum Suite {
    /// Instruction translation and block linking
    Cpu,
    /// Thread manager, waits and timers
    Kernel,
    /// Guest address space
    Memory,
    /// Syscall table and the dispatch loop
    System,
    /// Guest programs under tests/
    Integration,
}

impl Suite {
    fn cargo_args(self) -> &'static [&'static str] {
        match self {
            Suite::Cpu => &["--lib", "core::cpu"],
            Suite::Kernel => &["--lib", "core::kernel"],
            Suite::Memory => &["--lib", "core::memory"],
            Suite::System => &["--lib", "core::system"],
            Suite::Integration => &["--tests"],
        }
    }
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Ci { timings } => ci(timings),
        Commands::Fmt { check } => fmt(check),
        Commands::Clippy => clippy(),
        Commands::Test { suite, doc } => test(suite, doc),
        Commands::Bench { filter } => {
            let mut args = vec!["bench", "--bench", "dispatch_bench"];
            if let Some(filter) = filter.as_deref() {
                args.push(filter);
            }
            cargo(&args)
        }
        Commands::Run {
            image,
            instructions,
            host_clock,
            release,
        } => run_image(&image, instructions, host_clock, release),
    }
}

fn ci(timings: bool) -> Result<()> {
    println!("{}", "pspx ci".bold().blue());
    let start = Instant::now();

    let steps: [(&str, fn() -> Result<()>); 4] = [
        ("fmt", || fmt(true)),
        ("clippy", clippy),
        ("test", || test(None, false)),
        ("doc tests", || test(None, true)),
    ];
    for (name, step) in steps {
        let step_start = Instant::now();
        println!("{} {}", "→".blue(), name.bold());
        if let Err(e) = step() {
            println!("{} {} failed", "✗".red().bold(), name);
            return Err(e);
        }
        if timings {
            println!("  {:.2}s", step_start.elapsed().as_secs_f64());
        }
    }

    println!(
        "{} all steps passed in {:.2}s",
        "✓".green().bold(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn fmt(check: bool) -> Result<()> {
    if check {
        cargo(&["fmt", "--all", "--", "--check"])
    } else {
        cargo(&["fmt", "--all"])
    }
}

fn clippy() -> Result<()> {
    cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
}

fn test(suite: Option<Suite>, doc: bool) -> Result<()> {
    let mut args = vec!["test"];
    if doc {
        args.push("--doc");
    } else if let Some(suite) = suite {
        args.extend_from_slice(suite.cargo_args());
    }
    cargo(&args)
}

fn run_image(image: &Path, instructions: u64, host_clock: bool, release: bool) -> Result<()> {
    // Images are raw little-endian words loaded at the default address
    let len = std::fs::metadata(image)
        .with_context(|| format!("cannot read {}", image.display()))?
        .len();
    if len == 0 || len % 4 != 0 {
        bail!("{}: {} bytes is not a whole number of words", image.display(), len);
    }
    println!(
        "{} {} ({} words, {} clock)",
        "→".blue(),
        image.display().to_string().cyan(),
        len / 4,
        if host_clock { "host" } else { "virtual" }
    );

    let budget = instructions.to_string();
    let image = image.to_string_lossy().into_owned();
    let mut args = vec!["run", "--bin", "pspx"];
    if release {
        args.push("--release");
    }
    args.extend_from_slice(&["--", image.as_str(), "-n", budget.as_str(), "--clock"]);
    args.push(if host_clock { "host" } else { "virtual" });
    cargo(&args)
}

fn cargo(args: &[&str]) -> Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .status()
        .context("failed to start cargo")?;
    if !status.success() {
        bail!("cargo {} exited with {}", args.join(" "), status);
    }
    Ok(())
}
