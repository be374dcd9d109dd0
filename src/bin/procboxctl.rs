//! Command-line harness around the procbox orchestration primitives

use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use env_logger::{Builder, Env};
use log::{debug, LevelFilter};

use procbox::{run_pipeline, sandbox_run, spawn, Command, SpawnMode, Verdict};

#[derive(Parser)]
#[command(name = "procboxctl")]
#[command(version, about = "Run command pipelines and deadline-bounded commands", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Three-stage pipeline, stages separated by a literal |
    procboxctl run cat /etc/passwd \\| grep root \\| wc -l

    # Read a child's stdout / feed a child's stdin
    procboxctl spawn --mode read ls -l
    procboxctl spawn --mode write grep needle

    # Run a command under a 5 second deadline
    procboxctl sandbox --timeout 5 ./stress-job
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Read the child's stdout
    Read,
    /// Write the child's stdin
    Write,
}

#[derive(Subcommand)]
enum Commands {
    /// Run commands as a pipeline, stages separated by a literal |
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
    },
    /// Spawn one command with a single redirected standard stream
    Spawn {
        #[arg(short, long, value_enum)]
        mode: Mode,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
    },
    /// Run one command under a wall-clock deadline and report the verdict
    Sandbox {
        /// Deadline in seconds (0 means no deadline)
        #[arg(short, long, default_value_t = 5)]
        timeout: u32,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
    },
}

/// Initialize logger based on verbose flag
fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", if verbose { "debug" } else { "warn" });

    Builder::from_env(env)
        .format(|buf, record| {
            let level = match record.level() {
                log::Level::Error => format!("{}", style("ERROR").red().bold()),
                log::Level::Warn => format!("{}", style("WARN ").yellow().bold()),
                log::Level::Info => format!("{}", style("INFO ").green()),
                log::Level::Debug => format!("{}", style("DEBUG").cyan()),
                log::Level::Trace => format!("{}", style("TRACE").dim()),
            };
            writeln!(buf, "{} {}", level, record.args())
        })
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .init();
}

/// Split argv into pipeline stages on literal `|` tokens
fn parse_stages(argv: &[String]) -> Result<Vec<Command>, procbox::Error> {
    argv.split(|tok| tok == "|")
        .map(Command::from_argv)
        .collect()
}

fn cmd_run(argv: &[String]) -> Result<bool, procbox::Error> {
    let stages = parse_stages(argv)?;
    debug!("running {} stage(s)", stages.len());
    let summary = run_pipeline(&stages)?;
    for (stage, status) in summary.statuses().iter().enumerate() {
        eprintln!("stage {}: {:?}", stage, status);
    }
    Ok(summary.success())
}

fn cmd_spawn(mode: Mode, argv: &[String]) -> Result<bool, procbox::Error> {
    let command = Command::from_argv(argv)?;
    let status = match mode {
        Mode::Read => {
            let mut child = spawn(&command, SpawnMode::ReadFromChild)?;
            io::copy(&mut child, &mut io::stdout())?;
            child.wait()?
        }
        Mode::Write => {
            let mut child = spawn(&command, SpawnMode::WriteToChild)?;
            let mut input = Vec::new();
            io::stdin().read_to_end(&mut input)?;
            child.write_all(&input)?;
            child.wait()?
        }
    };
    eprintln!("exit status: {:?}", status);
    Ok(status.success())
}

fn cmd_sandbox(timeout: u32, argv: &[String]) -> Result<bool, procbox::Error> {
    let command = Command::from_argv(argv)?;
    let verdict = sandbox_run(
        move || {
            // The work unit is this command; exec never returns on success
            if let Ok(args) = command.to_cstring_argv() {
                let _ = nix::unistd::execvp(&args[0], &args);
            }
            unsafe { libc::_exit(procbox::EXEC_FAILURE_STATUS) }
        },
        timeout,
        true,
    )?;
    Ok(verdict == Verdict::Success)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let outcome = match &cli.command {
        Commands::Run { argv } => cmd_run(argv),
        Commands::Spawn { mode, argv } => cmd_spawn(*mode, argv),
        Commands::Sandbox { timeout, argv } => cmd_sandbox(*timeout, argv),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
