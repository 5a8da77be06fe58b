//! Lunaris command-line tool
//!
//! Runs, checks and disassembles Lua scripts, and hosts an interactive REPL.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod logger;
mod output;

#[derive(Parser)]
#[command(name = "lunaris")]
#[command(about = "Lua scripting runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// Log engine activity to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Colored output: auto, always or never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script file
    Run {
        /// Script to run
        file: PathBuf,
        /// Abort the script after this many milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Session options (lunaris.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Evaluate a chunk given on the command line and print its results
    Eval {
        /// Lua source
        code: String,
    },

    /// Compile files without running them
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the bytecode of a script
    Disasm {
        /// Script to disassemble
        file: PathBuf,
    },

    /// Start the interactive REPL
    Repl {
        /// Session options (lunaris.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);
    let choice = output::resolve_color_choice(cli.color.as_deref());

    let result = match cli.command {
        Commands::Run { file, timeout, config } => commands::run::execute(&file, timeout, config.as_deref()),
        Commands::Eval { code } => commands::eval::execute(&code),
        Commands::Check { files } => commands::check::execute(&files, choice),
        Commands::Disasm { file } => commands::disasm::execute(&file),
        Commands::Repl { config } => commands::repl::execute(config.as_deref(), choice),
    };

    if let Err(e) = result {
        output::StyledOutput::new(choice).stderr_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}
