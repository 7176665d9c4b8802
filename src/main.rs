//! Goban-Rust: review 19x19 game records from the command line.
//!
//! ## Usage
//!
//! - `goban-rust` - Show a demo
//! - `goban-rust show game.sgf --move 42` - Print the board after move 42
//! - `goban-rust export game.sgf -o main-line.sgf` - Re-emit the main line
//! - `goban-rust analyze game.sgf --move 42` - Ask the analysis oracle

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use goban_rust::analysis::{AnalysisClient, AnalysisConfig};
use goban_rust::logging::setup_logging;
use goban_rust::session::GameSession;

/// Goban-Rust: game records, legality and analysis for 19x19 Go
#[derive(Parser)]
#[command(name = "goban-rust")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level, used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Write rotating log files to this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the board at a given move of a record
    Show {
        file: PathBuf,
        /// Move number (plies from the start); defaults to the end of the main line
        #[arg(short = 'm', long = "move")]
        at: Option<usize>,
    },
    /// Re-emit the main line of a record
    Export {
        file: PathBuf,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Query the analysis oracle for a position
    Analyze {
        file: PathBuf,
        /// Move number (plies from the start); defaults to the end of the main line
        #[arg(short = 'm', long = "move")]
        at: Option<usize>,
        /// Oracle endpoint (overrides GOBAN_ANALYSIS_ENDPOINT)
        #[arg(long)]
        endpoint: Option<String>,
        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Maximum number of attempts
        #[arg(long)]
        attempts: Option<u32>,
    },
    /// Play a short ko fight and print the board
    Demo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = setup_logging(&cli.log_level, cli.log_dir.as_deref())
        .context("failed to start logging")?;

    match cli.command {
        Some(Commands::Show { file, at }) => {
            let session = open_at(&file, at)?;
            print_position(&session);
        }
        Some(Commands::Export { file, output }) => {
            let sgf = open_at(&file, None)?.to_sgf();
            match output {
                Some(path) => fs::write(&path, sgf)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{sgf}"),
            }
        }
        Some(Commands::Analyze {
            file,
            at,
            endpoint,
            timeout_secs,
            attempts,
        }) => {
            let session = open_at(&file, at)?;
            let mut config = AnalysisConfig::from_env();
            if let Some(endpoint) = endpoint {
                config = config.with_endpoint(endpoint);
            }
            if let Some(secs) = timeout_secs {
                config = config.with_attempt_timeout(Duration::from_secs(secs));
            }
            if let Some(attempts) = attempts {
                config = config.with_max_attempts(attempts);
            }
            run_analysis(&session, config)?;
        }
        Some(Commands::Demo) | None => run_demo(),
    }
    Ok(())
}

fn open_at(file: &Path, depth: Option<usize>) -> Result<GameSession> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut session = GameSession::from_sgf(&text);
    match depth {
        Some(depth) => session.jump_to_depth(depth),
        None => session.last(),
    };
    Ok(session)
}

fn print_position(session: &GameSession) {
    let info = session.game_info();
    let pos = session.position();
    println!(
        "{} (B) vs {} (W), komi {}, result {}",
        info.black_player, info.white_player, info.komi, info.result
    );
    println!("Move {}", session.current_depth());
    println!("{}", pos.state.grid);
    println!(
        "Captures: black {}, white {}",
        pos.state.captures.black, pos.state.captures.white
    );
    println!("{} to play", pos.to_move);
    if let Some(comment) = session.tree().current_node().comment() {
        println!("\n{comment}");
    }
}

fn run_analysis(session: &GameSession, config: AnalysisConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let client = AnalysisClient::http(config);
    let moves = session.gtp_history();
    let komi = session.game_info().komi;

    match runtime.block_on(client.request_analysis(&moves, komi)) {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("analysis unavailable"),
    }
    Ok(())
}

fn run_demo() {
    println!("Goban-Rust: ko demo\n");

    let mut session = GameSession::new();
    let setup = [
        (4, 3),
        (5, 3),
        (3, 4),
        (6, 4),
        (4, 5),
        (5, 5),
        (16, 16),
        (4, 4),
    ];
    for point in setup {
        if let Err(e) = session.play(point) {
            println!("setup move {point:?} rejected: {e}");
        }
    }

    println!("Black takes the ko at (5, 4):");
    match session.play((5, 4)) {
        Ok(_) => println!("{}", session.position().state.grid),
        Err(e) => println!("rejected: {e}"),
    }

    println!("\nWhite retakes immediately at (4, 4):");
    match session.play((4, 4)) {
        Ok(_) => println!("accepted"),
        Err(e) => println!("rejected: {e}"),
    }

    println!(
        "\n{} to play, ko point {:?}",
        session.to_move(),
        session.position().state.ko_point
    );
    println!("History: {}", session.gtp_history().join(" "));
}
