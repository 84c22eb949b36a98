use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;

use pollkeeper::app_state::AppState;
use pollkeeper::repl::readline;
use pollkeeper::{commands, logging};
use pollkeeper_core::{PollConfig, PollConfigExt};

#[tokio::main]
async fn main() -> Result<(), String> {
    logging::init();

    let state = Arc::new(RwLock::new(AppState::new(PollConfig::load())));
    commands::create_presets(Arc::clone(&state)).await;

    loop {
        let line = tokio::task::spawn_blocking(readline)
            .await
            .map_err(|e| e.to_string())??;
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, Arc::clone(&state)).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    commands::shutdown(state).await;
    Ok(())
}

#[derive(Parser)]
#[command(version, about = "pollkeeper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start a poll loop
    Create {
        name: String,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Fail the handler on this tick, faulting the timer
        #[arg(long)]
        fail_after: Option<u64>,
    },
    Start {
        name: String,
    },
    Pause {
        name: String,
    },
    Resume {
        name: String,
    },
    Stop {
        name: String,
    },
    Interval {
        name: String,
        ms: u64,
    },
    Dispose {
        name: String,
    },
    List,
    Exit,
}

async fn respond(line: &str, state: Arc<RwLock<AppState>>) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "pollkeeper".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match cli.command {
        Some(Commands::Create {
            name,
            interval_ms,
            fail_after,
        }) => commands::create(&name, interval_ms, fail_after, state).await?,
        Some(Commands::Start { name }) => commands::start(&name, state).await?,
        Some(Commands::Pause { name }) => commands::pause(&name, state).await?,
        Some(Commands::Resume { name }) => commands::resume(&name, state).await?,
        Some(Commands::Stop { name }) => commands::stop(&name, state).await?,
        Some(Commands::Interval { name, ms }) => commands::set_interval(&name, ms, state).await?,
        Some(Commands::Dispose { name }) => commands::dispose(&name, state).await?,
        Some(Commands::List) => commands::list(state).await,
        Some(Commands::Exit) => {
            writeln!(std::io::stdout(), "quitting...").map_err(|e| e.to_string())?;
            std::io::stdout().flush().map_err(|e| e.to_string())?;
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
