use anyhow::Result;
use clap::Parser;
use overscribe::cli::{Cli, Commands};
use overscribe::config::Config;
use overscribe::daemon::{CaptureInput, run_daemon};
use overscribe::ipc::client::send_command;
use overscribe::ipc::protocol::{Command, Response};
use overscribe::ipc::server::IpcServer;
use overscribe::pipeline::scheduler::SegmentTiming;
use overscribe::pipeline::types::SessionMode;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            socket,
            stdin,
            tick,
            segment_cap,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let input = if stdin {
                CaptureInput::Stdin
            } else {
                CaptureInput::Microphone
            };
            let timing = match (tick, segment_cap) {
                (None, None) => None,
                (tick, cap) => {
                    let defaults = SegmentTiming {
                        tick_interval: config.segments.tick_interval(),
                        segment_cap: config.segments.duration_cap(),
                    };
                    Some(SegmentTiming {
                        tick_interval: tick.unwrap_or(defaults.tick_interval),
                        segment_cap: cap.unwrap_or(defaults.segment_cap),
                    })
                }
            };
            run_daemon(config, socket, input, timing, cli.quiet, cli.verbose).await?;
        }
        Commands::Start { socket, prompt } => {
            let mode = if prompt {
                SessionMode::Prompt
            } else {
                SessionMode::Transcribe
            };
            handle_ipc_command(socket, Command::Start { mode }, cli.quiet).await?;
        }
        Commands::Pause { socket } => {
            handle_ipc_command(socket, Command::Pause, cli.quiet).await?;
        }
        Commands::Resume { socket } => {
            handle_ipc_command(socket, Command::Resume, cli.quiet).await?;
        }
        Commands::Stop { socket } => {
            handle_ipc_command(socket, Command::Stop, cli.quiet).await?;
        }
        Commands::Cancel { socket } => {
            handle_ipc_command(socket, Command::Cancel, cli.quiet).await?;
        }
        Commands::Status { socket } => {
            handle_ipc_command(socket, Command::Status, cli.quiet).await?;
        }
        Commands::Shutdown { socket } => {
            handle_ipc_command(socket, Command::Shutdown, cli.quiet).await?;
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/overscribe/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)?
    };

    Ok(config.with_env_overrides())
}

/// Send one command to the daemon and print the response.
async fn handle_ipc_command(
    socket: Option<PathBuf>,
    command: Command,
    quiet: bool,
) -> Result<()> {
    let socket_path = socket.unwrap_or_else(IpcServer::default_socket_path);
    let response = send_command(&socket_path, command).await?;

    match response {
        Response::Ok => {
            if !quiet {
                println!("ok");
            }
        }
        Response::Pasted { text } => {
            println!("{}", text);
        }
        Response::Status {
            state,
            mode,
            credentials_available,
        } => {
            println!("state: {}", state);
            if let Some(mode) = mode {
                println!("mode: {}", mode);
            }
            println!(
                "credentials: {}",
                if credentials_available {
                    "available"
                } else {
                    "all cooling down"
                }
            );
        }
        Response::Error { message } => {
            eprintln!("overscribe: {}", message);
            std::process::exit(1);
        }
    }

    Ok(())
}
