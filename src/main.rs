/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    io,
    ops::ControlFlow,
    sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender},
    thread,
    time::Instant,
};

use anyhow::{Context, Result};
use cez::{
    Cli, EngineChannel, EngineProcess, FrontendCommand, GameSession, Selection, SessionState,
};
use clap::Parser;
use log::error;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let engine = EngineProcess::spawn(&cli.engine_config())
        .with_context(|| format!("Could not start engine {:?}", cli.engine))?;

    let mut session = GameSession::new(engine, cli.players(), cli.reply_capacity)
        .context("Failed to read the starting position from the engine")?;

    let result = run(&mut session, &cli);

    // The engine is shut down no matter how the loop ended
    session
        .into_engine()
        .kill()
        .context("Failed to shut the engine down")?;

    result
}

/// The front-end loop: ticks the session once per frame and handles typed commands in between.
fn run<E: EngineChannel>(session: &mut GameSession<E>, cli: &Cli) -> Result<()> {
    let (sender, receiver) = channel();
    thread::spawn(|| {
        if let Err(err) = input_handler(sender) {
            error!("Input handler thread stopping after fatal error: {err:#}");
        }
    });

    println!("{}", session.snapshot().board);
    print_status(session);

    loop {
        let frame = Instant::now();

        if let Some(mv) = session.tick().context("Engine move failed")? {
            println!("\n{} ({} -> {})", mv, mv.from, mv.to);
            println!("{}", session.snapshot().board);
            print_status(session);
        }

        if handle_commands(session, &receiver, frame, cli)?.is_break() {
            return Ok(());
        }
    }
}

/// Handles commands until the current frame is over.
fn handle_commands<E: EngineChannel>(
    session: &mut GameSession<E>,
    receiver: &Receiver<FrontendCommand>,
    frame: Instant,
    cli: &Cli,
) -> Result<ControlFlow<()>> {
    let deadline = frame + cli.frame_interval();

    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        let cmd = match receiver.recv_timeout(timeout) {
            Ok(cmd) => cmd,
            Err(RecvTimeoutError::Timeout) => return Ok(ControlFlow::Continue(())),
            Err(RecvTimeoutError::Disconnected) => return Ok(ControlFlow::Break(())),
        };

        let selection = match cmd {
            FrontendCommand::Click { square } => session.click(square.index() as i32)?,

            FrontendCommand::Select { square } => session.select_origin(square)?,

            FrontendCommand::Target { square } => session.select_target(square)?,

            FrontendCommand::Moves => {
                print_candidates(session);
                continue;
            }

            FrontendCommand::Display => {
                println!("{}", session.snapshot().board);
                continue;
            }

            FrontendCommand::History => {
                if session.history().is_empty() {
                    println!("(none)");
                } else {
                    println!("{}", session.history().join(" "));
                }
                continue;
            }

            FrontendCommand::Status => {
                print_status(session);
                continue;
            }

            FrontendCommand::Exit => return Ok(ControlFlow::Break(())),
        };

        match selection {
            Selection::Moved(mv) => {
                println!("\n{} ({} -> {})", mv, mv.from, mv.to);
                println!("{}", session.snapshot().board);
                print_status(session);
            }
            Selection::Selected { .. } => print_candidates(session),
            Selection::Cleared => println!("Selection cleared"),
            Selection::Ignored => match session.state() {
                SessionState::AwaitingHumanInput => println!("Nothing to do on that square"),
                state => println!("Not your turn: {state}"),
            },
        }
    }
}

fn print_status<E: EngineChannel>(session: &GameSession<E>) {
    let snapshot = session.snapshot();
    if session.state() == SessionState::GameOver {
        println!("Game over: {}", snapshot.status);
    } else {
        println!("{} to move ({})", snapshot.turn, session.state());
    }
}

fn print_candidates<E: EngineChannel>(session: &GameSession<E>) {
    let Some(origin) = session.selected() else {
        println!("No square selected");
        return;
    };

    let moves = session.candidates();
    if moves.is_empty() {
        println!("{origin}: (none)");
        return;
    }

    let moves = moves
        .iter()
        .map(|mv| match mv.capture {
            Some(capture) => format!("{mv} -> {} (captures {capture})", mv.to),
            None => format!("{mv} -> {}", mv.to),
        })
        .collect::<Vec<_>>()
        .join(", ");
    println!("{origin}: {moves}");
}

/// Loops endlessly to await input via `stdin`, sending all successfully-parsed commands through the supplied `sender`.
fn input_handler(sender: Sender<FrontendCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(64);

    loop {
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("Failed to read a command from stdin")?;

        // For ctrl + d
        if 0 == bytes {
            sender
                .send(FrontendCommand::Exit)
                .context("Failed to send 'exit' command after receiving empty input")?;

            return Ok(());
        }

        let buf = buffer.trim();
        if buf.is_empty() {
            continue;
        }

        match buf.parse::<FrontendCommand>() {
            Ok(cmd) => sender.send(cmd).context("Failed to send command to the front-end")?,

            // Usage messages and typos are shown, but never fatal
            Err(err) => eprintln!("{err}"),
        }
    }
}
