/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Exercises the real pipe transport, using `cat` as an engine that echoes every command.
#![cfg(unix)]

use std::{
    thread,
    time::{Duration, Instant},
};

use cez::*;

fn echo_engine() -> EngineProcess {
    let config = EngineConfig::new("cat").args(Vec::<String>::new());
    EngineProcess::spawn(&config).unwrap()
}

/// Polls until the engine has output, giving up after a few seconds.
fn wait_until_ready(engine: &mut EngineProcess) {
    let start = Instant::now();
    while engine.poll_ready().unwrap() == Readiness::NotReady {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "engine never became ready"
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_ask_reads_one_reply() {
    let mut engine = echo_engine();
    assert_eq!(engine.name(), std::path::Path::new("cat"));

    let reply = engine.ask(DEFAULT_REPLY_CAPACITY, &Command::SaveFen).unwrap();
    assert_eq!(reply, "savefen\n");

    let reply = engine
        .ask(DEFAULT_REPLY_CAPACITY, &Command::AllMoves(Square::A1))
        .unwrap();
    assert_eq!(reply, "allmoves a1\n");

    engine.kill().unwrap();
}

#[test]
fn test_read_respects_capacity() {
    let mut engine = echo_engine();

    // One byte of the capacity is reserved
    let reply = engine.ask(4, &Command::SaveFen).unwrap();
    assert_eq!(reply, "sav");

    // The rest is kept for the next read
    let reply = engine.read_available(DEFAULT_REPLY_CAPACITY).unwrap();
    assert_eq!(reply, "efen\n");

    assert!(matches!(
        engine.read_available(1),
        Err(EngineError::InvalidCapacity(1))
    ));

    engine.kill().unwrap();
}

#[test]
fn test_poll_never_blocks() {
    let mut engine = echo_engine();

    // Nothing has been asked yet, so there is nothing to read
    let start = Instant::now();
    assert_eq!(engine.poll_ready().unwrap(), Readiness::NotReady);
    assert!(start.elapsed() < Duration::from_secs(1));

    engine.send(&Command::EvaluateRandom).unwrap();
    wait_until_ready(&mut engine);

    // Polling again does not consume the reply
    assert_eq!(engine.poll_ready().unwrap(), Readiness::Ready);
    assert_eq!(
        engine.read_available(DEFAULT_REPLY_CAPACITY).unwrap(),
        "evaluate -r\n"
    );

    engine.kill().unwrap();
}

#[test]
fn test_multi_line_commands_are_rejected() {
    let mut engine = echo_engine();

    let err = engine.send_line("makemove a2a3\nsavefen").unwrap_err();
    assert!(matches!(err, EngineError::InvalidCommand(_)));

    engine.kill().unwrap();
}

#[test]
fn test_engine_that_exits_is_closed() {
    let config = EngineConfig::new("true").args(Vec::<String>::new());
    let mut engine = EngineProcess::spawn(&config).unwrap();

    let err = engine.read_available(DEFAULT_REPLY_CAPACITY).unwrap_err();
    assert!(matches!(err, EngineError::Closed(_)), "{err}");
    assert!(matches!(engine.poll_ready(), Err(EngineError::Closed(_))));

    engine.kill().unwrap();
}
