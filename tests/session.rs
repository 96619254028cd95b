/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use cez::*;

const STARTING_FEN: &str = "np4PN/pp4PP/8/8/8/8/PP4pp/NP4pn w";
const CAPACITY: usize = DEFAULT_REPLY_CAPACITY;

/// An in-memory engine that records every line it is sent and answers from a script.
#[derive(Debug, Default)]
struct ScriptedEngine {
    name: PathBuf,
    sent: Vec<String>,
    replies: VecDeque<String>,

    /// Number of polls that report "not ready" before the next reply becomes visible.
    polls_until_ready: usize,
}

impl ScriptedEngine {
    fn new<I: IntoIterator<Item = &'static str>>(replies: I) -> Self {
        Self {
            name: PathBuf::from("scripted"),
            replies: replies.into_iter().map(|r| format!("{r}\n")).collect(),
            ..Default::default()
        }
    }
}

impl EngineChannel for ScriptedEngine {
    fn name(&self) -> &Path {
        &self.name
    }

    fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        self.sent.push(line.to_string());
        Ok(())
    }

    fn read_available(&mut self, capacity: usize) -> Result<String, EngineError> {
        let reply = self
            .replies
            .pop_front()
            .ok_or_else(|| EngineError::Closed(self.name.clone()))?;
        assert!(reply.len() < capacity);
        Ok(reply)
    }

    fn poll_ready(&mut self) -> Result<Readiness, EngineError> {
        if self.polls_until_ready > 0 {
            self.polls_until_ready -= 1;
            return Ok(Readiness::NotReady);
        }

        if self.replies.is_empty() {
            Ok(Readiness::NotReady)
        } else {
            Ok(Readiness::Ready)
        }
    }
}

fn sq(s: &str) -> Square {
    Square::from_uci(s).unwrap()
}

fn hotseat(replies: impl IntoIterator<Item = &'static str>) -> GameSession<ScriptedEngine> {
    let engine = ScriptedEngine::new([STARTING_FEN, "0"].into_iter().chain(replies));
    GameSession::new(engine, Players::new(Player::Human, Player::Human), CAPACITY).unwrap()
}

fn sent_since(session: &GameSession<ScriptedEngine>, start: usize) -> Vec<&str> {
    session.engine().sent[start..]
        .iter()
        .map(String::as_str)
        .collect()
}

#[test]
fn test_session_starts_from_engine_position() {
    let session = hotseat([]);

    assert_eq!(sent_since(&session, 0), ["savefen", "status -i"]);
    assert_eq!(session.state(), SessionState::AwaitingHumanInput);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.turn, Color::White);
    assert_eq!(snapshot.status, Status(0));
    assert_eq!(snapshot.board.to_fen(snapshot.turn), STARTING_FEN);
    assert!(session.candidates().is_empty());
    assert!(session.last_move().is_none());
}

#[test]
fn test_enumerate_moves_from_scripted_replies() {
    let mut engine = ScriptedEngine::new(["{ a2a3 a2a4 }", "a2 a3 -", "a2 a4 -"]);
    let mut candidates = CandidateSet::new();

    enumerate_moves(&mut engine, CAPACITY, sq("a2"), &mut candidates).unwrap();

    assert_eq!(
        engine.sent,
        ["allmoves a2", "descmove a2a3", "descmove a2a4"]
    );
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates.origin(), Some(sq("a2")));

    for (mv, (notation, to)) in candidates.iter().zip([("a2a3", "a3"), ("a2a4", "a4")]) {
        assert_eq!(mv.from, sq("a2"));
        assert_eq!(mv.to, sq(to));
        assert_eq!(mv.capture, None);
        assert_eq!(mv.notation, notation);
    }
}

#[test]
fn test_enumerate_moves_rejects_protocol_violations() {
    let mut candidates = CandidateSet::new();

    // More than 4 moves is never described
    let mut engine = ScriptedEngine::new(["{ m1 m2 m3 m4 m5 }"]);
    let err = enumerate_moves(&mut engine, CAPACITY, sq("b1"), &mut candidates).unwrap_err();
    assert!(matches!(
        err,
        QueryError::Protocol(ProtocolError::TooManyMoves { .. })
    ));
    assert_eq!(engine.sent, ["allmoves b1"]);
    assert!(candidates.is_empty());

    // A move that starts somewhere else
    let mut engine = ScriptedEngine::new(["{ b1c3 }", "g1f3 f3 -"]);
    let err = enumerate_moves(&mut engine, CAPACITY, sq("b1"), &mut candidates);
    assert!(matches!(
        err,
        Err(QueryError::Protocol(ProtocolError::MalformedDescription { .. }))
    ));

    let mut engine = ScriptedEngine::new(["{ g1f3 }", "g1 f3 -"]);
    let err = enumerate_moves(&mut engine, CAPACITY, sq("b1"), &mut candidates);
    assert!(matches!(
        err,
        Err(QueryError::Protocol(ProtocolError::ForeignOrigin { .. }))
    ));
    assert!(candidates.is_empty());

    // Unterminated list
    let mut engine = ScriptedEngine::new(["{ b1c3"]);
    let err = enumerate_moves(&mut engine, CAPACITY, sq("b1"), &mut candidates);
    assert!(matches!(
        err,
        Err(QueryError::Protocol(ProtocolError::MalformedMoveList { .. }))
    ));
}

#[test]
fn test_selecting_an_origin_caches_its_moves() {
    let mut session = hotseat(["{ g2g3 g2g4 }", "g2 g3 -", "g2 g4 -"]);

    let selection = session.select_origin(sq("g2")).unwrap();
    assert_eq!(
        selection,
        Selection::Selected {
            origin: sq("g2"),
            moves: 2
        }
    );
    assert_eq!(session.selected(), Some(sq("g2")));
    assert_eq!(session.state(), SessionState::AwaitingHumanInput);
    assert!(session.candidates().match_target(sq("g4")).is_some());

    // Empty squares clear the selection without asking the engine
    let sent = session.engine().sent.len();
    assert_eq!(session.select_origin(sq("d4")).unwrap(), Selection::Cleared);
    assert_eq!(session.engine().sent.len(), sent);
    assert!(session.candidates().is_empty());
}

#[test]
fn test_applying_a_move_sends_four_commands_in_order() {
    let after = "np4PN/pp5P/8/6P1/8/8/PP4pp/NP4pn b";
    let mut session = hotseat([
        // Selection of g2
        "{ g2g3 g2g4 }",
        "g2 g3 -",
        "g2 g4 -",
        // Move to g4 (makemove has no reply)
        "g2 g4 -",
        after,
        "1",
    ]);
    session.select_origin(sq("g2")).unwrap();

    let start = session.engine().sent.len();
    let selection = session.select_target(sq("g4")).unwrap();

    assert_eq!(
        sent_since(&session, start),
        ["makemove g2g4", "descmove g2g4", "savefen", "status -i"]
    );

    let Selection::Moved(mv) = selection else {
        panic!("expected a move, got {selection:?}");
    };
    assert_eq!(mv.notation, "g2g4");
    assert_eq!(mv.from, sq("g2"));
    assert_eq!(mv.to, sq("g4"));
    assert_eq!(session.last_move(), Some(&mv));
    assert_eq!(session.history(), ["g2g4"]);

    // Only the post-move values are published
    let snapshot = session.snapshot();
    assert_eq!(snapshot.turn, Color::Black);
    assert_eq!(snapshot.status, Status(1));
    assert_eq!(snapshot.board.to_fen(snapshot.turn), after);
    assert_eq!(snapshot.board[sq("g4")], Cell::WhitePawn);
    assert!(!snapshot.board.is_occupied(sq("g2")));

    assert!(session.candidates().is_empty());
    assert_eq!(session.selected(), None);
    assert_eq!(session.state(), SessionState::AwaitingHumanInput);
}

#[test]
fn test_unmatched_target_is_ignored() {
    let mut session = hotseat(["{ g2g3 }", "g2 g3 -"]);
    session.select_origin(sq("g2")).unwrap();

    let sent = session.engine().sent.len();
    assert_eq!(session.select_target(sq("h5")).unwrap(), Selection::Ignored);
    assert_eq!(session.engine().sent.len(), sent);
    assert_eq!(session.candidates().len(), 1);
}

#[test]
fn test_click_dispatch() {
    let mut session = hotseat([
        // Click on b2 selects it
        "{ b2b3 b2b4 }",
        "b2 b3 -",
        "b2 b4 -",
        // Click on a2 (occupied, not a target) re-selects
        "{ a2a3 }",
        "a2 a3 -",
        // Click on a3 plays the move
        "a2 a3 -",
        "np4PN/1p4PP/p7/8/8/8/PP4pp/NP4pn w",
        "0",
    ]);

    // Off the board
    assert_eq!(session.click(64).unwrap(), Selection::Ignored);
    assert_eq!(session.click(-1).unwrap(), Selection::Ignored);

    let b2 = sq("b2").index() as i32;
    assert_eq!(
        session.click(b2).unwrap(),
        Selection::Selected {
            origin: sq("b2"),
            moves: 2
        }
    );

    // An empty square that is not a target clears the selection
    assert_eq!(
        session.click(to_position(4, 4)).unwrap(),
        Selection::Cleared
    );
    assert_eq!(session.selected(), None);

    let a2 = to_position(1, 0);
    assert!(matches!(
        session.click(a2).unwrap(),
        Selection::Selected { moves: 1, .. }
    ));

    let a3 = to_position(2, 0);
    assert!(matches!(session.click(a3).unwrap(), Selection::Moved(_)));
    assert_eq!(session.snapshot().board[sq("a3")], Cell::BlackPawn);
    assert_eq!(session.history(), ["a2a3"]);
}

#[test]
fn test_engine_move_is_polled_without_blocking() {
    let mut engine = ScriptedEngine::new([
        "np4PN/pp4PP/8/8/8/8/PP4pp/NP4pn b",
        "0",
        // Search result
        "g7g6",
        // Applying it
        "g7 g6 -",
        "np4PN/pp4PP/8/8/8/6p1/PP5p/NP4pn w",
        "0",
    ]);
    engine.polls_until_ready = 3;

    let mut session = GameSession::new(engine, Players::HUMAN_VS_ENGINE, CAPACITY).unwrap();
    assert_eq!(session.state(), SessionState::AwaitingEngineRequest);

    // Humans can't interfere while the engine is to move
    assert_eq!(session.select_origin(sq("g2")).unwrap(), Selection::Ignored);
    assert_eq!(session.click(sq("g2").index() as i32).unwrap(), Selection::Ignored);

    let start = session.engine().sent.len();
    assert_eq!(session.tick().unwrap(), None);
    assert_eq!(session.state(), SessionState::PendingEngineResult);
    assert_eq!(sent_since(&session, start), ["evaluate -r"]);

    // The search is not ready for three ticks, and nothing is sent meanwhile
    for _ in 0..3 {
        assert_eq!(session.tick().unwrap(), None);
        assert_eq!(session.state(), SessionState::PendingEngineResult);
    }
    assert_eq!(sent_since(&session, start), ["evaluate -r"]);

    let mv = session.tick().unwrap().expect("engine move should be applied");
    assert_eq!(mv.notation, "g7g6");
    assert_eq!(mv.from, sq("g7"));
    assert_eq!(mv.to, sq("g6"));
    assert_eq!(
        sent_since(&session, start),
        [
            "evaluate -r",
            "makemove g7g6",
            "descmove g7g6",
            "savefen",
            "status -i"
        ]
    );

    assert_eq!(session.snapshot().turn, Color::White);
    assert_eq!(session.state(), SessionState::AwaitingHumanInput);
    assert_eq!(session.last_move(), Some(&mv));

    // Nothing left for the engine to do
    assert_eq!(session.tick().unwrap(), None);
    assert_eq!(session.engine().sent.len(), start + 5);
}

#[test]
fn test_engine_vs_engine_alternates_requests() {
    let engine = ScriptedEngine::new([
        STARTING_FEN,
        "0",
        "g2g3",
        "g2 g3 -",
        "np4PN/pp5P/6P1/8/8/8/PP4pp/NP4pn b",
        "0",
    ]);
    let players = Players::new(Player::Engine, Player::Engine);
    let mut session = GameSession::new(engine, players, CAPACITY).unwrap();

    assert_eq!(session.tick().unwrap(), None);
    assert!(session.tick().unwrap().is_some());

    // Black is an engine too, so the next request is due
    assert_eq!(session.state(), SessionState::AwaitingEngineRequest);
    assert_eq!(session.tick().unwrap(), None);
    assert_eq!(session.engine().sent.last().unwrap(), "evaluate -r");
    assert_eq!(session.state(), SessionState::PendingEngineResult);
}

#[test]
fn test_finished_game_stops_the_session() {
    // 0x30: Black wins, with reserved low bits set
    let engine = ScriptedEngine::new(["8/8/8/8/8/8/8/n7 w", "51"]);
    let mut session = GameSession::new(engine, Players::HUMAN_VS_ENGINE, CAPACITY).unwrap();

    assert_eq!(session.state(), SessionState::GameOver);
    assert_eq!(session.snapshot().status.outcome(), Some(Outcome::BlackWins));

    let sent = session.engine().sent.len();
    assert_eq!(session.tick().unwrap(), None);
    assert_eq!(session.click(to_position(7, 0)).unwrap(), Selection::Ignored);
    assert_eq!(session.engine().sent.len(), sent);
}

#[test]
fn test_bad_position_keeps_previous_snapshot() {
    let mut session = hotseat(["not a fen", "np4PN/pp4PP/8/8/8/8/PP4pp/NP4pn b", "0"]);
    let before = *session.snapshot();

    let err = session.refresh().unwrap_err();
    assert!(matches!(err, SessionError::Fen(_)), "{err}");
    assert_eq!(*session.snapshot(), before);

    // Retrying succeeds once the engine makes sense again
    session.refresh().unwrap();
    assert_eq!(session.snapshot().turn, Color::Black);
}

#[test]
fn test_empty_search_reply_is_a_protocol_error() {
    let engine = ScriptedEngine::new(["np4PN/pp4PP/8/8/8/8/PP4pp/NP4pn b", "0", ""]);
    let mut session = GameSession::new(engine, Players::HUMAN_VS_ENGINE, CAPACITY).unwrap();

    session.tick().unwrap();
    let err = session.tick().unwrap_err();
    assert!(matches!(err, SessionError::Protocol(ProtocolError::EmptyMove)));
}

#[test]
fn test_closed_engine_is_fatal() {
    let mut session = hotseat([]);
    let err = session.select_origin(sq("a1")).unwrap_err();
    assert!(matches!(err, SessionError::Engine(EngineError::Closed(_))));
}
