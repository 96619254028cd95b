/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    describe_move, enumerate_moves, Board, CandidateSet, Color, Command, EngineChannel,
    EngineError, FenError, Move, ProtocolError, QueryError, Readiness, Square, Status,
};

/// Errors that end, or interrupt, a [`GameSession`].
///
/// Only [`SessionError::Fen`] is recoverable: the previous snapshot is kept and
/// [`GameSession::refresh`] may be retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Engine sent an unreadable position: {0}")]
    Fen(#[from] FenError),
}

impl From<QueryError> for SessionError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Engine(e) => Self::Engine(e),
            QueryError::Protocol(e) => Self::Protocol(e),
        }
    }
}

/// Who chooses the moves for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Player {
    #[default]
    Human,
    Engine,
}

/// Who controls each side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Players {
    pub white: Player,
    pub black: Player,
}

impl Players {
    /// A human playing White against the engine.
    pub const HUMAN_VS_ENGINE: Self = Self {
        white: Player::Human,
        black: Player::Engine,
    };

    pub const fn new(white: Player, black: Player) -> Self {
        Self { white, black }
    }

    /// The player controlling `color`.
    #[inline(always)]
    pub const fn of(&self, color: Color) -> Player {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }
}

/// What the session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// A human is to move; waiting for square selections.
    AwaitingHumanInput,

    /// The engine is to move, but has not been asked yet.
    AwaitingEngineRequest,

    /// The engine is searching; its reply is polled for every tick.
    PendingEngineResult,

    /// The engine reported a finished game.
    GameOver,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AwaitingHumanInput => "awaiting human input",
            Self::AwaitingEngineRequest => "awaiting engine request",
            Self::PendingEngineResult => "engine is thinking",
            Self::GameOver => "game over",
        };
        write!(f, "{s}")
    }
}

/// The authoritative position as last reported by the engine.
///
/// Always replaced as a whole, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub board: Board,
    pub turn: Color,
    pub status: Status,
}

/// What a square selection did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The square was the target of a candidate move, which has been played.
    Moved(Move),

    /// The square became the new origin; `moves` candidates were found.
    Selected { origin: Square, moves: usize },

    /// The selection was dropped.
    Cleared,

    /// It is not a human's turn, or the square was not usable.
    Ignored,
}

/// A game played through an engine.
///
/// The session owns the engine, the latest [`Snapshot`] and the candidate moves
/// of the selected square. It is driven by calling [`GameSession::tick`] once
/// per frame and by forwarding square selections from the user.
#[derive(Debug)]
pub struct GameSession<E: EngineChannel> {
    engine: E,

    /// Buffer capacity for each reply.
    capacity: usize,

    players: Players,

    state: SessionState,

    snapshot: Snapshot,

    /// Moves from the currently selected square.
    candidates: CandidateSet,

    /// The last move played, as described by the engine.
    last_move: Option<Move>,

    /// Notations of every move played in this session, in order.
    history: Vec<String>,
}

impl<E: EngineChannel> GameSession<E> {
    /// Starts a session on whatever position the engine currently holds.
    pub fn new(engine: E, players: Players, capacity: usize) -> Result<Self, SessionError> {
        let mut session = Self {
            engine,
            capacity,
            players,
            state: SessionState::AwaitingHumanInput,
            snapshot: Snapshot::default(),
            candidates: CandidateSet::new(),
            last_move: None,
            history: Vec::new(),
        };

        session.refresh()?;
        info!(
            "Session started: {} to move, {}",
            session.snapshot.turn, session.state
        );

        Ok(session)
    }

    #[inline(always)]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[inline(always)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline(always)]
    pub fn players(&self) -> Players {
        self.players
    }

    /// Candidate moves of the selected square.
    #[inline(always)]
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// The currently selected origin square, if any.
    #[inline(always)]
    pub fn selected(&self) -> Option<Square> {
        self.candidates.origin()
    }

    #[inline(always)]
    pub fn last_move(&self) -> Option<&Move> {
        self.last_move.as_ref()
    }

    #[inline(always)]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    #[inline(always)]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Ends the session, handing back the engine so it can be shut down.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Advances the engine's side of the game without ever blocking on a search.
    ///
    /// Starts a search when the engine is to move, and applies the engine's move once
    /// its reply is ready. Returns the move if one was applied during this tick.
    pub fn tick(&mut self) -> Result<Option<Move>, SessionError> {
        match self.state {
            SessionState::AwaitingEngineRequest => {
                self.engine.send(&Command::EvaluateRandom)?;
                self.state = SessionState::PendingEngineResult;
                debug!("Engine is searching for {}", self.snapshot.turn);
                Ok(None)
            }

            SessionState::PendingEngineResult => match self.engine.poll_ready()? {
                Readiness::NotReady => Ok(None),

                Readiness::Ready => {
                    let reply = self.engine.read_available(self.capacity)?;
                    let notation = reply
                        .split_ascii_whitespace()
                        .next()
                        .ok_or(ProtocolError::EmptyMove)?;

                    // The reply has been consumed, so no request is outstanding anymore
                    self.state = SessionState::AwaitingHumanInput;

                    self.apply_move(notation).map(Some)
                }
            },

            SessionState::AwaitingHumanInput | SessionState::GameOver => Ok(None),
        }
    }

    /// Handles a click on a raw board position.
    ///
    /// Plays the matching candidate move if `position` is one of its targets, selects
    /// `position` as the new origin if it is occupied, and clears the selection otherwise.
    pub fn click(&mut self, position: i32) -> Result<Selection, SessionError> {
        let Ok(square) = Square::try_from(position) else {
            debug!("Ignoring click outside the board: {position}");
            return Ok(Selection::Ignored);
        };

        if self.state != SessionState::AwaitingHumanInput {
            return Ok(Selection::Ignored);
        }

        if self.candidates.match_target(square).is_some() {
            self.select_target(square)
        } else if self.snapshot.board.is_occupied(square) {
            self.select_origin(square)
        } else {
            self.candidates.clear();
            Ok(Selection::Cleared)
        }
    }

    /// Selects `origin` and caches the moves the engine allows from it.
    ///
    /// The cache is cleared first. Selecting an empty square only clears it.
    pub fn select_origin(&mut self, origin: Square) -> Result<Selection, SessionError> {
        if self.state != SessionState::AwaitingHumanInput {
            return Ok(Selection::Ignored);
        }

        self.candidates.clear();
        if !self.snapshot.board.is_occupied(origin) {
            return Ok(Selection::Cleared);
        }

        enumerate_moves(&mut self.engine, self.capacity, origin, &mut self.candidates)?;
        debug!(
            "{origin} selected with moves {:?}",
            self.candidates
                .iter()
                .map(|mv| mv.notation.as_str())
                .collect::<Vec<_>>()
        );

        Ok(Selection::Selected {
            origin,
            moves: self.candidates.len(),
        })
    }

    /// Plays the cached candidate move that lands on or captures on `target`, if there is one.
    pub fn select_target(&mut self, target: Square) -> Result<Selection, SessionError> {
        if self.state != SessionState::AwaitingHumanInput {
            return Ok(Selection::Ignored);
        }

        let Some(mv) = self.candidates.match_target(target) else {
            return Ok(Selection::Ignored);
        };

        let notation = mv.notation.clone();
        self.apply_move(&notation).map(Selection::Moved)
    }

    /// Plays `notation` on the engine and re-reads the whole position.
    ///
    /// Sends, in order: `makemove`, `descmove`, `savefen` and `status -i`.
    /// If the position cannot be decoded the move has still been played; the old
    /// snapshot is kept and [`GameSession::refresh`] may be called again.
    fn apply_move(&mut self, notation: &str) -> Result<Move, SessionError> {
        self.engine.send(&Command::MakeMove(notation.to_string()))?;
        let mv = describe_move(&mut self.engine, self.capacity, notation)?;

        info!("{} played {mv} ({} -> {})", self.snapshot.turn, mv.from, mv.to);
        self.candidates.clear();
        self.history.push(mv.notation.clone());
        self.last_move = Some(mv.clone());

        self.refresh()?;
        Ok(mv)
    }

    /// Replaces the snapshot with the engine's current position and status.
    ///
    /// On a [`SessionError::Fen`] the previous snapshot is left untouched.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        let fen = self.engine.ask(self.capacity, &Command::SaveFen)?;
        let (board, turn) = Board::from_fen(fen.trim_end_matches(['\r', '\n'])).map_err(|err| {
            warn!("Failed to decode position {fen:?}: {err}");
            err
        })?;

        let status = Status::parse(&self.engine.ask(self.capacity, &Command::Status)?);

        self.snapshot = Snapshot {
            board,
            turn,
            status,
        };

        // An outstanding search must still be collected
        if self.state != SessionState::PendingEngineResult {
            self.state = self.next_state();
        }

        if self.state == SessionState::GameOver {
            info!("Game over: {status}");
        }

        Ok(())
    }

    fn next_state(&self) -> SessionState {
        if self.snapshot.status.is_over() {
            return SessionState::GameOver;
        }

        match self.players.of(self.snapshot.turn) {
            Player::Human => SessionState::AwaitingHumanInput,
            Player::Engine => SessionState::AwaitingEngineRequest,
        }
    }
}
