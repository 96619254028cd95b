/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, ops::Deref};

use log::debug;
use thiserror::Error;

use crate::{Command, EngineChannel, EngineError, Square};

/// Maximum number of moves a single piece can ever have in this game.
pub const MAX_CANDIDATES: usize = 4;

/// A reply from the engine that does not follow the protocol grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed description of move {notation:?}: {reply:?}")]
    MalformedDescription { notation: String, reply: String },

    #[error("Malformed move list for {origin}: {reply:?}")]
    MalformedMoveList { origin: Square, reply: String },

    #[error("Engine listed more than {max} moves from {origin}: {reply:?}", max = MAX_CANDIDATES)]
    TooManyMoves { origin: Square, reply: String },

    #[error("Move {notation:?} was listed for {origin} but starts on {from}")]
    ForeignOrigin {
        origin: Square,
        from: Square,
        notation: String,
    },

    #[error("Engine replied to a search with an empty move")]
    EmptyMove,
}

/// Errors from a query that both talks to the engine and parses its reply.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A move as described by the engine.
///
/// Moves are never built locally; they always come from a `descmove` reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,

    /// Square of the captured piece, if this move captures.
    pub capture: Option<Square>,

    /// The engine's own notation for this move, passed back verbatim in `makemove`.
    pub notation: String,
}

impl Move {
    /// Parses a `descmove` reply of the form `"<from> <to> <capture>"`.
    ///
    /// `from` and `to` must be squares. Any token that is not a square, such as `-`,
    /// is read as "no capture".
    pub fn from_description(notation: &str, reply: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedDescription {
            notation: notation.to_string(),
            reply: reply.to_string(),
        };

        let mut tokens = reply.split_ascii_whitespace();
        let (Some(from), Some(to), Some(capture), None) =
            (tokens.next(), tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(malformed());
        };

        let from = Square::from_uci(from).ok_or_else(malformed)?;
        let to = Square::from_uci(to).ok_or_else(malformed)?;

        Ok(Self {
            from,
            to,
            capture: Square::from_uci(capture),
            notation: notation.to_string(),
        })
    }

    /// Returns `true` if clicking `square` should play this move.
    #[inline(always)]
    pub fn targets(&self, square: Square) -> bool {
        self.to == square || self.capture == Some(square)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.notation)
    }
}

/// The moves available from one origin square.
///
/// Holds at most [`MAX_CANDIDATES`] moves, all starting on the same square.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    origin: Option<Square>,
    moves: Vec<Move>,
}

impl CandidateSet {
    /// An empty set with no origin.
    pub fn new() -> Self {
        Self {
            origin: None,
            moves: Vec::with_capacity(MAX_CANDIDATES),
        }
    }

    /// The square every move in this set starts on, if one has been selected.
    #[inline(always)]
    pub fn origin(&self) -> Option<Square> {
        self.origin
    }

    /// Removes every move and forgets the origin.
    pub fn clear(&mut self) {
        self.origin = None;
        self.moves.clear();
    }

    /// Returns the first move that lands on or captures on `target`.
    ///
    /// `to` and `capture` squares are unique within a well-formed set, so there are no ties.
    pub fn match_target(&self, target: Square) -> Option<&Move> {
        self.moves.iter().find(|mv| mv.targets(target))
    }

    /// Replaces the contents of this set with `moves` from `origin`, enforcing the set's invariants.
    fn fill(&mut self, origin: Square, moves: Vec<Move>, reply: &str) -> Result<(), ProtocolError> {
        self.clear();

        if moves.len() > MAX_CANDIDATES {
            return Err(ProtocolError::TooManyMoves {
                origin,
                reply: reply.to_string(),
            });
        }

        if let Some(mv) = moves.iter().find(|mv| mv.from != origin) {
            return Err(ProtocolError::ForeignOrigin {
                origin,
                from: mv.from,
                notation: mv.notation.clone(),
            });
        }

        self.origin = Some(origin);
        self.moves = moves;
        Ok(())
    }
}

impl Deref for CandidateSet {
    type Target = [Move];
    fn deref(&self) -> &Self::Target {
        &self.moves
    }
}

/// Parses the body of an `allmoves` reply, `"{ m1 m2 ... }"`, into its move tokens.
///
/// The list must open with `{` and be closed by a `}` token.
pub fn parse_move_list(origin: Square, reply: &str) -> Result<Vec<&str>, ProtocolError> {
    let malformed = || ProtocolError::MalformedMoveList {
        origin,
        reply: reply.to_string(),
    };

    let mut tokens = reply.split_ascii_whitespace();
    if tokens.next() != Some("{") {
        return Err(malformed());
    }

    let mut moves = Vec::with_capacity(MAX_CANDIDATES);
    for token in tokens.by_ref() {
        if token == "}" {
            // Nothing may follow the closing brace
            return match tokens.next() {
                None => Ok(moves),
                Some(_) => Err(malformed()),
            };
        }
        moves.push(token);
    }

    // Never saw the closing brace
    Err(malformed())
}

/// Asks the engine to describe the move `notation`.
///
/// A reply that is not three whitespace-separated squares is a [`ProtocolError`].
pub fn describe_move<E: EngineChannel + ?Sized>(
    engine: &mut E,
    capacity: usize,
    notation: &str,
) -> Result<Move, QueryError> {
    let reply = engine.ask(capacity, &Command::DescMove(notation.to_string()))?;
    let mv = Move::from_description(notation, &reply)?;

    debug!(
        "{notation}: {} -> {} (capture: {:?})",
        mv.from, mv.to, mv.capture
    );
    Ok(mv)
}

/// Fills `candidates` with every move the engine allows from `origin`.
///
/// `candidates` is cleared first, and stays empty if anything goes wrong.
pub fn enumerate_moves<E: EngineChannel + ?Sized>(
    engine: &mut E,
    capacity: usize,
    origin: Square,
    candidates: &mut CandidateSet,
) -> Result<(), QueryError> {
    candidates.clear();

    let reply = engine.ask(capacity, &Command::AllMoves(origin))?;
    let tokens = parse_move_list(origin, &reply)?;

    if tokens.len() > MAX_CANDIDATES {
        return Err(ProtocolError::TooManyMoves {
            origin,
            reply: reply.clone(),
        }
        .into());
    }

    let moves = tokens
        .into_iter()
        .map(|notation| describe_move(engine, capacity, notation))
        .collect::<Result<Vec<_>, _>>()?;

    candidates.fill(origin, moves, &reply)?;
    Ok(())
}
