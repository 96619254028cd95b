/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use crate::Square;

/// A command understood by the engine's line protocol.
///
/// Each variant renders to exactly one line of text (without the terminator),
/// so the set of commands that can be sent is fixed at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `savefen`: reply is the FEN of the current position.
    SaveFen,

    /// `status -i`: reply is the status code as a decimal integer.
    Status,

    /// `makemove <move>`: plays a move. No reply.
    MakeMove(String),

    /// `descmove <move>`: reply is `"<from> <to> <capture>"`.
    DescMove(String),

    /// `allmoves <square>`: reply is `"{ m1 m2 ... }"`.
    AllMoves(Square),

    /// `evaluate -r`: starts a background search whose reply is a single move.
    EvaluateRandom,
}

impl Command {
    /// Returns `true` if the engine answers this command with a reply line.
    pub const fn expects_reply(&self) -> bool {
        !matches!(self, Self::MakeMove(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaveFen => write!(f, "savefen"),
            Self::Status => write!(f, "status -i"),
            Self::MakeMove(mv) => write!(f, "makemove {mv}"),
            Self::DescMove(mv) => write!(f, "descmove {mv}"),
            Self::AllMoves(square) => write!(f, "allmoves {square}"),
            Self::EvaluateRandom => write!(f, "evaluate -r"),
        }
    }
}

/// Result of a non-blocking check on the engine's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NotReady,
    Ready,
}
