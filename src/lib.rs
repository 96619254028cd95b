/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Command-line arguments and the commands accepted by the text front-end.
mod cli;

/// The engine subprocess and the transport trait used to talk to it.
mod engine;

/// Board, pieces, and FEN encoding/decoding.
mod fen;

/// Moves as described by the engine, and the candidate moves of a square.
mod moves;

/// Commands of the engine's line protocol.
mod protocol;

/// Turn orchestration between human input and the engine.
mod session;

/// Squares and raw board positions.
mod square;

/// Game status codes.
mod status;

pub use cli::*;
pub use engine::*;
pub use fen::*;
pub use moves::*;
pub use protocol::*;
pub use session::*;
pub use square::*;
pub use status::*;
