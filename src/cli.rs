/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{builder::PossibleValue, Parser, ValueEnum};

use crate::{
    EngineConfig, Player, Players, Square, DEFAULT_PROTOCOL_FLAG, DEFAULT_REPLY_CAPACITY,
};

/// Play the pawns-and-knights game against (or alongside) an external engine.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Path to the engine executable.
    pub engine: PathBuf,

    /// Argument that puts the engine into its line-protocol mode.
    #[arg(long, default_value = DEFAULT_PROTOCOL_FLAG, allow_hyphen_values = true)]
    pub protocol_flag: String,

    /// Which side(s) the engine plays.
    #[arg(short, long, default_value = "black")]
    pub engine_plays: EngineSides,

    /// Size of the buffer used to read each reply from the engine.
    #[arg(long, default_value_t = DEFAULT_REPLY_CAPACITY)]
    pub reply_capacity: usize,

    /// Milliseconds between two ticks of the front-end loop.
    #[arg(long, default_value_t = 11)]
    pub frame_ms: u64,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(&self.engine).args([self.protocol_flag.as_str()])
    }

    pub fn players(&self) -> Players {
        self.engine_plays.players()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

/// The sides controlled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineSides {
    White,
    #[default]
    Black,
    Both,
    None,
}

impl EngineSides {
    pub const fn players(&self) -> Players {
        use Player::*;
        match self {
            Self::White => Players::new(Engine, Human),
            Self::Black => Players::new(Human, Engine),
            Self::Both => Players::new(Engine, Engine),
            Self::None => Players::new(Human, Human),
        }
    }
}

impl ValueEnum for EngineSides {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::White, Self::Black, Self::Both, Self::None]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        let value = match self {
            Self::White => PossibleValue::new("white").alias("w"),
            Self::Black => PossibleValue::new("black").alias("b"),
            Self::Both => PossibleValue::new("both"),
            Self::None => PossibleValue::new("none").alias("hotseat"),
        };

        Some(value)
    }
}

/// A command typed into the text front-end.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    multicall = true,
    about,
    rename_all = "lower",
    override_usage("<COMMAND> [SQUARE]")
)]
pub enum FrontendCommand {
    /// Click a square: plays a move onto it if one is selected, otherwise selects it.
    #[command(alias = "c")]
    Click { square: Square },

    /// Select the piece on a square and list its moves.
    #[command(alias = "s")]
    Select { square: Square },

    /// Play the selected piece's move onto a square.
    #[command(alias = "t")]
    Target { square: Square },

    /// Print the candidate moves of the selected square.
    #[command(alias = "m")]
    Moves,

    /// Print the board.
    #[command(alias = "d")]
    Display,

    /// Print every move played so far.
    History,

    /// Print the game status and whose turn it is.
    Status,

    /// Quit, shutting the engine down.
    #[command(aliases = ["quit", "q"])]
    Exit,
}

impl FromStr for FrontendCommand {
    type Err = clap::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse_from(s.split_ascii_whitespace())
    }
}
