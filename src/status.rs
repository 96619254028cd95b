/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// How a game has ended, or that it has not.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Outcome {
    Ongoing,
    Draw,
    WhiteWins,
    BlackWins,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ongoing => "ongoing",
            Self::Draw => "draw",
            Self::WhiteWins => "White wins",
            Self::BlackWins => "Black wins",
        };
        write!(f, "{s}")
    }
}

/// Raw status code reported by the engine's `status -i` command.
///
/// The high nibble holds the [`Outcome`]. The low nibble is reserved and kept as-is.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(transparent)]
pub struct Status(pub i64);

impl Status {
    /// Parses a status reply as a base-10 integer.
    ///
    /// Leading whitespace and a sign are accepted and parsing stops at the first
    /// non-digit, so a reply without leading digits yields `0`.
    ///
    /// # Example
    /// ```
    /// # use cez::{Status, Outcome};
    /// assert_eq!(Status::parse("32\n").outcome(), Some(Outcome::WhiteWins));
    /// assert_eq!(Status::parse("garbage"), Status(0));
    /// ```
    pub fn parse(reply: &str) -> Self {
        let s = reply.trim_start();
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let value = digits
            .bytes()
            .take_while(u8::is_ascii_digit)
            .fold(0i64, |acc, d| {
                acc.saturating_mul(10).saturating_add((d - b'0') as i64)
            });

        Self(if negative { -value } else { value })
    }

    /// The game outcome stored in the high nibble, or `None` if the nibble holds an unknown value.
    pub const fn outcome(&self) -> Option<Outcome> {
        match (self.0 >> 4) & 0xF {
            0 => Some(Outcome::Ongoing),
            1 => Some(Outcome::Draw),
            2 => Some(Outcome::WhiteWins),
            3 => Some(Outcome::BlackWins),
            _ => None,
        }
    }

    /// The reserved low nibble.
    #[inline(always)]
    pub const fn reserved(&self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// Returns `true` if the high nibble reports anything other than an ongoing game.
    #[inline(always)]
    pub const fn is_over(&self) -> bool {
        !matches!(self.outcome(), Some(Outcome::Ongoing))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome() {
            Some(outcome) => write!(f, "{outcome}"),
            None => write!(f, "unknown status {:#04x}", self.0),
        }
    }
}
