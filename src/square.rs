/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Combines a row and a column into a raw board position.
///
/// No bounds checking is performed: out-of-range inputs yield an out-of-range
/// position, which must be rejected with [`is_valid`] before it is used as a [`Square`].
///
/// # Example
/// ```
/// # use cez::{to_position, is_valid};
/// assert_eq!(to_position(1, 3), 11);
/// assert!(!is_valid(to_position(8, 0)));
/// ```
#[inline(always)]
pub const fn to_position(row: i32, col: i32) -> i32 {
    row * 8 + col
}

/// Returns `true` if `position` lies within `[0, 63]`.
#[inline(always)]
pub const fn is_valid(position: i32) -> bool {
    position >= 0 && position < Square::COUNT as i32
}

/// Error returned when a string or integer does not name a square on the board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid square {0:?}: must be between a1 and h8")]
pub struct SquareError(pub String);

/// A single square on the `8x8` board.
///
/// Squares are indexed so that `square = col + row * 8`:
/// ```text
/// 8| 56 57 58 59 60 61 62 63
/// 7| 48 49 50 51 52 53 54 55
/// 6| 40 41 42 43 44 45 46 47
/// 5| 32 33 34 35 36 37 38 39
/// 4| 24 25 26 27 28 29 30 31
/// 3| 16 17 18 19 20 21 22 23
/// 2|  8  9 10 11 12 13 14 15
/// 1|  0  1  2  3  4  5  6  7
///  +------------------------
///    a  b  c  d  e  f  g  h
/// ```
///
/// A `Square` is always valid; the "invalid position" of the engine protocol is
/// represented as `Option::<Square>::None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Square(u8);

impl Square {
    /// Number of squares on the board.
    pub const COUNT: usize = 64;

    pub const A1: Self = Self(0);
    pub const H1: Self = Self(7);
    pub const A8: Self = Self(56);
    pub const H8: Self = Self(63);

    /// Creates a [`Square`] from a row and column, returning `None` if either is out of bounds.
    #[inline(always)]
    pub const fn new(row: u8, col: u8) -> Option<Self> {
        if row < 8 && col < 8 {
            Some(Self(row * 8 + col))
        } else {
            None
        }
    }

    /// Creates a [`Square`] from an index in `[0, 63]`.
    #[inline(always)]
    pub fn from_index(index: usize) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index as u8))
    }

    /// Iterates over all squares in row-major order, starting at `a1`.
    pub fn iter() -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }

    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub const fn row(&self) -> u8 {
        self.0 >> 3
    }

    #[inline(always)]
    pub const fn col(&self) -> u8 {
        self.0 & 7
    }

    /// File letter of this square, `'a'..='h'`.
    #[inline(always)]
    pub const fn file_char(&self) -> char {
        (b'a' + self.col()) as char
    }

    /// Rank digit of this square, `'1'..='8'`.
    #[inline(always)]
    pub const fn rank_char(&self) -> char {
        (b'1' + self.row()) as char
    }

    /// Parses a square from its two-character algebraic form.
    ///
    /// Returns `None` for anything that is not exactly a file letter `a-h`
    /// followed by a rank digit `1-8`, including the engine's "no capture" token.
    ///
    /// # Example
    /// ```
    /// # use cez::Square;
    /// assert_eq!(Square::from_uci("c4").map(|sq| sq.index()), Some(26));
    /// assert!(Square::from_uci("-").is_none());
    /// assert!(Square::from_uci("i1").is_none());
    /// ```
    pub fn from_uci(square: &str) -> Option<Self> {
        let &[file, rank] = square.as_bytes() else {
            return None;
        };

        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return None;
        }

        Self::new(rank - b'1', file - b'a')
    }

    /// Converts this square to its two-character algebraic form.
    ///
    /// # Example
    /// ```
    /// # use cez::Square;
    /// assert_eq!(Square::H8.to_uci(), "h8");
    /// ```
    pub fn to_uci(self) -> String {
        format!("{}{}", self.file_char(), self.rank_char())
    }
}

impl FromStr for Square {
    type Err = SquareError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uci(s).ok_or_else(|| SquareError(s.to_string()))
    }
}

impl TryFrom<i32> for Square {
    type Error = SquareError;
    fn try_from(position: i32) -> Result<Self, Self::Error> {
        if is_valid(position) {
            Ok(Self(position as u8))
        } else {
            Err(SquareError(position.to_string()))
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({})", self.0)
    }
}
