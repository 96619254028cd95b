/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, ops::Index};

use thiserror::Error;

use crate::Square;

/// Errors encountered while decoding a FEN string.
///
/// Decoding never touches a previously decoded [`Board`], so these are always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("FEN contains unexpected char {found:?} at byte {index}")]
    UnexpectedChar { found: char, index: usize },

    #[error("FEN rank {rank} overflows 8 columns at byte {index}")]
    RankOverflow { rank: usize, index: usize },

    #[error("FEN rank separator at byte {index} does not follow a complete rank")]
    MisplacedSeparator { index: usize },

    #[error("FEN must describe exactly 8 complete ranks")]
    IncompleteBoard,

    #[error("FEN is missing the side to move")]
    MissingTurn,

    #[error("FEN side to move must be 'w' or 'b'. Got {0:?}")]
    InvalidTurn(char),

    #[error("FEN has trailing input after the side to move: {0:?}")]
    TrailingInput(String),
}

/// The two sides of the game.
///
/// Doubles as the "turn" of a position: the side whose move it is.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Color {
    #[default]
    White,
    Black,
}

impl Color {
    /// The FEN letter for this side to move.
    #[inline(always)]
    pub const fn char(&self) -> char {
        match self {
            Self::White => 'w',
            Self::Black => 'b',
        }
    }

    #[inline(always)]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'w' => Some(Self::White),
            'b' => Some(Self::Black),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Black => "Black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Contents of a single square.
///
/// The game only has pawns and knights, so a cell is one of five values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Cell {
    #[default]
    Empty,
    WhitePawn,
    WhiteKnight,
    BlackPawn,
    BlackKnight,
}

impl Cell {
    /// Parses a FEN piece letter. Digits and every other char yield `None`.
    #[inline(always)]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'P' => Some(Self::WhitePawn),
            'N' => Some(Self::WhiteKnight),
            'p' => Some(Self::BlackPawn),
            'n' => Some(Self::BlackKnight),
            _ => None,
        }
    }

    /// FEN letter of this cell, or `None` if it is empty.
    #[inline(always)]
    pub const fn char(&self) -> Option<char> {
        match self {
            Self::Empty => None,
            Self::WhitePawn => Some('P'),
            Self::WhiteKnight => Some('N'),
            Self::BlackPawn => Some('p'),
            Self::BlackKnight => Some('n'),
        }
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// The 64 cells of the board, indexed by [`Square`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board([Cell; Square::COUNT]);

impl Board {
    /// Creates a board with every cell empty.
    #[inline(always)]
    pub const fn new() -> Self {
        Self([Cell::Empty; Square::COUNT])
    }

    #[inline(always)]
    pub const fn cells(&self) -> &[Cell; Square::COUNT] {
        &self.0
    }

    #[inline(always)]
    pub fn set(&mut self, square: Square, cell: Cell) {
        self.0[square.index()] = cell;
    }

    #[inline(always)]
    pub fn is_occupied(&self, square: Square) -> bool {
        !self[square].is_empty()
    }

    /// Decodes a FEN string of the form `<ranks> <turn>` into a board and side to move.
    ///
    /// Rank groups are separated by `/` and are laid out in row-major order,
    /// so the first group fills row 0 (`a1..h1`). Within a group, `P`, `N`, `p`
    /// and `n` are pieces and `1`-`8` are runs of empty cells.
    ///
    /// The result is built in a fresh buffer; on error nothing is published.
    ///
    /// # Example
    /// ```
    /// # use cez::{Board, Color, Cell, Square};
    /// let (board, turn) = Board::from_fen("8/8/8/8/8/8/8/7n b").unwrap();
    /// assert_eq!(turn, Color::Black);
    /// assert_eq!(board[Square::H8], Cell::BlackKnight);
    /// ```
    pub fn from_fen(fen: &str) -> Result<(Self, Color), FenError> {
        let mut board = Self::new();
        let (mut row, mut col) = (0usize, 0usize);

        let mut chars = fen.char_indices();
        let mut terminated = false;

        for (index, c) in chars.by_ref() {
            match c {
                ' ' => {
                    terminated = true;
                    break;
                }

                '/' => {
                    if col != 8 || row >= 7 {
                        return Err(FenError::MisplacedSeparator { index });
                    }
                    row += 1;
                    col = 0;
                }

                // Adjacent digits ("62") are tolerated, as long as the rank does not overflow
                '1'..='8' => {
                    let empty = c as usize - '0' as usize;
                    if col + empty > 8 {
                        return Err(FenError::RankOverflow { rank: row, index });
                    }
                    col += empty;
                }

                _ => {
                    let Some(cell) = Cell::from_char(c) else {
                        return Err(FenError::UnexpectedChar { found: c, index });
                    };
                    if row > 7 || col > 7 {
                        return Err(FenError::RankOverflow { rank: row, index });
                    }
                    board.0[row * 8 + col] = cell;
                    col += 1;
                }
            }
        }

        if !terminated {
            return Err(FenError::MissingTurn);
        }

        if row != 7 || col != 8 {
            return Err(FenError::IncompleteBoard);
        }

        let turn = match chars.next() {
            Some((_, c)) => Color::from_char(c).ok_or(FenError::InvalidTurn(c))?,
            None => return Err(FenError::MissingTurn),
        };

        let rest = chars.as_str();
        if !rest.is_empty() {
            return Err(FenError::TrailingInput(rest.to_string()));
        }

        Ok((board, turn))
    }

    /// Encodes this board and side to move as a FEN string.
    ///
    /// Runs of empty cells are merged into a single digit, so the output never
    /// contains two adjacent digits.
    ///
    /// # Example
    /// ```
    /// # use cez::{Board, Color};
    /// assert_eq!(Board::new().to_fen(Color::White), "8/8/8/8/8/8/8/8 w");
    /// ```
    pub fn to_fen(&self, turn: Color) -> String {
        // 64 cells, 7 separators, space, turn
        let mut fen = String::with_capacity(73);

        for (i, cell) in self.0.iter().enumerate() {
            if let Some(piece) = cell.char() {
                fen.push(piece);
            } else {
                match fen.pop() {
                    Some(digit @ '1'..='7') => fen.push((digit as u8 + 1) as char),
                    Some(prev) => {
                        fen.push(prev);
                        fen.push('1');
                    }
                    None => fen.push('1'),
                }
            }

            if i % 8 == 7 && i / 8 < 7 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(turn.char());

        fen
    }
}

impl Default for Board {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Square> for Board {
    type Output = Cell;
    #[inline(always)]
    fn index(&self, index: Square) -> &Self::Output {
        &self.0[index.index()]
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..8u8).rev() {
            write!(f, "{}| ", row + 1)?;

            for col in 0..8u8 {
                let square = Square::new(row, col).unwrap_or_default();
                write!(f, "{} ", self[square].char().unwrap_or('.'))?;
            }

            writeln!(f)?;
        }

        write!(f, " +")?;
        for _ in 0..8 {
            write!(f, "--")?;
        }
        write!(f, "\n   a b c d e f g h")
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen(Color::White))
    }
}
