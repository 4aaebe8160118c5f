//! Static board queries over an immutable position snapshot.
//!
//! [`Position`] pairs a [`chess::Board`] with the full-move number (which the
//! board itself does not track) and answers every question the feature
//! extractor asks about a position without searching and without mutating
//! the board.
//!
//! Hypothetical queries ("would this square still be attacked if that piece
//! were gone") take an explicit occupancy [`BitBoard`] instead of temporarily
//! removing pieces, so the same snapshot can be shared freely.
//!
//! # Example
//!
//! ```
//! use blunderscope_engine::{CastlingStatus, KingSafety, Position};
//! use chess::Color;
//!
//! let position = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 24").unwrap();
//! assert_eq!(position.castling_status(Color::White), CastlingStatus::HasCastled);
//! assert_eq!(position.king_safety(Color::Black), KingSafety::Safe);
//! ```

use std::str::FromStr as _;

use chess::{
    BitBoard, Board, BoardStatus, ChessMove, Color, EMPTY, Piece, Square, get_bishop_moves,
    get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves,
};

use crate::{
    BoardComplexity, CastlingStatus, GamePhase, InvalidFenError, KingSafety, MaterialBalance,
    MoveType, PieceKind,
};

/// Opening requires a full-move number strictly below this.
pub const OPENING_MAX_MOVE: u32 = 12;
/// Opening requires strictly more pieces than this.
pub const OPENING_MIN_PIECES: u32 = 28;
/// Endgame starts strictly below this piece count.
pub const ENDGAME_MAX_PIECES: u32 = 14;
/// High complexity starts strictly above this piece count.
pub const HIGH_COMPLEXITY_PIECES: u32 = 26;
/// Low complexity starts strictly below this piece count.
pub const LOW_COMPLEXITY_PIECES: u32 = 10;
/// Material difference, in pawns, beyond which one side is winning.
pub const MATERIAL_MARGIN: f64 = 1.5;
/// A king is exposed when more adjacent squares than this are attacked.
pub const EXPOSED_KING_SQUARES: u32 = 3;

const MATERIAL_PIECES: [Piece; 5] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
];

/// A board position together with its move counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Default for Position {
    fn default() -> Self {
        Self::initial()
    }
}

impl Position {
    /// The standard starting position at move 1.
    #[must_use]
    pub fn initial() -> Self {
        Self::new(Board::default(), 0, 1)
    }

    #[must_use]
    pub fn new(board: Board, halfmove_clock: u32, fullmove_number: u32) -> Self {
        Self {
            board,
            halfmove_clock,
            fullmove_number: fullmove_number.max(1),
        }
    }

    /// Parses a FEN string. Missing move counters default to 0 and 1.
    pub fn from_fen(fen: &str) -> Result<Self, InvalidFenError> {
        let invalid = || InvalidFenError {
            fen: fen.to_owned(),
        };
        let board = Board::from_str(fen).map_err(|_| invalid())?;
        let mut counters = fen.split_whitespace().skip(4);
        let halfmove_clock = match counters.next() {
            Some(field) => field.parse().map_err(|_| invalid())?,
            None => 0,
        };
        let fullmove_number = match counters.next() {
            Some(field) => field.parse().map_err(|_| invalid())?,
            None => 1,
        };
        Ok(Self::new(board, halfmove_clock, fullmove_number))
    }

    /// Serializes the position as FEN.
    #[must_use]
    pub fn fen(&self) -> String {
        let board = self.board.to_string();
        let placement = board.split_whitespace().take(4).collect::<Vec<_>>().join(" ");
        format!(
            "{placement} {} {}",
            self.halfmove_clock, self.fullmove_number
        )
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Plies since the last capture or pawn move.
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    #[must_use]
    pub fn status(&self) -> BoardStatus {
        self.board.status()
    }

    #[must_use]
    pub fn is_legal(&self, mv: ChessMove) -> bool {
        self.board.legal(mv)
    }

    /// Returns the position after `mv`. The move is assumed to be legal.
    #[must_use]
    pub fn play(&self, mv: ChessMove) -> Self {
        let fullmove_number = match self.side_to_move() {
            Color::White => self.fullmove_number,
            Color::Black => self.fullmove_number + 1,
        };
        let resets_clock = self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || self.board.piece_on(mv.get_dest()).is_some();
        let halfmove_clock = if resets_clock {
            0
        } else {
            self.halfmove_clock + 1
        };
        Self {
            board: self.board.make_move_new(mv),
            halfmove_clock,
            fullmove_number,
        }
    }

    /// Total number of pieces on the board, kings included.
    #[must_use]
    pub fn piece_count(&self) -> u32 {
        self.board.combined().popcnt()
    }

    #[must_use]
    pub fn piece_kind_on(&self, square: Square) -> Option<PieceKind> {
        self.board.piece_on(square).map(PieceKind::from)
    }

    /// Pieces of `color` attacking `square` on the current board.
    #[must_use]
    pub fn attackers(&self, color: Color, square: Square) -> BitBoard {
        self.attackers_with_occupancy(color, square, *self.board.combined())
    }

    /// Pieces of `color` attacking `square` if the board were occupied by `occupied`.
    ///
    /// Pieces absent from `occupied` neither attack nor block. This is how
    /// "attacked if the piece on X were gone" is asked without touching the
    /// board.
    #[must_use]
    pub fn attackers_with_occupancy(
        &self,
        color: Color,
        square: Square,
        occupied: BitBoard,
    ) -> BitBoard {
        let board = &self.board;
        let own = *board.color_combined(color) & occupied;
        let queens = *board.pieces(Piece::Queen);
        let straight = (*board.pieces(Piece::Rook) | queens) & own;
        let diagonal = (*board.pieces(Piece::Bishop) | queens) & own;
        let knights = *board.pieces(Piece::Knight) & own;
        let kings = *board.pieces(Piece::King) & own;
        let pawns = *board.pieces(Piece::Pawn) & own;

        (get_rook_moves(square, occupied) & straight)
            | (get_bishop_moves(square, occupied) & diagonal)
            | (get_knight_moves(square) & knights)
            | (get_king_moves(square) & kings)
            // a pawn of `color` attacks `square` iff a pawn of the other color on
            // `square` would attack it
            | get_pawn_attacks(square, !color, pawns)
    }

    #[must_use]
    pub fn is_attacked_by(&self, color: Color, square: Square) -> bool {
        self.attackers(color, square) != EMPTY
    }

    /// Squares attacked by the piece standing on `square`, or `None` if it is empty.
    #[must_use]
    pub fn attacks_from(&self, square: Square, occupied: BitBoard) -> Option<BitBoard> {
        let piece = self.board.piece_on(square)?;
        let color = self.board.color_on(square)?;
        let attacks = match piece {
            Piece::Pawn => get_pawn_attacks(square, color, !EMPTY),
            Piece::Knight => get_knight_moves(square),
            Piece::Bishop => get_bishop_moves(square, occupied),
            Piece::Rook => get_rook_moves(square, occupied),
            Piece::Queen => get_bishop_moves(square, occupied) | get_rook_moves(square, occupied),
            Piece::King => get_king_moves(square),
        };
        Some(attacks)
    }

    /// Value of the cheapest piece in `attackers`, if any.
    #[must_use]
    pub fn cheapest_value(&self, attackers: BitBoard) -> Option<u32> {
        attackers
            .filter_map(|sq| self.piece_kind_on(sq))
            .map(PieceKind::value)
            .min()
    }

    /// Whether the piece on `square` is pinned to its king.
    ///
    /// Pins are reported for the side to move only, which is the side whose
    /// move is being examined.
    #[must_use]
    pub fn is_pinned(&self, square: Square) -> bool {
        (*self.board.pinned() & BitBoard::from_square(square)) != EMPTY
    }

    /// Whether the piece on `square` currently protects some other friendly,
    /// non-king piece that the opponent attacks once this piece is removed.
    #[must_use]
    pub fn is_defending(&self, square: Square) -> bool {
        let Some(color) = self.board.color_on(square) else {
            return false;
        };
        let occupied = *self.board.combined();
        let Some(covered) = self.attacks_from(square, occupied) else {
            return false;
        };
        let vacated = occupied ^ BitBoard::from_square(square);
        let protected =
            covered & *self.board.color_combined(color) & !*self.board.pieces(Piece::King);
        protected
            .into_iter()
            .any(|target| self.attackers_with_occupancy(!color, target, vacated) != EMPTY)
    }

    /// Whether the piece moved by `mv` is left en prise on its destination.
    ///
    /// The test runs on the position after the move: the destination must be
    /// attacked by the opponent and either undefended or attacked by something
    /// cheaper than the moved piece (the promoted piece for promotions).
    #[must_use]
    pub fn is_hanging_after(&self, mv: ChessMove) -> bool {
        let mover = self.side_to_move();
        let Some(piece) = self.board.piece_on(mv.get_source()) else {
            return false;
        };
        let placed = PieceKind::from(mv.get_promotion().unwrap_or(piece));
        let after = self.play(mv);
        let dest = mv.get_dest();

        let attackers = after.attackers(!mover, dest);
        let Some(cheapest) = after.cheapest_value(attackers) else {
            return false;
        };
        if after.attackers(mover, dest) == EMPTY {
            return true;
        }
        placed.value() > cheapest
    }

    #[must_use]
    pub fn game_phase(&self) -> GamePhase {
        let pieces = self.piece_count();
        if self.fullmove_number < OPENING_MAX_MOVE && pieces > OPENING_MIN_PIECES {
            GamePhase::Opening
        } else if pieces < ENDGAME_MAX_PIECES {
            GamePhase::Endgame
        } else {
            GamePhase::Middlegame
        }
    }

    /// Sum of piece values for `color`, kings excluded.
    #[must_use]
    pub fn material(&self, color: Color) -> u32 {
        let own = *self.board.color_combined(color);
        MATERIAL_PIECES
            .iter()
            .map(|&piece| {
                (*self.board.pieces(piece) & own).popcnt() * PieceKind::from(piece).value()
            })
            .sum()
    }

    #[must_use]
    pub fn material_balance(&self, color: Color) -> MaterialBalance {
        let diff = f64::from(self.material(color)) - f64::from(self.material(!color));
        if diff > MATERIAL_MARGIN {
            MaterialBalance::Winning
        } else if diff < -MATERIAL_MARGIN {
            MaterialBalance::Losing
        } else {
            MaterialBalance::Equal
        }
    }

    #[must_use]
    pub fn board_complexity(&self) -> BoardComplexity {
        let pieces = self.piece_count();
        if pieces > HIGH_COMPLEXITY_PIECES {
            BoardComplexity::High
        } else if pieces < LOW_COMPLEXITY_PIECES {
            BoardComplexity::Low
        } else {
            BoardComplexity::Medium
        }
    }

    #[must_use]
    pub fn king_safety(&self, color: Color) -> KingSafety {
        let king = self.board.king_square(color);
        if self.is_attacked_by(!color, king) {
            return KingSafety::InCheck;
        }
        let attacked = get_king_moves(king)
            .filter(|&sq| self.is_attacked_by(!color, sq))
            .count();
        if attacked > EXPOSED_KING_SQUARES as usize {
            KingSafety::Exposed
        } else {
            KingSafety::Safe
        }
    }

    #[must_use]
    pub fn castling_status(&self, color: Color) -> CastlingStatus {
        let king = self.board.king_square(color);
        let castled_squares = match color {
            Color::White => [Square::G1, Square::C1],
            Color::Black => [Square::G8, Square::C8],
        };
        let rights = self.board.castle_rights(color);
        let no_rights = rights == chess::CastleRights::NoRights;
        if castled_squares.contains(&king) && no_rights {
            CastlingStatus::HasCastled
        } else if !no_rights {
            CastlingStatus::CanCastle
        } else {
            CastlingStatus::CannotCastle
        }
    }

    #[must_use]
    pub fn is_capture(&self, mv: ChessMove) -> bool {
        if self.board.piece_on(mv.get_dest()).is_some() {
            return true;
        }
        self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
    }

    #[must_use]
    pub fn gives_check(&self, mv: ChessMove) -> bool {
        *self.board.make_move_new(mv).checkers() != EMPTY
    }

    #[must_use]
    pub fn move_type(&self, mv: ChessMove) -> MoveType {
        if self.is_capture(mv) {
            MoveType::Capture
        } else if self.gives_check(mv) {
            MoveType::Check
        } else {
            MoveType::Quiet
        }
    }
}
