//! Context and action feature levels.
//!
//! Context levels describe the position the mistake was made in; action
//! levels describe the move itself. All of them are closed enums generated by
//! the `feature_level!` macro so that their labels are fixed at compile time.

feature_level! {
    /// Stage of the game derived from move count and material on the board.
    pub enum GamePhase {
        Opening => "Opening",
        Middlegame => "Middlegame",
        Endgame => "Endgame",
    }
}

feature_level! {
    /// Material balance from the mover's perspective.
    pub enum MaterialBalance {
        Winning => "Winning",
        Equal => "Equal",
        Losing => "Losing",
    }
}

feature_level! {
    /// Coarse density of the position, measured by total piece count.
    pub enum BoardComplexity {
        Low => "Low",
        Medium => "Medium",
        High => "High",
    }
}

feature_level! {
    /// Static safety of one side's king.
    pub enum KingSafety {
        Safe => "Safe",
        Exposed => "Exposed",
        InCheck => "In_Check",
    }
}

feature_level! {
    /// Whether a side has castled, may still castle, or can no longer castle.
    pub enum CastlingStatus {
        HasCastled => "Has_Castled",
        CanCastle => "Can_Castle",
        CannotCastle => "Cannot_Castle",
    }
}

feature_level! {
    /// Kind of piece that made the move.
    pub enum PieceKind {
        Pawn => "Pawn",
        Knight => "Knight",
        Bishop => "Bishop",
        Rook => "Rook",
        Queen => "Queen",
        King => "King",
    }
}

feature_level! {
    /// Shape of the move: a capture takes precedence over a check.
    pub enum MoveType {
        Quiet => "Quiet",
        Capture => "Capture",
        Check => "Check",
    }
}

impl From<chess::Piece> for PieceKind {
    fn from(piece: chess::Piece) -> Self {
        match piece {
            chess::Piece::Pawn => Self::Pawn,
            chess::Piece::Knight => Self::Knight,
            chess::Piece::Bishop => Self::Bishop,
            chess::Piece::Rook => Self::Rook,
            chess::Piece::Queen => Self::Queen,
            chess::Piece::King => Self::King,
        }
    }
}

impl PieceKind {
    /// Conventional piece value in pawns.
    ///
    /// The king is valued at 100 so that it never counts as a cheap attacker;
    /// it is never included in material sums.
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::Pawn => 1,
            Self::Knight | Self::Bishop => 3,
            Self::Rook => 5,
            Self::Queen => 9,
            Self::King => 100,
        }
    }
}
