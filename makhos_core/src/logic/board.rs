use crate::engine::zobrist::ZobristKeys;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use std::fmt;

pub const BOARD_SIZE: usize = 8;
const NUM_SQUARES: usize = BOARD_SIZE * BOARD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    White,
    Black,
}

impl Player {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::White => 0,
            Self::Black => 1,
        }
    }

    /// Row direction a Man of this player moves in.
    #[must_use]
    pub const fn forward(self) -> isize {
        match self {
            Self::White => 1,
            Self::Black => -1,
        }
    }

    /// Row on which this player's Men promote.
    #[must_use]
    pub const fn promotion_row(self) -> usize {
        match self {
            Self::White => BOARD_SIZE - 1,
            Self::Black => 0,
        }
    }

    #[must_use]
    pub const fn home_row(self) -> usize {
        self.opposite().promotion_row()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Man,
    King,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub owner: Player,
    pub kind: PieceKind,
    pub position: BoardCoordinate,
}

impl Piece {
    #[must_use]
    pub const fn man(owner: Player, position: BoardCoordinate) -> Self {
        Self {
            owner,
            kind: PieceKind::Man,
            position,
        }
    }

    #[must_use]
    pub const fn king(owner: Player, position: BoardCoordinate) -> Self {
        Self {
            owner,
            kind: PieceKind::King,
            position,
        }
    }

    #[must_use]
    pub const fn is_king(&self) -> bool {
        matches!(self.kind, PieceKind::King)
    }
}

/// A square on the board. Always in range; construct with [`BoardCoordinate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BoardCoordinate {
    row: u8,
    col: u8,
}

impl BoardCoordinate {
    pub const ORIGIN: Self = Self { row: 0, col: 0 };

    #[must_use]
    pub const fn new(row: usize, col: usize) -> Option<Self> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(Self {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    #[must_use]
    pub const fn from_signed(row: isize, col: isize) -> Option<Self> {
        if row < 0 || col < 0 {
            return None;
        }
        Self::new(row as usize, col as usize)
    }

    #[must_use]
    pub const fn from_index(sq: usize) -> Option<Self> {
        Self::new(sq / BOARD_SIZE, sq % BOARD_SIZE)
    }

    #[must_use]
    pub const fn row(self) -> usize {
        self.row as usize
    }

    #[must_use]
    pub const fn col(self) -> usize {
        self.col as usize
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.row() * BOARD_SIZE + self.col()
    }

    #[must_use]
    pub const fn offset(self, dr: isize, dc: isize) -> Option<Self> {
        Self::from_signed(self.row as isize + dr, self.col as isize + dc)
    }

    #[must_use]
    pub const fn is_dark(self) -> bool {
        (self.row + self.col) % 2 == 1
    }

    /// Manhattan distance between two squares.
    #[must_use]
    pub const fn distance(self, other: Self) -> usize {
        self.row.abs_diff(other.row) as usize + self.col.abs_diff(other.col) as usize
    }

    /// Manhattan distance to the board centre (3.5, 3.5), doubled so it
    /// stays integral.
    #[must_use]
    pub const fn center_distance_x2(self) -> i32 {
        (2 * self.row as i32 - 7).abs() + (2 * self.col as i32 - 7).abs()
    }

    #[must_use]
    pub const fn is_edge(self) -> bool {
        self.row == 0 || self.row == 7 || self.col == 0 || self.col == 7
    }
}

impl fmt::Display for BoardCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", char::from(b'a' + self.col), self.row + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    #[serde(with = "BigArray")]
    grid: [Option<Piece>; NUM_SQUARES],
    // Indexed by player.index()
    men: [u8; 2],
    kings: [u8; 2],
    pub zobrist_hash: u64,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Standard starting position: eight Men per side on the two rows
    /// nearest each player.
    #[must_use]
    pub fn new() -> Self {
        let mut board = Self::empty();
        board.setup_initial_position();
        board
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self {
            grid: [None; NUM_SQUARES],
            men: [0; 2],
            kings: [0; 2],
            zobrist_hash: 0,
        }
    }

    fn setup_initial_position(&mut self) {
        for (player, rows) in [(Player::White, [0, 1]), (Player::Black, [6, 7])] {
            for row in rows {
                for col in 0..BOARD_SIZE {
                    if let Some(pos) = BoardCoordinate::new(row, col) {
                        if pos.is_dark() {
                            self.place(pos, Piece::man(player, pos));
                        }
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    #[must_use]
    pub const fn is_dark_square(pos: BoardCoordinate) -> bool {
        pos.is_dark()
    }

    #[must_use]
    pub fn piece_at(&self, pos: BoardCoordinate) -> Option<Piece> {
        self.grid.get(pos.index()).copied().flatten()
    }

    /// Lookup by raw coordinates; anything off the board is empty.
    #[must_use]
    pub fn get(&self, row: isize, col: isize) -> Option<Piece> {
        BoardCoordinate::from_signed(row, col).and_then(|pos| self.piece_at(pos))
    }

    #[must_use]
    pub fn is_empty_at(&self, pos: BoardCoordinate) -> bool {
        self.piece_at(pos).is_none()
    }

    /// Puts `piece` on `pos`. Fails on light squares and occupied squares.
    pub fn place(&mut self, pos: BoardCoordinate, piece: Piece) -> bool {
        if !pos.is_dark() || !self.is_empty_at(pos) {
            return false;
        }
        self.add_piece(pos, Piece { position: pos, ..piece });
        true
    }

    pub fn remove(&mut self, pos: BoardCoordinate) -> Option<Piece> {
        let piece = self.piece_at(pos)?;
        self.remove_piece(pos, piece);
        Some(piece)
    }

    /// Relocates the piece on `from` to the empty dark square `to`.
    pub fn move_piece(&mut self, from: BoardCoordinate, to: BoardCoordinate) -> bool {
        if !to.is_dark() || !self.is_empty_at(to) {
            return false;
        }
        let Some(piece) = self.remove(from) else {
            return false;
        };
        self.add_piece(to, Piece { position: to, ..piece });
        true
    }

    /// Man to King. False for an empty square or a piece already crowned.
    pub fn promote(&mut self, pos: BoardCoordinate) -> bool {
        match self.piece_at(pos) {
            Some(piece) if !piece.is_king() => {
                self.remove_piece(pos, piece);
                self.add_piece(
                    pos,
                    Piece {
                        kind: PieceKind::King,
                        ..piece
                    },
                );
                true
            }
            _ => false,
        }
    }

    fn add_piece(&mut self, pos: BoardCoordinate, piece: Piece) {
        let Some(slot) = self.grid.get_mut(pos.index()) else {
            return;
        };
        *slot = Some(piece);
        self.zobrist_hash ^= ZobristKeys::get().piece_key(piece.kind, piece.owner, pos.index());
        let counts = match piece.kind {
            PieceKind::Man => &mut self.men,
            PieceKind::King => &mut self.kings,
        };
        if let Some(count) = counts.get_mut(piece.owner.index()) {
            *count += 1;
        }
    }

    fn remove_piece(&mut self, pos: BoardCoordinate, piece: Piece) {
        let Some(slot) = self.grid.get_mut(pos.index()) else {
            return;
        };
        *slot = None;
        self.zobrist_hash ^= ZobristKeys::get().piece_key(piece.kind, piece.owner, pos.index());
        let counts = match piece.kind {
            PieceKind::Man => &mut self.men,
            PieceKind::King => &mut self.kings,
        };
        if let Some(count) = counts.get_mut(piece.owner.index()) {
            *count = count.saturating_sub(1);
        }
    }

    #[must_use]
    pub fn count_pieces(&self, player: Player) -> u32 {
        self.count_men(player) + self.count_kings(player)
    }

    #[must_use]
    pub fn count_men(&self, player: Player) -> u32 {
        self.men.get(player.index()).map_or(0, |&n| u32::from(n))
    }

    #[must_use]
    pub fn count_kings(&self, player: Player) -> u32 {
        self.kings.get(player.index()).map_or(0, |&n| u32::from(n))
    }

    #[must_use]
    pub fn total_pieces(&self) -> u32 {
        self.count_pieces(Player::White) + self.count_pieces(Player::Black)
    }

    /// All pieces on the board in square order.
    pub fn pieces(&self) -> impl Iterator<Item = Piece> + '_ {
        self.grid.iter().filter_map(|slot| *slot)
    }

    #[must_use]
    pub fn pieces_of(&self, player: Player) -> Vec<Piece> {
        self.pieces().filter(|p| p.owner == player).collect()
    }

    /// Signed-magnitude matrix: 0 empty, +1/+2 for `perspective`'s man/king,
    /// -1/-2 for the opponent's.
    #[must_use]
    pub fn to_matrix(&self, perspective: Player) -> [[i8; BOARD_SIZE]; BOARD_SIZE] {
        let mut matrix = [[0; BOARD_SIZE]; BOARD_SIZE];
        for piece in self.pieces() {
            let magnitude = if piece.is_king() { 2 } else { 1 };
            let value = if piece.owner == perspective {
                magnitude
            } else {
                -magnitude
            };
            if let Some(cell) = matrix
                .get_mut(piece.position.row())
                .and_then(|row| row.get_mut(piece.position.col()))
            {
                *cell = value;
            }
        }
        matrix
    }

    #[must_use]
    pub fn calculate_initial_hash(&self) -> u64 {
        let keys = ZobristKeys::get();
        self.pieces().fold(0, |hash, piece| {
            hash ^ keys.piece_key(piece.kind, piece.owner, piece.position.index())
        })
    }

    /// Compact text form: rows 7 down to 0 separated by `/`, `w`/`b` for
    /// Men, `W`/`B` for Kings, digits for runs of empty squares, then the
    /// side to move.
    #[must_use]
    pub fn to_fen_string(&self, turn: Player) -> String {
        let mut fen = String::new();
        for row in (0..BOARD_SIZE).rev() {
            let mut empty_count = 0;
            for col in 0..BOARD_SIZE {
                let piece = BoardCoordinate::new(row, col).and_then(|pos| self.piece_at(pos));
                if let Some(piece) = piece {
                    if empty_count > 0 {
                        fen.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    let ch = match piece.owner {
                        Player::White => 'w',
                        Player::Black => 'b',
                    };
                    fen.push(if piece.is_king() {
                        ch.to_ascii_uppercase()
                    } else {
                        ch
                    });
                } else {
                    empty_count += 1;
                }
            }
            if empty_count > 0 {
                fen.push_str(&empty_count.to_string());
            }
            if row > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match turn {
            Player::White => 'w',
            Player::Black => 'b',
        });
        fen
    }

    /// Parses the output of [`Board::to_fen_string`]. Returns `None` for
    /// malformed input or pieces on light squares.
    #[must_use]
    pub fn from_fen_string(fen: &str) -> Option<(Self, Player)> {
        let mut parts = fen.split_whitespace();
        let placement = parts.next()?;
        let turn = match parts.next()? {
            "w" => Player::White,
            "b" => Player::Black,
            _ => return None,
        };

        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != BOARD_SIZE {
            return None;
        }

        let mut board = Self::empty();
        for (i, text) in rows.iter().enumerate() {
            let row = BOARD_SIZE - 1 - i;
            let mut col = 0;
            for ch in text.chars() {
                if let Some(run) = ch.to_digit(10) {
                    col += run as usize;
                    continue;
                }
                let (owner, kind) = match ch {
                    'w' => (Player::White, PieceKind::Man),
                    'W' => (Player::White, PieceKind::King),
                    'b' => (Player::Black, PieceKind::Man),
                    'B' => (Player::Black, PieceKind::King),
                    _ => return None,
                };
                let pos = BoardCoordinate::new(row, col)?;
                if !board.place(
                    pos,
                    Piece {
                        owner,
                        kind,
                        position: pos,
                    },
                ) {
                    return None;
                }
                col += 1;
            }
            if col != BOARD_SIZE {
                return None;
            }
        }
        Some((board, turn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(row: usize, col: usize) -> BoardCoordinate {
        BoardCoordinate::new(row, col).unwrap()
    }

    #[test]
    fn test_initial_setup() {
        let board = Board::new();
        assert_eq!(board.count_pieces(Player::White), 8);
        assert_eq!(board.count_pieces(Player::Black), 8);
        assert_eq!(board.count_kings(Player::White), 0);

        let white = board.piece_at(sq(0, 1)).unwrap();
        assert_eq!(white.owner, Player::White);
        assert_eq!(white.kind, PieceKind::Man);
        assert_eq!(white.position, sq(0, 1));

        let black = board.piece_at(sq(7, 0)).unwrap();
        assert_eq!(black.owner, Player::Black);

        for piece in board.pieces() {
            assert!(piece.position.is_dark(), "{piece:?} on a light square");
        }
        assert!(board.piece_at(sq(3, 4)).is_none());
    }

    #[test]
    fn test_fen_generation() {
        let board = Board::new();
        assert_eq!(
            board.to_fen_string(Player::White),
            "b1b1b1b1/1b1b1b1b/8/8/8/8/w1w1w1w1/1w1w1w1w w"
        );
    }

    #[test]
    fn test_fen_round_trip() {
        let mut board = Board::new();
        board.promote(sq(1, 2));
        let fen = board.to_fen_string(Player::Black);
        let (parsed, turn) = Board::from_fen_string(&fen).unwrap();
        assert_eq!(turn, Player::Black);
        assert_eq!(parsed, board);
    }

    #[test]
    fn test_fen_rejects_light_square_and_bad_rows() {
        assert!(Board::from_fen_string("1w6/8/8/8/8/8/8/8 w").is_none());
        assert!(Board::from_fen_string("8/8/8 w").is_none());
        assert!(Board::from_fen_string("8/8/8/8/8/8/8/8 x").is_none());
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        assert!(BoardCoordinate::new(8, 0).is_none());
        assert!(BoardCoordinate::from_signed(-1, 3).is_none());
        assert!(sq(0, 0).offset(-1, 1).is_none());
        let board = Board::new();
        assert!(board.get(-1, 0).is_none());
        assert!(board.get(9, 9).is_none());
        assert!(board.get(0, 1).is_some());
    }

    #[test]
    fn test_place_rejects_light_and_occupied_squares() {
        let mut board = Board::empty();
        assert!(!board.place(sq(0, 0), Piece::man(Player::White, sq(0, 0))));
        assert!(board.place(sq(2, 3), Piece::man(Player::White, sq(0, 0))));
        // Stored position follows the square, not the argument.
        assert_eq!(board.piece_at(sq(2, 3)).unwrap().position, sq(2, 3));
        assert!(!board.place(sq(2, 3), Piece::man(Player::Black, sq(2, 3))));
        assert_eq!(board.count_pieces(Player::White), 1);
        assert_eq!(board.count_pieces(Player::Black), 0);
    }

    #[test]
    fn test_move_piece_updates_position() {
        let mut board = Board::new();
        assert!(board.move_piece(sq(1, 2), sq(2, 3)));
        assert!(board.piece_at(sq(1, 2)).is_none());
        assert_eq!(board.piece_at(sq(2, 3)).unwrap().position, sq(2, 3));

        // Occupied destination and empty source both fail.
        assert!(!board.move_piece(sq(0, 1), sq(1, 0)));
        assert!(!board.move_piece(sq(3, 4), sq(4, 5)));
    }

    #[test]
    fn test_promote_only_men() {
        let mut board = Board::empty();
        board.place(sq(7, 0), Piece::man(Player::White, sq(7, 0)));
        assert!(board.promote(sq(7, 0)));
        assert!(board.piece_at(sq(7, 0)).unwrap().is_king());
        assert_eq!(board.count_kings(Player::White), 1);
        assert_eq!(board.count_men(Player::White), 0);
        assert!(!board.promote(sq(7, 0)));
        assert!(!board.promote(sq(5, 0)));
    }

    #[test]
    fn test_incremental_hash_matches_full_hash() {
        let mut board = Board::new();
        board.move_piece(sq(1, 2), sq(2, 3));
        board.remove(sq(6, 5));
        board.promote(sq(0, 1));
        assert_eq!(board.zobrist_hash, board.calculate_initial_hash());

        // Moving back restores the original hash.
        board.move_piece(sq(2, 3), sq(1, 2));
        board.place(sq(6, 5), Piece::man(Player::Black, sq(6, 5)));
        let mut fresh = Board::new();
        fresh.promote(sq(0, 1));
        assert_eq!(board.zobrist_hash, fresh.zobrist_hash);
    }

    #[test]
    fn test_clone_is_independent() {
        let board = Board::new();
        let mut copy = board.clone();
        copy.remove(sq(0, 1));
        assert!(board.piece_at(sq(0, 1)).is_some());
        assert_eq!(copy.count_pieces(Player::White), 7);
    }

    #[test]
    fn test_matrix_encoding() {
        let mut board = Board::new();
        board.promote(sq(7, 0));
        let white_view = board.to_matrix(Player::White);
        assert_eq!(white_view[0][1], 1);
        assert_eq!(white_view[7][0], -2);
        assert_eq!(white_view[7][2], -1);
        assert_eq!(white_view[3][4], 0);

        let black_view = board.to_matrix(Player::Black);
        assert_eq!(black_view[0][1], -1);
        assert_eq!(black_view[7][0], 2);
    }

    #[test]
    fn test_pieces_of() {
        let board = Board::new();
        let white = board.pieces_of(Player::White);
        assert_eq!(white.len(), 8);
        assert!(white.iter().all(|p| p.owner == Player::White));
        assert_eq!(white.first().unwrap().position, sq(0, 1));
    }

    #[test]
    fn test_coordinate_helpers() {
        assert_eq!(sq(3, 3).center_distance_x2(), 2);
        assert_eq!(sq(0, 7).center_distance_x2(), 14);
        assert_eq!(sq(1, 2).distance(sq(4, 0)), 5);
        assert!(sq(0, 3).is_edge());
        assert!(!sq(3, 4).is_edge());
        assert_eq!(sq(4, 1).to_string(), "b5");
        assert_eq!(Player::White.promotion_row(), 7);
        assert_eq!(Player::Black.home_row(), 7);
    }
}
