use crate::engine::{CaptureChain, Move};
use crate::logic::board::{Board, BoardCoordinate, Piece, PieceKind, Player};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MoveError {
    #[error("the game has already ended")]
    GameAlreadyEnded,
    #[error("the source square does not hold a piece of the side to move")]
    NotMoversPiece,
    #[error("the piece cannot reach that destination")]
    IllegalDestination,
    #[error("a capture is available and must be played")]
    CaptureMandatory,
}

const DIAGONALS: [(isize, isize); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const WHITE_FORWARD: [(isize, isize); 2] = [(1, 1), (1, -1)];
const BLACK_FORWARD: [(isize, isize); 2] = [(-1, 1), (-1, -1)];

fn directions(piece: &Piece) -> &'static [(isize, isize)] {
    match (piece.kind, piece.owner) {
        (PieceKind::King, _) => &DIAGONALS,
        (PieceKind::Man, Player::White) => &WHITE_FORWARD,
        (PieceKind::Man, Player::Black) => &BLACK_FORWARD,
    }
}

const fn promotes(piece: &Piece, to: BoardCoordinate) -> bool {
    matches!(piece.kind, PieceKind::Man) && to.row() == piece.owner.promotion_row()
}

const fn bit(sq: BoardCoordinate) -> u64 {
    1u64 << sq.index()
}

/// Non-capturing moves of the piece on `pos`. Men step one square forward,
/// Kings slide any distance until blocked.
fn steps_from(board: &Board, piece: &Piece) -> Vec<Move> {
    let from = piece.position;
    let mut moves = Vec::new();
    for &(dr, dc) in directions(piece) {
        let mut to = from.offset(dr, dc);
        while let Some(sq) = to {
            if !board.is_empty_at(sq) {
                break;
            }
            moves.push(Move::step(from, sq, promotes(piece, sq)));
            if !piece.is_king() {
                break;
            }
            to = sq.offset(dr, dc);
        }
    }
    moves
}

struct ChainFrame {
    at: BoardCoordinate,
    captured: u64,
    chain: CaptureChain,
}

/// Every single jump available to `piece` standing on `at`, as
/// `(captured square, landing square)`.
///
/// The origin square counts as empty: the jumping piece has left it.
/// Pieces already taken in this chain stay on the board until the move
/// completes, so they block rays but cannot be taken twice.
fn jumps(
    board: &Board,
    piece: &Piece,
    origin: BoardCoordinate,
    at: BoardCoordinate,
    captured: u64,
) -> Vec<(BoardCoordinate, BoardCoordinate)> {
    let is_free = |sq: BoardCoordinate| sq == origin || board.is_empty_at(sq);
    let is_target = |sq: BoardCoordinate| {
        captured & bit(sq) == 0
            && board
                .piece_at(sq)
                .is_some_and(|p| p.owner != piece.owner)
    };

    let mut found = Vec::new();
    for &(dr, dc) in directions(piece) {
        if piece.is_king() {
            // Slide over empty squares; the first occupied square decides.
            let mut cursor = at.offset(dr, dc);
            while let Some(sq) = cursor {
                if is_free(sq) {
                    cursor = sq.offset(dr, dc);
                    continue;
                }
                if is_target(sq) {
                    if let Some(land) = sq.offset(dr, dc).filter(|&l| is_free(l)) {
                        found.push((sq, land));
                    }
                }
                break;
            }
        } else if let (Some(over), Some(land)) = (at.offset(dr, dc), at.offset(2 * dr, 2 * dc)) {
            if is_target(over) && is_free(land) {
                found.push((over, land));
            }
        }
    }
    found
}

/// All maximal capture chains for the piece on `pos`.
#[must_use]
pub fn captures_from(board: &Board, pos: BoardCoordinate) -> Vec<Move> {
    let Some(piece) = board.piece_at(pos) else {
        return Vec::new();
    };

    let mut moves = Vec::new();
    let mut stack = vec![ChainFrame {
        at: pos,
        captured: 0,
        chain: CaptureChain::new(),
    }];

    while let Some(frame) = stack.pop() {
        let next = if frame.chain.len() < crate::engine::MAX_CHAIN {
            jumps(board, &piece, pos, frame.at, frame.captured)
        } else {
            Vec::new()
        };

        if next.is_empty() {
            if !frame.chain.is_empty() {
                moves.push(Move::capture(
                    pos,
                    frame.at,
                    frame.chain,
                    promotes(&piece, frame.at),
                ));
            }
            continue;
        }

        for (over, land) in next {
            let mut chain = frame.chain;
            chain.push(over);
            stack.push(ChainFrame {
                at: land,
                captured: frame.captured | bit(over),
                chain,
            });
        }
    }

    moves
}

/// Moves of the piece on `pos`: its captures if it has any, otherwise its
/// steps. Side-wide mandatory capture is applied by [`all_legal_moves`].
#[must_use]
pub fn moves_from(board: &Board, pos: BoardCoordinate) -> Vec<Move> {
    let Some(piece) = board.piece_at(pos) else {
        return Vec::new();
    };
    let captures = captures_from(board, pos);
    if captures.is_empty() {
        steps_from(board, &piece)
    } else {
        captures
    }
}

/// Legal moves for `player`. If any piece can capture, only captures are
/// returned.
#[must_use]
pub fn all_legal_moves(board: &Board, player: Player) -> Vec<Move> {
    let mut captures = Vec::new();
    for piece in board.pieces().filter(|p| p.owner == player) {
        captures.extend(captures_from(board, piece.position));
    }
    if !captures.is_empty() {
        return captures;
    }

    board
        .pieces()
        .filter(|p| p.owner == player)
        .flat_map(|piece| steps_from(board, &piece))
        .collect()
}

#[must_use]
pub fn has_capture(board: &Board, player: Player) -> bool {
    board
        .pieces()
        .filter(|p| p.owner == player)
        .any(|piece| !jumps(board, &piece, piece.position, piece.position, 0).is_empty())
}

#[must_use]
pub fn is_legal(board: &Board, from: BoardCoordinate, to: BoardCoordinate, player: Player) -> bool {
    find_move(board, from, to, player).is_ok()
}

fn check_owner(board: &Board, from: BoardCoordinate, player: Player) -> Result<(), MoveError> {
    match board.piece_at(from) {
        Some(piece) if piece.owner == player => Ok(()),
        _ => Err(MoveError::NotMoversPiece),
    }
}

/// Resolves `mv` against the legal moves of `player` and returns the
/// canonical legal move (with the correct promotion flag).
pub fn validate_move(board: &Board, mv: &Move, player: Player) -> Result<Move, MoveError> {
    check_owner(board, mv.from, player)?;
    let legal = all_legal_moves(board, player);
    if let Some(found) = legal.iter().find(|m| m.same_path(mv)) {
        return Ok(*found);
    }
    if !mv.is_capture() && legal.iter().any(Move::is_capture) {
        return Err(MoveError::CaptureMandatory);
    }
    Err(MoveError::IllegalDestination)
}

/// Resolves a `(from, to)` pair, as entered on a board UI, to a legal move.
/// Several chains can share both endpoints; the one taking the most pieces
/// wins.
pub fn find_move(
    board: &Board,
    from: BoardCoordinate,
    to: BoardCoordinate,
    player: Player,
) -> Result<Move, MoveError> {
    check_owner(board, from, player)?;
    if !to.is_dark() {
        return Err(MoveError::IllegalDestination);
    }

    let legal = all_legal_moves(board, player);
    let best = legal
        .iter()
        .filter(|m| m.from == from && m.to == to)
        .max_by_key(|m| m.capture_count());
    if let Some(mv) = best {
        return Ok(*mv);
    }

    let is_step_shape = board
        .piece_at(from)
        .is_some_and(|piece| steps_from(board, &piece).iter().any(|m| m.to == to));
    if is_step_shape && legal.iter().any(Move::is_capture) {
        return Err(MoveError::CaptureMandatory);
    }
    Err(MoveError::IllegalDestination)
}
