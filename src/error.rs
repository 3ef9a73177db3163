//! Error taxonomy for the coordinator. See spec.md §7 for the semantic classes:
//! protocol errors, preconditions-violated no-ops, authoritative rejections,
//! strict invariant violations (these panic rather than appear here), and
//! transport failures.

use thiserror::Error;

use crate::roles::Role;

/// Errors returned while decoding or validating a peer message before it ever
/// reaches game logic. Logged and dropped by the Coordinator; never ACKed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A seat number outside `[0, N)`.
    #[error("seat {seat} is out of range for a {num_players}-player template")]
    SeatOutOfRange { seat: i32, num_players: usize },
    /// The legacy magician swap encoding violated `second >= 1` (i.e. `target >= 100`).
    #[error("magician swap target {target} violates the legacy encoding (must be >= 100)")]
    InvalidMagicianEncoding { target: i32 },
    /// A message referenced a role identifier not present in the Night Plan.
    #[error("role {0:?} has no night step in this template")]
    UnknownNightRole(Role),
}

/// Errors returned by the Night Flow Controller's event dispatch.
///
/// Per spec.md §4.1, callers MUST treat `InvalidTransition` as an idempotent
/// no-op during phase-duplicate dispatches: log it and otherwise ignore it.
/// It is not a bug by itself; only *mutating state anyway* after seeing it would be.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NightFlowError {
    #[error("event not valid in the current phase")]
    InvalidTransition,
    #[error("recordAction called for role that is not the current step's role")]
    WrongRole,
}

/// Rejection reasons produced by the Action Resolver (spec.md §4.2).
///
/// These are not Rust-level failures to propagate with `?` past the
/// Coordinator: they become `ACTION_REJECTED` private payloads with a
/// human-readable reason, per spec.md §4.4.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("目标不存在")]
    InvalidTarget,
    #[error("不能选择自己")]
    SelfTarget,
    #[error("恶灵骑士不能投自己")]
    SpiritKnightSelfVote,
    #[error("不能投{0}")]
    ForbiddenVoteTarget(String),
    #[error("你被梦魇封锁，本回合只能跳过")]
    NightmareBlocked,
    #[error("该步骤不允许跳过")]
    SkipNotAllowed,
    #[error("两个目标不能相同")]
    SwapSameSeat,
}

/// Errors surfaced by the Coordinator for conditions that are genuinely
/// exceptional rather than expected game-flow no-ops.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("no such seat: {0}")]
    NoSuchSeat(i32),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    NightFlow(#[from] NightFlowError),
}
