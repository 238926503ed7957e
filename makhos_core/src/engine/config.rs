use crate::logic::eval_constants::{
    ADVANCEMENT, ATTACK_THREAT, BACK_ROW_BONUS, CENTER_CONTROL, CORNER_PENALTY, EDGE_PENALTY,
    ENDGAME_BONUS, KING_CENTRALIZATION, MOBILITY, PIECE_UNDER_ATTACK, TEMPO, VAL_KING, VAL_MAN,
    WIN_SCORE,
};
use crate::logic::board::PieceKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Evaluation Parameters
    pub val_man: i32,
    pub val_king: i32,
    pub center_control: i32,
    pub mobility: i32,
    pub back_row_bonus: i32,
    pub attack_threat: i32,
    pub piece_under_attack: i32,
    pub advancement: i32,
    pub edge_penalty: i32,
    pub corner_penalty: i32,
    pub king_centralization: i32,
    pub endgame_bonus: i32,
    pub tempo: i32,
    pub win_score: i32,

    // Search Parameters
    pub max_depth: u8,
    pub max_quiescence_depth: u8,
    pub max_extensions: u8,
    pub delta_margin: i32,
    pub score_hash_move: i32,
    pub score_capture_base: i32,
    pub score_killer_move: i32,
    pub tt_size_mb: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            val_man: VAL_MAN,
            val_king: VAL_KING,
            center_control: CENTER_CONTROL,
            mobility: MOBILITY,
            back_row_bonus: BACK_ROW_BONUS,
            attack_threat: ATTACK_THREAT,
            piece_under_attack: PIECE_UNDER_ATTACK,
            advancement: ADVANCEMENT,
            edge_penalty: EDGE_PENALTY,
            corner_penalty: CORNER_PENALTY,
            king_centralization: KING_CENTRALIZATION,
            endgame_bonus: ENDGAME_BONUS,
            tempo: TEMPO,
            win_score: WIN_SCORE,

            max_depth: 6,
            max_quiescence_depth: 4,
            max_extensions: 4,
            delta_margin: 100,
            score_hash_move: 2_000_000,
            score_capture_base: 1_000_000,
            score_killer_move: 500_000,
            tt_size_mb: 16,
        }
    }
}

/// Tuning file format: evaluation weights are multipliers of the defaults,
/// search limits are absolute.
#[derive(Deserialize)]
struct EngineConfigJson {
    val_man: Option<f32>,
    val_king: Option<f32>,
    center_control: Option<f32>,
    mobility: Option<f32>,
    back_row_bonus: Option<f32>,
    attack_threat: Option<f32>,
    piece_under_attack: Option<f32>,
    advancement: Option<f32>,
    edge_penalty: Option<f32>,
    corner_penalty: Option<f32>,
    king_centralization: Option<f32>,
    endgame_bonus: Option<f32>,
    tempo: Option<f32>,

    max_depth: Option<u8>,
    max_quiescence_depth: Option<u8>,
    max_extensions: Option<u8>,
    delta_margin: Option<i32>,
    tt_size_mb: Option<usize>,
}

impl EngineConfig {
    #[must_use]
    pub const fn piece_value(&self, kind: PieceKind) -> i32 {
        match kind {
            PieceKind::Man => self.val_man,
            PieceKind::King => self.val_king,
        }
    }

    pub fn load_from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        let json_config: EngineConfigJson = serde_json::from_str(json_str)?;
        let default = Self::default();

        Ok(Self {
            val_man: apply_scale(default.val_man, json_config.val_man),
            val_king: apply_scale(default.val_king, json_config.val_king),
            center_control: apply_scale(default.center_control, json_config.center_control),
            mobility: apply_scale(default.mobility, json_config.mobility),
            back_row_bonus: apply_scale(default.back_row_bonus, json_config.back_row_bonus),
            attack_threat: apply_scale(default.attack_threat, json_config.attack_threat),
            piece_under_attack: apply_scale(
                default.piece_under_attack,
                json_config.piece_under_attack,
            ),
            advancement: apply_scale(default.advancement, json_config.advancement),
            edge_penalty: apply_scale(default.edge_penalty, json_config.edge_penalty),
            corner_penalty: apply_scale(default.corner_penalty, json_config.corner_penalty),
            king_centralization: apply_scale(
                default.king_centralization,
                json_config.king_centralization,
            ),
            endgame_bonus: apply_scale(default.endgame_bonus, json_config.endgame_bonus),
            tempo: apply_scale(default.tempo, json_config.tempo),

            max_depth: json_config.max_depth.unwrap_or(default.max_depth),
            max_quiescence_depth: json_config
                .max_quiescence_depth
                .unwrap_or(default.max_quiescence_depth),
            max_extensions: json_config.max_extensions.unwrap_or(default.max_extensions),
            delta_margin: json_config.delta_margin.unwrap_or(default.delta_margin),
            tt_size_mb: json_config.tt_size_mb.unwrap_or(default.tt_size_mb),
            ..default
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn apply_scale(default_val: i32, scale: Option<f32>) -> i32 {
    scale.map_or(default_val, |s| (default_val as f32 * s) as i32)
}

/// Parameters for [`crate::engine::mcts::MctsEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// UCB1 exploration constant `C`.
    pub exploration_constant: f64,
    pub iterations: u32,
    pub time_limit_ms: Option<u64>,
    /// Plies after which a playout stops and the evaluator scores it.
    pub rollout_move_cap: u32,
    /// Plies at the start of a playout that use the guided policy.
    pub guided_rollout_plies: u32,
    pub rollout_sample_size: usize,
    /// Divisor in the logistic squash of evaluator scores.
    pub eval_scale: f64,
    pub seed: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration_constant: std::f64::consts::SQRT_2,
            iterations: 1000,
            time_limit_ms: None,
            rollout_move_cap: 60,
            guided_rollout_plies: 8,
            rollout_sample_size: 5,
            eval_scale: 400.0,
            seed: None,
        }
    }
}
