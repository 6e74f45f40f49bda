//! Draw configuration
//!
//! One active configuration at a time: the draw mode, the classic-mode
//! counts, the tournament round ladder, and the presentation toggles
//! persisted alongside them. Every edit clamps to a safe value instead
//! of erroring; round-count edits propagate downward so no round ever
//! exceeds its predecessor.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How winners are selected overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    /// Single-target draw, optionally split into batches
    Classic,
    /// Multi-round elimination; each round's winners feed the next
    Tournament,
}

/// How a classic-mode session is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassicMethod {
    /// Everything remaining in one action
    All,
    /// One winner per action
    OneByOne,
    /// `batch_size` winners per action
    Batch,
}

/// One elimination round: `count` participants survive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentRound {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub count: usize,
}

/// The persisted configuration document.
///
/// `sound_enabled`, `hide_names_while_rolling` and `particle_effects`
/// are carried for the shell; the engine never reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawConfig {
    pub sound_enabled: bool,
    pub auto_exclude: bool,
    pub hide_names_while_rolling: bool,
    pub particle_effects: bool,
    pub mode: DrawMode,
    pub classic_count: usize,
    pub classic_method: ClassicMethod,
    pub batch_size: usize,
    pub prize_name: String,
    pub tournament_rounds: Vec<TournamentRound>,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            auto_exclude: true,
            hide_names_while_rolling: false,
            particle_effects: true,
            mode: DrawMode::Classic,
            classic_count: 1,
            classic_method: ClassicMethod::OneByOne,
            batch_size: 1,
            prize_name: String::new(),
            tournament_rounds: default_rounds(),
        }
    }
}

fn default_rounds() -> Vec<TournamentRound> {
    vec![
        TournamentRound {
            id: 1,
            name: String::new(),
            count: 3,
        },
        TournamentRound {
            id: 2,
            name: String::new(),
            count: 1,
        },
    ]
}

impl DrawConfig {
    /// Set the classic winner target, clamped to `1..=candidates`.
    /// Shrinks `batch_size` to match when it would exceed the new target.
    pub fn set_classic_count(&mut self, count: usize, candidates: usize) {
        let mut count = count.max(1);
        if candidates > 0 {
            count = count.min(candidates);
        }
        self.classic_count = count;
        if self.batch_size > self.classic_count {
            self.batch_size = self.classic_count;
        }
    }

    /// Switch the reveal method. Entering batch mode re-derives the
    /// batch size to half the target, rounded up.
    pub fn set_classic_method(&mut self, method: ClassicMethod) {
        self.classic_method = method;
        if method == ClassicMethod::Batch {
            self.batch_size = self.classic_count.div_ceil(2).max(1);
        }
    }

    /// Set the per-batch size, clamped to `1..=classic_count`.
    pub fn set_batch_size(&mut self, size: usize) {
        self.batch_size = size.clamp(1, self.classic_count.max(1));
    }

    /// Number of stop actions a batch session needs from scratch.
    pub fn batch_count(&self) -> usize {
        self.classic_count.div_ceil(self.batch_size.max(1))
    }

    /// Append a new round surviving 1 participant.
    pub fn add_round(&mut self) -> u32 {
        let id = self.tournament_rounds.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        self.tournament_rounds.push(TournamentRound {
            id,
            name: String::new(),
            count: 1,
        });
        id
    }

    /// Remove a round by id; the last remaining round cannot be removed.
    pub fn remove_round(&mut self, id: u32) {
        if self.tournament_rounds.len() > 1 {
            self.tournament_rounds.retain(|r| r.id != id);
        }
    }

    pub fn set_round_name(&mut self, id: u32, name: &str) {
        if let Some(round) = self.tournament_rounds.iter_mut().find(|r| r.id == id) {
            name.clone_into(&mut round.name);
        }
    }

    /// Set a round's survivor count and propagate the ladder constraint:
    /// round 1 is clamped to the candidate count, every later round to
    /// its predecessor, transitively downward from the edited round.
    pub fn set_round_count(&mut self, id: u32, count: usize, candidates: usize) {
        let Some(index) = self.tournament_rounds.iter().position(|r| r.id == id) else {
            return;
        };

        let mut count = count.max(1);
        if index == 0 {
            if candidates > 0 {
                count = count.min(candidates);
            }
        } else {
            count = count.min(self.tournament_rounds[index - 1].count);
        }
        self.tournament_rounds[index].count = count;

        for i in index + 1..self.tournament_rounds.len() {
            if self.tournament_rounds[i].count > self.tournament_rounds[i - 1].count {
                self.tournament_rounds[i].count = self.tournament_rounds[i - 1].count;
            }
        }
        debug!(
            round = id,
            counts = ?self.tournament_rounds.iter().map(|r| r.count).collect::<Vec<_>>(),
            "round ladder updated"
        );
    }
}
