//! Draw engine
//!
//! The state machine at the center of the application. The engine owns
//! the roster, the active configuration, the session accumulators and
//! the history list; every mutation routes through it, and each
//! mutating operation ends with a commit into the injected store.
//!
//! Winner selection is synchronous: the rolling animation shown while
//! `Rolling` is purely cosmetic, and the authoritative sample happens
//! once, at `stop()` time, by repeatedly picking a uniformly random
//! index out of a shrinking copy of the eligible pool (a partial
//! Fisher-Yates shuffle, uniform without replacement).

use anyhow::Result;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{ClassicMethod, DrawConfig, DrawMode};
use crate::history::{HistoryRecord, RoundResult};
use crate::import::{self, ImportReport};
use crate::persistence::{self, PersistedState, StorePort};
use crate::roster::{Participant, Roster};

/// Observable state of the draw session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPhase {
    Idle,
    Rolling,
    /// Tournament only: the current round met its target and a later
    /// round exists
    RoundComplete,
    SessionComplete,
}

/// Transient per-session accumulators, cleared by `reset()`.
#[derive(Debug, Default)]
struct Session {
    is_drawing: bool,
    /// Most recently drawn batch, in draw order
    winners: Vec<Participant>,
    /// All classic winners of this session so far
    classic_winners: Vec<Participant>,
    current_round: usize,
    /// Confirmed winners per round, indexed by round
    round_winners: Vec<Vec<Participant>>,
    /// Identity of the last winner batch already celebrated
    celebrated: String,
}

pub struct DrawEngine {
    roster: Roster,
    config: DrawConfig,
    history: Vec<HistoryRecord>,
    session: Session,
    store: Option<Box<dyn StorePort>>,
}

impl DrawEngine {
    pub fn new() -> Self {
        Self {
            roster: Roster::new(),
            config: DrawConfig::default(),
            history: Vec::new(),
            session: Session::default(),
            store: None,
        }
    }

    /// Build an engine from already-loaded state, without a store.
    pub fn from_state(state: PersistedState) -> Self {
        Self {
            roster: Roster::from_entries(state.participants),
            config: state.config,
            history: state.history,
            session: Session::default(),
            store: None,
        }
    }

    /// Build an engine backed by a store, loading whatever it holds.
    /// A load failure starts fresh; it never prevents startup.
    pub fn with_store(store: Box<dyn StorePort>) -> Self {
        let mut engine = match store.load() {
            Ok(Some(state)) => {
                info!(
                    participants = state.participants.len(),
                    history = state.history.len(),
                    "restored persisted state"
                );
                Self::from_state(state)
            }
            Ok(None) => {
                info!("no persisted state found, starting fresh");
                Self::new()
            }
            Err(e) => {
                warn!(error = %e, "failed to load persisted state, starting fresh");
                Self::new()
            }
        };
        engine.store = Some(store);
        engine
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    /// Completed sessions, most recent first.
    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    pub fn is_drawing(&self) -> bool {
        self.session.is_drawing
    }

    /// The most recently drawn batch, in draw order.
    pub fn winners(&self) -> &[Participant] {
        &self.session.winners
    }

    /// All classic winners accumulated this session.
    pub fn classic_winners(&self) -> &[Participant] {
        &self.session.classic_winners
    }

    pub fn current_round(&self) -> usize {
        self.session.current_round
    }

    /// Confirmed winners per round, indexed by round.
    pub fn round_winners(&self) -> &[Vec<Participant>] {
        &self.session.round_winners
    }

    // ------------------------------------------------------------------
    // Roster operations
    // ------------------------------------------------------------------

    pub fn add_participant(&mut self, name: &str, weight: u32) -> Option<i64> {
        let id = self.roster.add(name, weight);
        if id.is_some() {
            self.commit();
        }
        id
    }

    pub fn remove_participant(&mut self, id: i64) {
        self.roster.remove(id);
        self.commit();
    }

    pub fn toggle_excluded(&mut self, id: i64) {
        self.roster.toggle_excluded(id);
        self.commit();
    }

    pub fn restore_all(&mut self) {
        self.roster.restore_all();
        self.commit();
    }

    pub fn clear_participants(&mut self) {
        self.roster.clear();
        self.commit();
    }

    /// Parse and append a bulk import document. An unparseable document
    /// is an error and leaves the roster untouched.
    pub fn import_participants(&mut self, input: &str) -> Result<ImportReport> {
        let batch = import::parse(input)?;
        let report = self.roster.bulk_import(batch);
        self.commit();
        Ok(report)
    }

    pub fn export_roster(&self) -> Result<(String, String)> {
        persistence::export_roster(self.roster.entries())
    }

    pub fn export_history(&self) -> Result<(String, String)> {
        persistence::export_history(&self.history)
    }

    // ------------------------------------------------------------------
    // Configuration operations
    // ------------------------------------------------------------------

    /// Switch the draw mode. Ignored while rolling.
    pub fn set_mode(&mut self, mode: DrawMode) {
        if self.session.is_drawing {
            return;
        }
        self.config.mode = mode;
        self.commit();
    }

    pub fn set_auto_exclude(&mut self, enabled: bool) {
        self.config.auto_exclude = enabled;
        self.commit();
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.config.sound_enabled = enabled;
        self.commit();
    }

    pub fn set_hide_names_while_rolling(&mut self, enabled: bool) {
        self.config.hide_names_while_rolling = enabled;
        self.commit();
    }

    pub fn set_particle_effects(&mut self, enabled: bool) {
        self.config.particle_effects = enabled;
        self.commit();
    }

    pub fn set_prize_name(&mut self, name: &str) {
        name.clone_into(&mut self.config.prize_name);
        self.commit();
    }

    pub fn set_classic_count(&mut self, count: usize) {
        let candidates = self.roster.active_count();
        self.config.set_classic_count(count, candidates);
        self.commit();
    }

    pub fn set_classic_method(&mut self, method: ClassicMethod) {
        self.config.set_classic_method(method);
        self.commit();
    }

    pub fn set_batch_size(&mut self, size: usize) {
        self.config.set_batch_size(size);
        self.commit();
    }

    pub fn add_round(&mut self) -> u32 {
        let id = self.config.add_round();
        self.commit();
        id
    }

    pub fn remove_round(&mut self, id: u32) {
        self.config.remove_round(id);
        self.commit();
    }

    pub fn set_round_count(&mut self, id: u32, count: usize) {
        let candidates = self.roster.active_count();
        self.config.set_round_count(id, count, candidates);
        self.commit();
    }

    pub fn set_round_name(&mut self, id: u32, name: &str) {
        self.config.set_round_name(id, name);
        self.commit();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.commit();
    }

    // ------------------------------------------------------------------
    // Draw state machine
    // ------------------------------------------------------------------

    pub fn phase(&self) -> DrawPhase {
        if self.session.is_drawing {
            return DrawPhase::Rolling;
        }
        match self.config.mode {
            DrawMode::Classic => {
                if self.session.classic_winners.len() >= self.config.classic_count {
                    DrawPhase::SessionComplete
                } else {
                    DrawPhase::Idle
                }
            }
            DrawMode::Tournament => {
                let round = self.session.current_round;
                if self.round_target(round) > 0 && self.round_have(round) >= self.round_target(round)
                {
                    if round + 1 == self.config.tournament_rounds.len() {
                        DrawPhase::SessionComplete
                    } else {
                        DrawPhase::RoundComplete
                    }
                } else {
                    DrawPhase::Idle
                }
            }
        }
    }

    /// Candidates valid for the next sampling action, recomputed fresh.
    pub fn eligible_pool(&self) -> Vec<Participant> {
        match self.config.mode {
            DrawMode::Classic => self
                .roster
                .entries()
                .iter()
                .filter(|p| !p.excluded && !contains_id(&self.session.classic_winners, p.id))
                .cloned()
                .collect(),
            DrawMode::Tournament => {
                let round = self.session.current_round;
                let already = self
                    .session
                    .round_winners
                    .get(round)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                if round == 0 {
                    self.roster
                        .entries()
                        .iter()
                        .filter(|p| !p.excluded && !contains_id(already, p.id))
                        .cloned()
                        .collect()
                } else {
                    // Survivors of the previous round, minus this round's
                    // winners. The live roster flag decides exclusion, so
                    // a survivor excluded mid-tournament drops out here.
                    let survivors = self
                        .session
                        .round_winners
                        .get(round - 1)
                        .map(Vec::as_slice)
                        .unwrap_or(&[]);
                    survivors
                        .iter()
                        .filter_map(|p| self.roster.get(p.id))
                        .filter(|p| !p.excluded && !contains_id(already, p.id))
                        .cloned()
                        .collect()
                }
            }
        }
    }

    /// Enter the rolling state. No eligibility guard: stopping over an
    /// empty pool simply yields zero winners.
    pub fn start(&mut self) {
        if self.session.is_drawing {
            return;
        }
        self.session.is_drawing = true;
        debug!(mode = ?self.config.mode, "rolling started");
    }

    /// Leave the rolling state and perform the authoritative sample.
    /// Returns the drawn batch (possibly empty). A stop without a prior
    /// start, or with nothing left to draw, is a no-op.
    pub fn stop(&mut self) -> Vec<Participant> {
        if !self.session.is_drawing {
            return Vec::new();
        }
        self.session.is_drawing = false;

        let mut pool = self.eligible_pool();
        let count = self.draw_count().min(pool.len());
        if count == 0 {
            debug!("stopped with nothing to draw");
            self.session.winners.clear();
            self.session.celebrated.clear();
            return Vec::new();
        }

        let batch = sample(&mut pool, count);
        info!(count = batch.len(), mode = ?self.config.mode, "drew winners");

        match self.config.mode {
            DrawMode::Classic => {
                self.session.classic_winners.extend(batch.iter().cloned());
                if self.config.auto_exclude {
                    let ids: Vec<i64> = batch.iter().map(|p| p.id).collect();
                    self.roster.exclude_all(&ids);
                }
                if self.session.classic_winners.len() >= self.config.classic_count {
                    self.push_classic_record();
                }
            }
            DrawMode::Tournament => {
                let round = self.session.current_round;
                while self.session.round_winners.len() <= round {
                    self.session.round_winners.push(Vec::new());
                }
                self.session.round_winners[round].extend(batch.iter().cloned());
                let last = round + 1 == self.config.tournament_rounds.len();
                if last && self.round_have(round) >= self.round_target(round) {
                    self.push_tournament_record();
                }
            }
        }

        self.session.winners = batch.clone();
        self.commit();
        batch
    }

    /// Advance to the next tournament round. Only valid when the
    /// current round met its target and a later round exists; otherwise
    /// a no-op. Keeps the per-round history, clears the display batch.
    pub fn next_round(&mut self) {
        if self.config.mode != DrawMode::Tournament || self.phase() != DrawPhase::RoundComplete {
            return;
        }
        self.session.current_round += 1;
        self.session.winners.clear();
        self.session.celebrated.clear();
        info!(round = self.session.current_round, "advanced to next round");
    }

    /// Clear all session accumulators. Roster and configuration are
    /// untouched.
    pub fn reset(&mut self) {
        self.session = Session::default();
        info!("session reset");
    }

    /// Idempotence guard for celebratory side effects: true exactly
    /// once per distinct non-empty winner batch, false on re-query.
    pub fn take_celebration(&mut self) -> bool {
        if self.session.winners.is_empty() {
            return false;
        }
        let key = self
            .session
            .winners
            .iter()
            .map(|p| p.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        if key == self.session.celebrated {
            return false;
        }
        self.session.celebrated = key;
        true
    }

    /// A random eligible name for the cosmetic rolling display. `None`
    /// as soon as the engine is no longer rolling.
    pub fn rolling_candidate(&self) -> Option<String> {
        if !self.session.is_drawing {
            return None;
        }
        let pool = self.eligible_pool();
        if pool.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..pool.len());
        Some(pool[index].name.clone())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Batch size for one stop action, before capping to the pool size.
    fn draw_count(&self) -> usize {
        match self.config.mode {
            DrawMode::Tournament => {
                let round = self.session.current_round;
                if self.round_have(round) >= self.round_target(round) {
                    0
                } else {
                    1
                }
            }
            DrawMode::Classic => {
                let remaining = self
                    .config
                    .classic_count
                    .saturating_sub(self.session.classic_winners.len());
                match self.config.classic_method {
                    ClassicMethod::OneByOne => remaining.min(1),
                    ClassicMethod::Batch => remaining.min(self.config.batch_size),
                    ClassicMethod::All => remaining,
                }
            }
        }
    }

    fn round_target(&self, round: usize) -> usize {
        self.config
            .tournament_rounds
            .get(round)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    fn round_have(&self, round: usize) -> usize {
        self.session
            .round_winners
            .get(round)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn push_classic_record(&mut self) {
        let record = HistoryRecord::new(
            DrawMode::Classic,
            self.config.prize_name.clone(),
            self.session.classic_winners.clone(),
            self.roster.active_count(),
            None,
            Some(self.roster.snapshot()),
        );
        info!(winners = record.winners.len(), "classic session complete");
        self.history.insert(0, record);
    }

    fn push_tournament_record(&mut self) {
        let rounds: Vec<RoundResult> = self
            .config
            .tournament_rounds
            .iter()
            .enumerate()
            .map(|(i, round)| RoundResult {
                name: round.name.clone(),
                winners: self.session.round_winners.get(i).cloned().unwrap_or_default(),
            })
            .collect();
        let winners = self
            .session
            .round_winners
            .get(self.session.current_round)
            .cloned()
            .unwrap_or_default();
        let record = HistoryRecord::new(
            DrawMode::Tournament,
            self.config.prize_name.clone(),
            winners,
            self.roster.active_count(),
            Some(rounds),
            Some(self.roster.snapshot()),
        );
        info!(rounds = self.config.tournament_rounds.len(), "tournament complete");
        self.history.insert(0, record);
    }

    /// Persist after a state change. Errors are logged, never raised:
    /// in-memory state stays authoritative until the next save lands.
    fn commit(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        let state = PersistedState {
            participants: self.roster.snapshot(),
            config: self.config.clone(),
            history: self.history.clone(),
        };
        if let Err(e) = store.save(&state) {
            warn!(error = %e, "failed to persist state; continuing unpersisted");
        }
    }
}

impl Default for DrawEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_id(list: &[Participant], id: i64) -> bool {
    list.iter().any(|p| p.id == id)
}

/// Draw `count` distinct entries uniformly from `pool`, removing each
/// pick so later picks are over the remainder.
fn sample(pool: &mut Vec<Participant>, count: usize) -> Vec<Participant> {
    let mut rng = rand::rng();
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count && !pool.is_empty() {
        let index = rng.random_range(0..pool.len());
        picked.push(pool.swap_remove(index));
    }
    picked
}
