use crate::config::*;
use crate::store::{ConfigMap, Store};
use log::warn;

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum ClickKind {
    Left,
    Right,
    Middle,
    Scroll,
}

impl ClickKind {
    /// Setting that enables this kind of input.
    pub fn setting(&self) -> &'static str {
        match self {
            ClickKind::Left => OPT_LEFT_CLICK,
            ClickKind::Right => OPT_RIGHT_CLICK,
            ClickKind::Middle => OPT_MIDDLE_CLICK,
            ClickKind::Scroll => OPT_SCROLL,
        }
    }
}

/// In-session game state. Score and settings are cached here and written
/// through to the store on every change; the cache is never re-read.
pub struct Clicker {
    store: Store,
    score: u64,
    config: ConfigMap,
    save_failed: bool,
}

impl Clicker {
    pub fn load(store: Store) -> Self {
        let score = store.load_score();
        let config = store.load_config();
        Self {
            store,
            score,
            config,
            save_failed: false,
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn is_allowed(&self, kind: ClickKind) -> bool {
        self.config.get(kind.setting())
    }

    /// Scores one point if `kind` is enabled. Returns whether it counted.
    pub fn register(&mut self, kind: ClickKind) -> bool {
        if !self.is_allowed(kind) {
            return false;
        }
        self.score = self.score.saturating_add(1);
        let result = self.store.save_score(self.score);
        self.note_save(result.is_ok());
        true
    }

    pub fn toggle_option(&mut self, key: &str) {
        self.config.toggle(key);
        let result = self.store.save_config(&self.config);
        self.note_save(result.is_ok());
    }

    /// Set when the last write failed; the in-memory values stay authoritative.
    pub fn save_failed(&self) -> bool {
        self.save_failed
    }

    fn note_save(&mut self, ok: bool) {
        if !ok && !self.save_failed {
            warn!("Progress is no longer being saved to disk.");
        }
        self.save_failed = !ok;
    }
}
