//! Reasoning ticker — paced presentation of streamed reasoning text
//!
//! Reasoning tokens tend to arrive in bursts. The ticker buffers them as
//! words and walks a cursor across the buffer at a human-legible pace,
//! exposing a window of words around the cursor. Arrival rate and
//! presentation rate are independent: `feed` only appends, and the cursor
//! advances on scheduled ticks.

pub mod scheduler;

pub use scheduler::{ManualScheduler, Tick, TickScheduler, TimerHandle, TokioScheduler};

use crate::error::{ChatError, Result};
use crate::types::WindowWord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Pacing parameters for the reasoning ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerConfig {
    /// Words shown on each side of the cursor
    #[serde(default = "default_half_width")]
    pub half_width: usize,

    /// Base delay per word in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Surcharge per character beyond `char_threshold`, in milliseconds
    #[serde(default = "default_per_char_ms")]
    pub per_char_ms: u64,

    /// Word length that incurs no surcharge
    #[serde(default = "default_char_threshold")]
    pub char_threshold: usize,

    /// Extra pause after a word ending in `.`, `!` or `?`, in milliseconds
    #[serde(default = "default_sentence_pause_ms")]
    pub sentence_pause_ms: u64,

    /// Global multiplier (lower = faster)
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Floor delay in milliseconds
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
}

fn default_half_width() -> usize {
    4
}

fn default_base_delay_ms() -> u64 {
    160
}

fn default_per_char_ms() -> u64 {
    12
}

fn default_char_threshold() -> usize {
    4
}

fn default_sentence_pause_ms() -> u64 {
    50
}

fn default_speed() -> f64 {
    0.6
}

fn default_min_delay_ms() -> u64 {
    55
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            half_width: default_half_width(),
            base_delay_ms: default_base_delay_ms(),
            per_char_ms: default_per_char_ms(),
            char_threshold: default_char_threshold(),
            sentence_pause_ms: default_sentence_pause_ms(),
            speed: default_speed(),
            min_delay_ms: default_min_delay_ms(),
        }
    }
}

impl TickerConfig {
    /// Display time for a word before the cursor moves on
    pub fn word_delay(&self, word: &str) -> Duration {
        let len = word.chars().count();
        let surcharge = self.per_char_ms * len.saturating_sub(self.char_threshold) as u64;
        let pause = if word.ends_with(['.', '!', '?']) {
            self.sentence_pause_ms
        } else {
            0
        };
        let raw = (self.base_delay_ms + surcharge + pause) as f64 * self.speed;
        let millis = (raw.round().max(0.0) as u64).max(self.min_delay_ms);
        Duration::from_millis(millis)
    }

    /// Full window size (`2 × half_width + 1`)
    pub fn window_size(&self) -> usize {
        self.half_width * 2 + 1
    }
}

/// Timer-driven word cursor over buffered reasoning text
pub struct ReasoningTicker {
    config: TickerConfig,
    scheduler: Arc<dyn TickScheduler>,

    /// Identifies this instance in scheduled ticks
    epoch: u64,

    words: Vec<String>,

    /// `None` until the first advance
    cursor: Option<usize>,

    next_seq: u64,
    timer: Option<TimerHandle>,
    window: Vec<WindowWord>,
}

impl ReasoningTicker {
    /// Create an idle ticker
    pub fn new(config: TickerConfig, scheduler: Arc<dyn TickScheduler>, epoch: u64) -> Self {
        Self {
            config,
            scheduler,
            epoch,
            words: Vec::new(),
            cursor: None,
            next_seq: 0,
            timer: None,
            window: Vec::new(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &TickerConfig {
        &self.config
    }

    /// Buffered words, in arrival order
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Index of the word under the cursor (`None` before the first advance)
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The most recently emitted window
    pub fn window(&self) -> &[WindowWord] {
        &self.window
    }

    /// Whether an advance is scheduled
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Waiting for more words after showing everything buffered
    pub fn is_parked(&self) -> bool {
        self.timer.is_none() && self.cursor.is_some()
    }

    /// Append whitespace-separated words
    ///
    /// Starts advancing immediately when no advance is scheduled. Returns
    /// whether the window changed.
    pub fn feed(&mut self, text: &str) -> Result<bool> {
        let before = self.words.len();
        self.words.extend(text.split_whitespace().map(str::to_string));
        if self.words.len() == before || self.timer.is_some() {
            return Ok(false);
        }
        self.advance()
    }

    /// Handle a delivered tick
    ///
    /// Ticks that are not the one this ticker is waiting for (stale
    /// epoch, superseded schedule, or after `stop`) are ignored. Returns
    /// whether the window changed.
    pub fn on_tick(&mut self, tick: Tick) -> Result<bool> {
        match &self.timer {
            Some(handle) if handle.tick() == tick => {}
            _ => {
                tracing::trace!(epoch = tick.epoch, seq = tick.seq, "Ignoring stale tick");
                return Ok(false);
            }
        }
        self.timer = None;
        self.advance()
    }

    /// Cancel any pending advance and discard all buffered words
    pub fn stop(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.cancel();
        }
        self.words.clear();
        self.cursor = None;
        self.window.clear();
    }

    fn advance(&mut self) -> Result<bool> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.words.len() {
            // Parked until the next feed
            return Ok(false);
        }

        let delay = {
            let word = self.words.get(next).ok_or_else(|| {
                ChatError::Ticker(format!(
                    "cursor {} outside buffer of {} words",
                    next,
                    self.words.len()
                ))
            })?;
            self.config.word_delay(word)
        };

        self.cursor = Some(next);
        self.window = self.compute_window(next);

        let tick = Tick {
            epoch: self.epoch,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.timer = Some(self.scheduler.schedule(delay, tick));
        Ok(true)
    }

    /// Words in the inclusive range `[cursor - H, cursor + H]`, clamped to the buffer
    fn compute_window(&self, cursor: usize) -> Vec<WindowWord> {
        let start = cursor.saturating_sub(self.config.half_width);
        let end = (cursor + self.config.half_width + 1).min(self.words.len());
        (start..end)
            .map(|idx| WindowWord {
                text: self.words[idx].clone(),
                idx,
                distance: idx.abs_diff(cursor),
            })
            .collect()
    }
}

impl std::fmt::Debug for ReasoningTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningTicker")
            .field("epoch", &self.epoch)
            .field("words", &self.words.len())
            .field("cursor", &self.cursor)
            .field("running", &self.timer.is_some())
            .finish()
    }
}
