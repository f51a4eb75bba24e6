use serde::{Deserialize, Serialize};

use crate::error::PracticeError;
use crate::parser::musicxml::{parse_music_data, ParseOptions};
use crate::scoring::engine::AccuracyEngine;
use crate::scoring::report;
use crate::scoring::types::{AccuracyRecord, HeldNote, MatchConfig, PerformanceEvent, SessionSummary};
use crate::subscribers::{SubscriptionId, Subscribers};
use crate::timeline::query;
use crate::timeline::types::{Hand, Measure, MusicData, Note};

/// How often a playback collaborator should report transport time while playing.
pub const TRANSPORT_POLL_INTERVAL_MS: u32 = 100;
const MAX_WARNINGS: usize = 50;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputCapability {
    pub available: bool,
    pub message: Option<String>,
}

impl InputCapability {
    pub fn available() -> Self {
        InputCapability {
            available: true,
            message: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        InputCapability {
            available: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket(u64);

impl From<u64> for LoadTicket {
    fn from(raw: u64) -> Self {
        LoadTicket(raw)
    }
}

impl From<LoadTicket> for u64 {
    fn from(ticket: LoadTicket) -> Self {
        ticket.0
    }
}

/// Everything one practice session needs: the loaded score, the matcher, the
/// latest transport reading and the input capability.
pub struct PracticeSession {
    options: ParseOptions,
    music: Option<MusicData>,
    load_state: LoadState,
    pending_load: Option<LoadTicket>,
    next_ticket: u64,
    hand: Hand,
    engine: AccuracyEngine,
    transport_time: f64,
    input: InputCapability,
    warnings: Vec<String>,
    score_loaded: Subscribers<MusicData>,
    records: Subscribers<AccuracyRecord>,
}

impl Default for PracticeSession {
    fn default() -> Self {
        Self::new(ParseOptions::default(), MatchConfig::default())
    }
}

impl PracticeSession {
    pub fn new(options: ParseOptions, match_config: MatchConfig) -> Self {
        PracticeSession {
            options,
            music: None,
            load_state: LoadState::Idle,
            pending_load: None,
            next_ticket: 0,
            hand: Hand::Both,
            engine: AccuracyEngine::new(match_config),
            transport_time: 0.0,
            input: InputCapability::available(),
            warnings: Vec::new(),
            score_loaded: Subscribers::new(),
            records: Subscribers::new(),
        }
    }

    // Score loading

    /// Marks a load as in flight. Any earlier pending load is superseded and
    /// its result will be ignored.
    pub fn begin_load(&mut self) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending_load = Some(ticket);
        self.load_state = LoadState::Loading;
        ticket
    }

    /// Parse the fetched document for `ticket`. Returns `Ok(false)` when the
    /// ticket was cancelled or superseded and the document was ignored.
    pub fn complete_load(&mut self, ticket: LoadTicket, xml: &str) -> Result<bool, PracticeError> {
        if self.pending_load != Some(ticket) {
            return Ok(false);
        }
        self.pending_load = None;

        match parse_music_data(xml, &self.options) {
            Ok(data) => {
                self.engine.reset_stats();
                self.load_state = LoadState::Ready;
                self.score_loaded.emit(&data);
                self.music = Some(data);
                Ok(true)
            }
            Err(e) => {
                self.music = None;
                self.load_state = LoadState::Failed {
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// The source could not be fetched. Ignored for stale tickets.
    pub fn fail_load(&mut self, ticket: LoadTicket, message: &str) -> Option<PracticeError> {
        if self.pending_load != Some(ticket) {
            return None;
        }
        self.pending_load = None;
        let err = PracticeError::Parse(message.to_string());
        self.music = None;
        self.load_state = LoadState::Failed {
            message: err.to_string(),
        };
        Some(err)
    }

    /// Safe to call with nothing in flight.
    pub fn cancel_load(&mut self) {
        if self.pending_load.take().is_some() {
            self.load_state = if self.music.is_some() {
                LoadState::Ready
            } else {
                LoadState::Idle
            };
        }
    }

    pub fn load_score(&mut self, xml: &str) -> Result<(), PracticeError> {
        let ticket = self.begin_load();
        self.complete_load(ticket, xml).map(|_| ())
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn music_data(&self) -> Option<&MusicData> {
        self.music.as_ref()
    }

    /// Reassign hands for individual notes of the loaded score, by note id.
    /// Unknown ids are ignored. Returns false when no score is loaded.
    pub fn override_hands<'a, I>(&mut self, overrides: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, Hand)>,
    {
        match self.music.as_ref() {
            Some(data) => {
                self.music = Some(data.with_hand_overrides(overrides));
                true
            }
            None => false,
        }
    }

    // Transport

    /// Latest reading from the playback collaborator. Non-finite values are dropped.
    pub fn observe_transport_time(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.transport_time = seconds;
        }
    }

    pub fn transport_time(&self) -> f64 {
        self.transport_time
    }

    pub fn active_notes(&self) -> Vec<&Note> {
        match &self.music {
            Some(data) => query::active_notes_at_time(data, self.transport_time),
            None => Vec::new(),
        }
    }

    pub fn current_measure(&self) -> Option<Measure> {
        self.music
            .as_ref()
            .map(|data| query::current_measure_at_time(data, self.transport_time))
    }

    // Live input

    pub fn set_hand(&mut self, hand: Hand) {
        self.hand = hand;
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn expected_notes(&self) -> Vec<&Note> {
        match &self.music {
            Some(data) => query::notes_by_hand(data, self.hand),
            None => Vec::new(),
        }
    }

    pub fn set_input_capability(&mut self, capability: InputCapability) {
        if !capability.available {
            let message = capability
                .message
                .clone()
                .unwrap_or_else(|| "no performance input".to_string());
            self.warn(&PracticeError::InputUnavailable(message).to_string());
            self.engine.release_all();
        }
        self.input = capability;
    }

    pub fn input_capability(&self) -> &InputCapability {
        &self.input
    }

    /// Match one performance event against the loaded score at the most
    /// recently observed transport time.
    pub fn handle_event(&mut self, event: &PerformanceEvent) -> Result<Option<AccuracyRecord>, PracticeError> {
        if !self.input.available {
            return Err(PracticeError::InputUnavailable(
                self.input.message.clone().unwrap_or_default(),
            ));
        }
        if !event.is_press() {
            return Ok(self.engine.handle_event(event, self.transport_time, std::iter::empty::<&Note>()).cloned());
        }

        let Some(data) = self.music.as_ref() else {
            return Err(PracticeError::NoScoreLoaded);
        };
        let expected = query::notes_by_hand(data, self.hand);
        let record = self
            .engine
            .handle_event(event, self.transport_time, expected)
            .cloned();
        if let Some(r) = &record {
            self.records.emit(r);
        }
        Ok(record)
    }

    pub fn held_notes(&self) -> Vec<HeldNote> {
        self.engine.held_notes()
    }

    // Statistics

    pub fn accuracy_log(&self) -> &[AccuracyRecord] {
        self.engine.log()
    }

    pub fn accuracy_percentage(&self) -> u32 {
        self.engine.accuracy_percentage()
    }

    pub fn average_timing_offset_ms(&self) -> i64 {
        self.engine.average_timing_offset_ms()
    }

    pub fn summary(&self) -> SessionSummary {
        report::summarize(
            self.engine.log(),
            self.engine.accuracy_percentage(),
            self.engine.average_timing_offset_ms(),
        )
    }

    pub fn reset_stats(&mut self) {
        self.engine.reset_stats();
    }

    // Collaborator failures

    /// Playback and audio failures are recorded and otherwise ignored.
    pub fn report_device_error(&mut self, message: &str) {
        self.warn(&PracticeError::Device(message.to_string()).to_string());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn warn(&mut self, message: &str) {
        eprintln!("Warning: {}", message);
        if self.warnings.len() == MAX_WARNINGS {
            self.warnings.remove(0);
        }
        self.warnings.push(message.to_string());
    }

    // Subscriptions

    pub fn subscribe_score_loaded<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&MusicData) + 'static,
    {
        self.score_loaded.subscribe(callback)
    }

    pub fn unsubscribe_score_loaded(&mut self, id: SubscriptionId) -> bool {
        self.score_loaded.unsubscribe(id)
    }

    pub fn subscribe_records<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&AccuracyRecord) + 'static,
    {
        self.records.subscribe(callback)
    }

    pub fn unsubscribe_records(&mut self, id: SubscriptionId) -> bool {
        self.records.unsubscribe(id)
    }

    /// Cancel any in-flight load, drop held notes and subscribers. Idempotent.
    pub fn teardown(&mut self) {
        self.cancel_load();
        self.engine.release_all();
        self.score_loaded.clear();
        self.records.clear();
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
