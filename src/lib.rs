use std::collections::HashMap;

use wasm_bindgen::prelude::*;

pub mod error;
pub mod metronome;
pub mod parser;
pub mod scoring;
pub mod session;
pub mod subscribers;
pub mod timeline;
pub mod transposition;

pub use error::PracticeError;
pub use metronome::scheduler::{ClickSink, ClickType, MetronomeConfig, MetronomeScheduler, Tick};
pub use parser::musicxml::{parse_music_data, ParseOptions};
pub use scoring::engine::AccuracyEngine;
pub use scoring::types::{AccuracyRecord, MatchConfig, PerformanceEvent, SessionSummary};
pub use session::{InputCapability, LoadState, LoadTicket, PracticeSession};
pub use timeline::types::{Hand, Measure, MusicData, Note};

fn to_js<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Missing (null/undefined) option objects mean "use the defaults".
fn options_from_js<T: serde::de::DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_null() || value.is_undefined() {
        Ok(T::default())
    } else {
        from_js(value)
    }
}

fn js_err(e: PracticeError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_hand(hand: &str) -> Result<Hand, JsValue> {
    Hand::parse(hand).ok_or_else(|| JsValue::from_str(&format!("Unknown hand: {}", hand)))
}

#[wasm_bindgen]
pub fn parse_musicxml(xml: &str, options_js: JsValue) -> Result<JsValue, JsValue> {
    let options: ParseOptions = options_from_js(options_js)?;
    let data = parse_music_data(xml, &options).map_err(js_err)?;
    to_js(&data)
}

#[wasm_bindgen]
pub fn active_notes_at_time(data_js: JsValue, t: f64) -> Result<JsValue, JsValue> {
    let data: MusicData = from_js(data_js)?;
    to_js(&timeline::query::active_notes_at_time(&data, t))
}

#[wasm_bindgen]
pub fn current_measure_at_time(data_js: JsValue, t: f64) -> Result<JsValue, JsValue> {
    let data: MusicData = from_js(data_js)?;
    to_js(&timeline::query::current_measure_at_time(&data, t))
}

#[wasm_bindgen]
pub fn notes_by_hand(data_js: JsValue, hand: &str) -> Result<JsValue, JsValue> {
    let data: MusicData = from_js(data_js)?;
    let hand = parse_hand(hand)?;
    to_js(&timeline::query::notes_by_hand(&data, hand))
}

#[wasm_bindgen]
pub fn transpose_music_data(data_js: JsValue, semitones: i32) -> Result<JsValue, JsValue> {
    let data: MusicData = from_js(data_js)?;
    to_js(&transposition::transposed(&data, semitones))
}

/// How often the page should call `observe_transport_time` while playing.
#[wasm_bindgen]
pub fn transport_poll_interval_ms() -> u32 {
    session::TRANSPORT_POLL_INTERVAL_MS
}

/// One practice session, owned by the page that created it.
#[wasm_bindgen]
pub struct PracticeSessionHandle {
    session: PracticeSession,
}

#[wasm_bindgen]
impl PracticeSessionHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(parse_options_js: JsValue, match_config_js: JsValue) -> Result<PracticeSessionHandle, JsValue> {
        let options: ParseOptions = options_from_js(parse_options_js)?;
        let config: MatchConfig = options_from_js(match_config_js)?;
        Ok(PracticeSessionHandle {
            session: PracticeSession::new(options, config),
        })
    }

    pub fn load_score(&mut self, xml: &str) -> Result<JsValue, JsValue> {
        self.session.load_score(xml).map_err(js_err)?;
        match self.session.music_data() {
            Some(data) => to_js(data),
            None => Err(js_err(PracticeError::NoScoreLoaded)),
        }
    }

    /// Start an async load; pass the returned ticket to `complete_load` or
    /// `fail_load` once the fetch settles.
    pub fn begin_load(&mut self) -> u64 {
        self.session.begin_load().into()
    }

    /// Returns false when the ticket was cancelled or superseded.
    pub fn complete_load(&mut self, ticket: u64, xml: &str) -> Result<bool, JsValue> {
        self.session
            .complete_load(LoadTicket::from(ticket), xml)
            .map_err(js_err)
    }

    pub fn fail_load(&mut self, ticket: u64, message: &str) -> bool {
        self.session
            .fail_load(LoadTicket::from(ticket), message)
            .is_some()
    }

    pub fn cancel_load(&mut self) {
        self.session.cancel_load();
    }

    pub fn music_data(&self) -> Result<JsValue, JsValue> {
        match self.session.music_data() {
            Some(data) => to_js(data),
            None => Ok(JsValue::NULL),
        }
    }

    /// `overrides` maps note ids to "left", "right" or "both".
    pub fn override_hands(&mut self, overrides_js: JsValue) -> Result<bool, JsValue> {
        let overrides: HashMap<String, Hand> = from_js(overrides_js)?;
        Ok(self
            .session
            .override_hands(overrides.iter().map(|(id, hand)| (id.as_str(), *hand))))
    }

    pub fn load_state(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.load_state())
    }

    pub fn observe_transport_time(&mut self, seconds: f64) {
        self.session.observe_transport_time(seconds);
    }

    pub fn set_hand(&mut self, hand: &str) -> Result<(), JsValue> {
        self.session.set_hand(parse_hand(hand)?);
        Ok(())
    }

    pub fn set_input_unavailable(&mut self, message: &str) {
        self.session
            .set_input_capability(InputCapability::unavailable(message));
    }

    pub fn set_input_available(&mut self) {
        self.session.set_input_capability(InputCapability::available());
    }

    /// Raw MIDI bytes from the selected input. Returns the new accuracy
    /// record, or null for releases and ignored messages.
    pub fn handle_midi(&mut self, bytes: &[u8], timestamp: f64) -> Result<JsValue, JsValue> {
        let Some(event) = PerformanceEvent::from_midi_bytes(bytes, timestamp) else {
            return Ok(JsValue::NULL);
        };
        match self.session.handle_event(&event).map_err(js_err)? {
            Some(record) => to_js(&record),
            None => Ok(JsValue::NULL),
        }
    }

    pub fn report_device_error(&mut self, message: &str) {
        self.session.report_device_error(message);
    }

    pub fn warnings(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.warnings())
    }

    pub fn active_notes(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.active_notes())
    }

    pub fn current_measure(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.current_measure())
    }

    pub fn accuracy_log(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.accuracy_log())
    }

    pub fn accuracy_percentage(&self) -> u32 {
        self.session.accuracy_percentage()
    }

    pub fn average_timing_offset_ms(&self) -> f64 {
        self.session.average_timing_offset_ms() as f64
    }

    pub fn summary(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.summary())
    }

    pub fn reset_stats(&mut self) {
        self.session.reset_stats();
    }

    pub fn teardown(&mut self) {
        self.session.teardown();
    }
}

/// Delivers clicks to a JS function, which owns the actual audio playback.
struct JsClickSink {
    callback: js_sys::Function,
}

impl ClickSink for JsClickSink {
    fn click(&mut self, tick: &Tick) -> Result<(), PracticeError> {
        let accent = JsValue::from_bool(tick.click == ClickType::Accent);
        self.callback
            .call2(&JsValue::NULL, &JsValue::from(tick.beat), &accent)
            .map(|_| ())
            .map_err(|e| PracticeError::Device(e.as_string().unwrap_or_else(|| "click callback threw".to_string())))
    }
}

#[wasm_bindgen]
pub struct MetronomeHandle {
    scheduler: MetronomeScheduler<JsClickSink>,
}

#[wasm_bindgen]
impl MetronomeHandle {
    /// `on_click(beat, isAccent)` is called once per tick.
    #[wasm_bindgen(constructor)]
    pub fn new(config_js: JsValue, on_click: js_sys::Function) -> Result<MetronomeHandle, JsValue> {
        let config: MetronomeConfig = options_from_js(config_js)?;
        let scheduler =
            MetronomeScheduler::new(config, JsClickSink { callback: on_click }).map_err(js_err)?;
        Ok(MetronomeHandle { scheduler })
    }

    pub fn start(&mut self, now_ms: f64) {
        self.scheduler.start(now_ms);
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn set_tempo(&mut self, bpm: f64, now_ms: f64) -> Result<(), JsValue> {
        self.scheduler.set_tempo(bpm, now_ms).map_err(js_err)
    }

    pub fn set_beats_per_measure(&mut self, beats: u32) -> Result<(), JsValue> {
        self.scheduler.set_beats_per_measure(beats).map_err(js_err)
    }

    /// Call from the page's frame loop with `performance.now()`.
    pub fn advance_to(&mut self, now_ms: f64) -> u32 {
        self.scheduler.advance_to(now_ms)
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn beat(&self) -> u32 {
        self.scheduler.beat()
    }

    pub fn bpm(&self) -> f64 {
        self.scheduler.bpm()
    }

    /// Clicks whose callback threw. The metronome keeps running regardless.
    pub fn failed_clicks(&self) -> u32 {
        self.scheduler.failed_clicks()
    }
}
