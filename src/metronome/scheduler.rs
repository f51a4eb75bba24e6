use serde::{Deserialize, Serialize};

use crate::error::PracticeError;
use crate::metronome::timer::{IntervalTimer, TimerHandle};
use crate::parser::musicxml::DEFAULT_TEMPO;
use crate::subscribers::{SubscriptionId, Subscribers};

pub const DEFAULT_BEATS_PER_MEASURE: u32 = 4;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MetronomeConfig {
    pub bpm: f64,
    pub beats_per_measure: u32,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        MetronomeConfig {
            bpm: DEFAULT_TEMPO,
            beats_per_measure: DEFAULT_BEATS_PER_MEASURE,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClickType {
    /// Downbeat
    Accent,
    Regular,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    /// 1-based position in the measure.
    pub beat: u32,
    pub click: ClickType,
    /// Clock reading the tick was delivered at.
    pub at_ms: f64,
}

/// Audio collaborator that makes the click audible.
pub trait ClickSink {
    fn click(&mut self, tick: &Tick) -> Result<(), PracticeError>;
}

/// Sink for a silent metronome that only drives subscribers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentClick;

impl ClickSink for SilentClick {
    fn click(&mut self, _tick: &Tick) -> Result<(), PracticeError> {
        Ok(())
    }
}

fn validate(bpm: f64, beats_per_measure: u32) -> Result<(), PracticeError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(PracticeError::InvalidTempo(bpm));
    }
    if beats_per_measure == 0 {
        return Err(PracticeError::InvalidMeter(beats_per_measure));
    }
    Ok(())
}

pub fn interval_ms_for(bpm: f64) -> f64 {
    60_000.0 / bpm
}

/// Fixed-rate beat generator. Stopped until [`start`](Self::start); ticks are
/// delivered from [`advance_to`](Self::advance_to) with the caller's clock.
pub struct MetronomeScheduler<C: ClickSink> {
    bpm: f64,
    beats_per_measure: u32,
    beat: u32,
    timer: IntervalTimer,
    handle: Option<TimerHandle>,
    sink: C,
    ticks: Subscribers<Tick>,
    failed_clicks: u32,
}

impl<C: ClickSink> MetronomeScheduler<C> {
    pub fn new(config: MetronomeConfig, sink: C) -> Result<Self, PracticeError> {
        validate(config.bpm, config.beats_per_measure)?;
        Ok(MetronomeScheduler {
            bpm: config.bpm,
            beats_per_measure: config.beats_per_measure,
            beat: 0,
            timer: IntervalTimer::new(),
            handle: None,
            sink,
            ticks: Subscribers::new(),
            failed_clicks: 0,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }

    /// Last beat delivered, 0 before the first tick after a start.
    pub fn beat(&self) -> u32 {
        self.beat
    }

    pub fn interval_ms(&self) -> f64 {
        interval_ms_for(self.bpm)
    }

    pub fn next_tick_ms(&self) -> Option<f64> {
        self.timer.next_due_ms()
    }

    pub fn failed_clicks(&self) -> u32 {
        self.failed_clicks
    }

    pub fn sink(&self) -> &C {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut C {
        &mut self.sink
    }

    pub fn subscribe_ticks<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Tick) + 'static,
    {
        self.ticks.subscribe(callback)
    }

    pub fn unsubscribe_ticks(&mut self, id: SubscriptionId) -> bool {
        self.ticks.unsubscribe(id)
    }

    /// No-op while running. Otherwise resets the beat counter and arms the timer.
    pub fn start(&mut self, now_ms: f64) {
        if self.is_running() {
            return;
        }
        self.beat = 0;
        self.handle = Some(self.timer.arm(self.interval_ms(), now_ms));
    }

    /// No-op while stopped. Keeps the beat counter.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.timer.cancel(handle);
        }
    }

    /// Changing tempo while running delivers anything already due at `now_ms`
    /// at the old rate, then re-arms at the new interval from `now_ms`.
    pub fn set_tempo(&mut self, bpm: f64, now_ms: f64) -> Result<(), PracticeError> {
        validate(bpm, self.beats_per_measure)?;
        if let Some(handle) = self.handle {
            self.advance_to(now_ms);
            self.timer.cancel(handle);
            self.bpm = bpm;
            self.handle = Some(self.timer.arm(self.interval_ms(), now_ms));
        } else {
            self.bpm = bpm;
        }
        Ok(())
    }

    pub fn set_beats_per_measure(&mut self, beats_per_measure: u32) -> Result<(), PracticeError> {
        validate(self.bpm, beats_per_measure)?;
        self.beats_per_measure = beats_per_measure;
        if self.beat > beats_per_measure {
            self.beat = 0;
        }
        Ok(())
    }

    /// Deliver every tick due by `now_ms`. Returns how many fired.
    pub fn advance_to(&mut self, now_ms: f64) -> u32 {
        if !self.is_running() {
            return 0;
        }
        let due = self.timer.poll(now_ms);
        for _ in 0..due {
            self.fire(now_ms);
        }
        due
    }

    fn fire(&mut self, now_ms: f64) {
        self.beat = (self.beat % self.beats_per_measure) + 1;
        let tick = Tick {
            beat: self.beat,
            click: if self.beat == 1 {
                ClickType::Accent
            } else {
                ClickType::Regular
            },
            at_ms: now_ms,
        };
        if let Err(e) = self.sink.click(&tick) {
            self.failed_clicks += 1;
            eprintln!("Warning: metronome click failed: {}", e);
        }
        self.ticks.emit(&tick);
    }
}

impl<C: ClickSink> Drop for MetronomeScheduler<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingSink {
        clicks: Vec<Tick>,
        fail: bool,
    }

    impl ClickSink for RecordingSink {
        fn click(&mut self, tick: &Tick) -> Result<(), PracticeError> {
            if self.fail {
                return Err(PracticeError::Device("output closed".to_string()));
            }
            self.clicks.push(*tick);
            Ok(())
        }
    }

    fn metronome(bpm: f64) -> MetronomeScheduler<RecordingSink> {
        MetronomeScheduler::new(
            MetronomeConfig {
                bpm,
                ..MetronomeConfig::default()
            },
            RecordingSink::default(),
        )
        .unwrap()
    }

    fn tick_times(m: &MetronomeScheduler<RecordingSink>) -> Vec<f64> {
        m.sink().clicks.iter().map(|t| t.at_ms).collect()
    }

    /// Drive the metronome with a coarse 10ms clock, like a UI frame loop.
    fn run_until(m: &mut MetronomeScheduler<RecordingSink>, from_ms: f64, to_ms: f64) {
        let mut t = from_ms;
        while t <= to_ms {
            m.advance_to(t);
            t += 10.0;
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            MetronomeScheduler::new(MetronomeConfig { bpm: 0.0, beats_per_measure: 4 }, SilentClick),
            Err(PracticeError::InvalidTempo(_))
        ));
        assert!(matches!(
            MetronomeScheduler::new(MetronomeConfig { bpm: 90.0, beats_per_measure: 0 }, SilentClick),
            Err(PracticeError::InvalidMeter(0))
        ));
        let mut m = metronome(90.0);
        assert!(m.set_tempo(f64::NAN, 0.0).is_err());
        assert_eq!(m.bpm(), 90.0);
    }

    #[test]
    fn test_120_bpm_ticks_every_500ms() {
        let mut m = metronome(120.0);
        assert_eq!(m.interval_ms(), 500.0);
        m.start(0.0);
        run_until(&mut m, 0.0, 2000.0);
        assert_eq!(tick_times(&m), vec![500.0, 1000.0, 1500.0, 2000.0]);
    }

    #[test]
    fn test_beats_wrap_per_measure() {
        let mut m = MetronomeScheduler::new(
            MetronomeConfig {
                bpm: 120.0,
                beats_per_measure: 3,
            },
            RecordingSink::default(),
        )
        .unwrap();
        m.start(0.0);
        run_until(&mut m, 0.0, 3000.0);
        let beats: Vec<u32> = m.sink().clicks.iter().map(|t| t.beat).collect();
        assert_eq!(beats, vec![1, 2, 3, 1, 2, 3]);
        assert_eq!(m.sink().clicks[0].click, ClickType::Accent);
        assert_eq!(m.sink().clicks[1].click, ClickType::Regular);
        assert_eq!(m.sink().clicks[3].click, ClickType::Accent);
    }

    #[test]
    fn test_tempo_change_reschedules_without_double_fire() {
        let mut m = metronome(120.0);
        m.start(0.0);
        run_until(&mut m, 0.0, 1200.0);
        assert_eq!(tick_times(&m), vec![500.0, 1000.0]);

        m.set_tempo(80.0, 1200.0).unwrap();
        assert_eq!(m.interval_ms(), 750.0);
        assert_eq!(m.next_tick_ms(), Some(1950.0));

        // The old 1500ms tick must not fire
        run_until(&mut m, 1210.0, 3500.0);
        assert_eq!(tick_times(&m), vec![500.0, 1000.0, 1950.0, 2700.0, 3450.0]);
        let beats: Vec<u32> = m.sink().clicks.iter().map(|t| t.beat).collect();
        assert_eq!(beats, vec![1, 2, 3, 4, 1]);
    }

    #[test]
    fn test_tempo_change_delivers_tick_already_due() {
        let mut m = metronome(120.0);
        m.start(0.0);
        // No advance between 0 and the change at 500ms, where a tick is due
        m.set_tempo(80.0, 500.0).unwrap();
        assert_eq!(tick_times(&m), vec![500.0]);
        m.advance_to(1249.0);
        assert_eq!(m.sink().clicks.len(), 1);
        m.advance_to(1250.0);
        assert_eq!(tick_times(&m), vec![500.0, 1250.0]);
    }

    #[test]
    fn test_set_tempo_while_stopped() {
        let mut m = metronome(120.0);
        m.set_tempo(60.0, 0.0).unwrap();
        assert!(!m.is_running());
        m.start(100.0);
        assert_eq!(m.next_tick_ms(), Some(1100.0));
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let mut m = metronome(120.0);
        m.stop();
        assert!(!m.is_running());

        m.start(0.0);
        run_until(&mut m, 0.0, 1000.0);
        // second start must not reset the phase or the beat
        m.start(700.0);
        assert_eq!(m.beat(), 2);
        assert_eq!(m.next_tick_ms(), Some(1500.0));

        m.stop();
        m.stop();
        assert!(!m.is_running());
        assert_eq!(m.beat(), 2);
        assert_eq!(m.advance_to(5000.0), 0);
        assert_eq!(m.next_tick_ms(), None);

        // restarting resets the counter
        m.start(5000.0);
        assert_eq!(m.beat(), 0);
        m.advance_to(5500.0);
        assert_eq!(m.beat(), 1);
    }

    #[test]
    fn test_repeated_start_stop_cycles() {
        let mut m = metronome(240.0);
        for cycle in 0..50 {
            let base = cycle as f64 * 1000.0;
            m.start(base);
            m.advance_to(base + 250.0);
            m.stop();
        }
        assert_eq!(m.sink().clicks.len(), 50);
        assert!(!m.is_running());
    }

    #[test]
    fn test_subscribers_get_beats_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut m = metronome(120.0);
        let first = Rc::clone(&seen);
        let id = m.subscribe_ticks(move |t| first.borrow_mut().push(("first", t.beat)));
        let second = Rc::clone(&seen);
        m.subscribe_ticks(move |t| second.borrow_mut().push(("second", t.beat)));

        m.start(0.0);
        m.advance_to(500.0);
        assert!(m.unsubscribe_ticks(id));
        m.advance_to(1000.0);

        assert_eq!(
            *seen.borrow(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
    }

    #[test]
    fn test_click_failure_is_not_fatal() {
        let mut m = metronome(120.0);
        m.sink_mut().fail = true;
        let beats = Rc::new(RefCell::new(Vec::new()));
        let b = Rc::clone(&beats);
        m.subscribe_ticks(move |t| b.borrow_mut().push(t.beat));

        m.start(0.0);
        m.advance_to(1000.0);
        assert!(m.is_running());
        assert_eq!(m.failed_clicks(), 2);
        assert_eq!(*beats.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_shrinking_meter_resets_beat() {
        let mut m = metronome(120.0);
        m.start(0.0);
        m.advance_to(2000.0);
        assert_eq!(m.beat(), 4);
        m.set_beats_per_measure(3).unwrap();
        m.advance_to(2500.0);
        assert_eq!(m.beat(), 1);
        assert!(m.set_beats_per_measure(0).is_err());
    }
}
