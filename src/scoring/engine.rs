use std::collections::BTreeMap;

use crate::scoring::types::*;
use crate::timeline::types::Note;

/// Matches live presses against expected notes and keeps the session's
/// accuracy log. Aggregates are derived from the log on every call.
#[derive(Debug, Clone, Default)]
pub struct AccuracyEngine {
    config: MatchConfig,
    held: BTreeMap<u8, HeldNote>,
    log: Vec<AccuracyRecord>,
    wrong_seq: u64,
}

impl AccuracyEngine {
    pub fn new(config: MatchConfig) -> Self {
        AccuracyEngine {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> MatchConfig {
        self.config
    }

    /// Feed one input event. `transport_time` is the latest observed transport
    /// position in seconds; it is only consulted for presses. Returns the record
    /// appended to the log, if any (releases never log).
    /// `timing_offset_ms` is measured on the transport clock, not `event.timestamp`.
    pub fn handle_event<'a, I>(
        &mut self,
        event: &PerformanceEvent,
        transport_time: f64,
        expected: I,
    ) -> Option<&AccuracyRecord>
    where
        I: IntoIterator<Item = &'a Note>,
    {
        if !event.is_press() {
            self.held.remove(&event.pitch);
            return None;
        }

        self.held.insert(
            event.pitch,
            HeldNote {
                pitch: event.pitch,
                velocity: event.velocity,
                pressed_at: event.timestamp,
            },
        );

        let pitch = event.pitch as i32;
        let tolerance = self.config.tolerance_secs;
        // First candidate in document order wins, even if a later one is closer in time.
        let matched = expected
            .into_iter()
            .find(|n| n.pitch == pitch && (n.start - transport_time).abs() < tolerance);

        let record = match matched {
            Some(note) => AccuracyRecord {
                note_id: note.id.clone(),
                expected_pitch: note.pitch,
                actual_pitch: pitch,
                timing_offset_ms: ((transport_time - note.start) * 1000.0).round() as i64,
                is_correct: true,
            },
            None => {
                self.wrong_seq += 1;
                AccuracyRecord {
                    note_id: format!(
                        "wrong-{}-{}",
                        (event.timestamp * 1000.0).round() as i64,
                        self.wrong_seq
                    ),
                    expected_pitch: UNMATCHED_PITCH,
                    actual_pitch: pitch,
                    timing_offset_ms: 0,
                    is_correct: false,
                }
            }
        };
        self.log.push(record);
        self.log.last()
    }

    pub fn log(&self) -> &[AccuracyRecord] {
        &self.log
    }

    pub fn held_notes(&self) -> Vec<HeldNote> {
        self.held.values().copied().collect()
    }

    pub fn is_held(&self, pitch: u8) -> bool {
        self.held.contains_key(&pitch)
    }

    pub fn correct_count(&self) -> u32 {
        self.log.iter().filter(|r| r.is_correct).count() as u32
    }

    /// 0 for an empty log.
    pub fn accuracy_percentage(&self) -> u32 {
        if self.log.is_empty() {
            return 0;
        }
        (100.0 * self.correct_count() as f64 / self.log.len() as f64).round() as u32
    }

    /// Mean absolute offset over every entry. Wrong notes count as 0 ms and
    /// pull the average down.
    pub fn average_timing_offset_ms(&self) -> i64 {
        if self.log.is_empty() {
            return 0;
        }
        let sum: i64 = self.log.iter().map(|r| r.timing_offset_ms.abs()).sum();
        (sum as f64 / self.log.len() as f64).round() as i64
    }

    /// Clears the log. Notes currently held stay held.
    pub fn reset_stats(&mut self) {
        self.log.clear();
    }

    /// Forget held notes, e.g. after the input device disconnects.
    pub fn release_all(&mut self) {
        self.held.clear();
    }
}
