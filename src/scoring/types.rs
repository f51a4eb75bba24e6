use serde::{Deserialize, Serialize};

/// Sentinel `expected_pitch` for presses that matched nothing.
pub const UNMATCHED_PITCH: i32 = -1;
pub const DEFAULT_TOLERANCE_SECS: f64 = 1.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEvent {
    pub pitch: u8,
    /// 0 means release.
    pub velocity: u8,
    /// Seconds on the input device's clock.
    pub timestamp: f64,
}

impl PerformanceEvent {
    pub fn note_on(pitch: u8, velocity: u8, timestamp: f64) -> Self {
        PerformanceEvent {
            pitch,
            velocity,
            timestamp,
        }
    }

    pub fn note_off(pitch: u8, timestamp: f64) -> Self {
        PerformanceEvent {
            pitch,
            velocity: 0,
            timestamp,
        }
    }

    pub fn is_press(&self) -> bool {
        self.velocity > 0
    }

    /// Decode a raw MIDI channel message. Note-on with velocity 0 and explicit
    /// note-off both become releases; any other status is ignored.
    pub fn from_midi_bytes(bytes: &[u8], timestamp: f64) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }
        let pitch = bytes[1] & 0x7F;
        match bytes[0] & 0xF0 {
            0x90 => Some(PerformanceEvent::note_on(pitch, bytes[2] & 0x7F, timestamp)),
            0x80 => Some(PerformanceEvent::note_off(pitch, timestamp)),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeldNote {
    pub pitch: u8,
    pub velocity: u8,
    pub pressed_at: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyRecord {
    pub note_id: String,
    pub expected_pitch: i32,
    pub actual_pitch: i32,
    pub timing_offset_ms: i64,
    pub is_correct: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchConfig {
    /// Half-width of the window around an expected note's start, exclusive.
    pub tolerance_secs: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimingTendency {
    Early,
    OnTime,
    Late,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    pub accuracy_percentage: u32,
    pub average_timing_offset_ms: i64,
    pub timing_tendency: TimingTendency,
    pub feedback: Vec<String>,
}
