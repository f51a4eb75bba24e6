use serde::{Deserialize, Serialize};

/// MIDI pitch of middle C. Anything below it is assigned to the left hand.
pub const MIDDLE_C: i32 = 60;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
    Both,
}

impl Hand {
    pub fn for_pitch(pitch: i32) -> Hand {
        if pitch < MIDDLE_C {
            Hand::Left
        } else {
            Hand::Right
        }
    }

    pub fn parse(s: &str) -> Option<Hand> {
        match s {
            "left" => Some(Hand::Left),
            "right" => Some(Hand::Right),
            "both" => Some(Hand::Both),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub pitch: i32,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub measure: u32,
    pub hand: Hand,
    pub finger: Option<u8>,
}

impl Note {
    /// `start <= t <= end`. A note is still sounding at its own end instant.
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub number: u32,
    pub start: f64,
    pub end: f64,
}

impl Measure {
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MusicData {
    pub notes: Vec<Note>,
    pub measures: Vec<Measure>,
    pub title: String,
    pub composer: String,
    pub tempo: f64,
}

impl MusicData {
    /// End of the last measure, or 0 for an empty score.
    pub fn total_duration(&self) -> f64 {
        self.measures.last().map(|m| m.end).unwrap_or(0.0)
    }

    pub fn note_by_id(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Copy of this score with the hand of the listed notes replaced.
    /// Ids that don't exist are ignored.
    pub fn with_hand_overrides<'a, I>(&self, overrides: I) -> MusicData
    where
        I: IntoIterator<Item = (&'a str, Hand)>,
    {
        let mut data = self.clone();
        for (id, hand) in overrides {
            if let Some(note) = data.notes.iter_mut().find(|n| n.id == id) {
                note.hand = hand;
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, pitch: i32, start: f64, end: f64) -> Note {
        Note {
            id: id.to_string(),
            pitch,
            start,
            end,
            duration: end - start,
            measure: 1,
            hand: Hand::for_pitch(pitch),
            finger: None,
        }
    }

    #[test]
    fn test_hand_for_pitch() {
        assert_eq!(Hand::for_pitch(59), Hand::Left);
        assert_eq!(Hand::for_pitch(60), Hand::Right);
        assert_eq!(Hand::for_pitch(72), Hand::Right);
        assert_eq!(Hand::for_pitch(0), Hand::Left);
    }

    #[test]
    fn test_hand_parse() {
        assert_eq!(Hand::parse("left"), Some(Hand::Left));
        assert_eq!(Hand::parse("both"), Some(Hand::Both));
        assert_eq!(Hand::parse("feet"), None);
    }

    #[test]
    fn test_hand_overrides_leave_original_untouched() {
        let data = MusicData {
            notes: vec![note("a", 48, 0.0, 1.0), note("b", 64, 1.0, 2.0)],
            measures: vec![Measure { number: 1, start: 0.0, end: 2.0 }],
            title: "Untitled".to_string(),
            composer: "Unknown".to_string(),
            tempo: 60.0,
        };

        let overridden = data.with_hand_overrides([("a", Hand::Right), ("missing", Hand::Left)]);
        assert_eq!(overridden.note_by_id("a").unwrap().hand, Hand::Right);
        assert_eq!(data.note_by_id("a").unwrap().hand, Hand::Left);
        assert_eq!(overridden.notes.len(), 2);
        assert_eq!(data.total_duration(), 2.0);
    }

    #[test]
    fn test_contains_is_closed_interval() {
        let m = Measure { number: 3, start: 1.5, end: 3.0 };
        assert!(m.contains(1.5));
        assert!(m.contains(3.0));
        assert!(!m.contains(3.01));

        let n = note("m1-n0", 60, 0.0, 0.5);
        assert!(n.contains(0.0));
        assert!(n.contains(0.5));
        assert!(!n.contains(-0.01));
    }
}
