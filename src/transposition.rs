use crate::timeline::types::MusicData;

/// MIDI note range a transposed pitch is clamped to.
const MIDI_MIN: i32 = 0;
const MIDI_MAX: i32 = 127;

/// New score with every pitch shifted by `semitones`, clamped to the MIDI
/// range. Hands, ids and timing are kept so accuracy logs stay comparable.
///
/// Clamping is lossy: notes pushed past either end collapse onto 0 or 127 and
/// shifting back does not restore them.
pub fn transposed(data: &MusicData, semitones: i32) -> MusicData {
    let mut out = data.clone();
    for note in &mut out.notes {
        note.pitch = note.pitch.saturating_add(semitones).clamp(MIDI_MIN, MIDI_MAX);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::types::{Hand, Measure, Note};

    fn score(pitches: &[i32]) -> MusicData {
        MusicData {
            notes: pitches
                .iter()
                .enumerate()
                .map(|(i, &pitch)| Note {
                    id: format!("m1-n{}", i),
                    pitch,
                    start: i as f64,
                    end: i as f64 + 1.0,
                    duration: 1.0,
                    measure: 1,
                    hand: Hand::for_pitch(pitch),
                    finger: None,
                })
                .collect(),
            measures: vec![Measure {
                number: 1,
                start: 0.0,
                end: pitches.len() as f64,
            }],
            title: "Scale".to_string(),
            composer: "Unknown".to_string(),
            tempo: 60.0,
        }
    }

    #[test]
    fn test_transpose_is_a_new_value() {
        let original = score(&[60, 62, 64]);
        let up = transposed(&original, 2);
        let pitches: Vec<i32> = up.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![62, 64, 66]);
        assert_eq!(original.notes[0].pitch, 60);
        assert_eq!(up.notes[0].id, original.notes[0].id);
        assert_eq!(up.measures, original.measures);
    }

    #[test]
    fn test_hands_survive_transposition() {
        let original = score(&[59, 60]);
        let up = transposed(&original, 5);
        assert_eq!(up.notes[0].hand, Hand::Left);
        assert_eq!(up.notes[1].hand, Hand::Right);
    }

    #[test]
    fn test_clamped_to_midi_range() {
        let original = score(&[2, 125]);
        assert_eq!(transposed(&original, -5).notes[0].pitch, 0);
        assert_eq!(transposed(&original, 5).notes[1].pitch, 127);
    }

    #[test]
    fn test_roundtrip() {
        let original = score(&[48, 55, 60, 67, 72]);
        let back = transposed(&transposed(&original, 7), -7);
        assert_eq!(back, original);
    }

    #[test]
    fn test_roundtrip_through_range_edge_is_lossy() {
        let original = score(&[60, 125]);
        let back = transposed(&transposed(&original, 5), -5);
        assert_eq!(back.notes[0].pitch, 60);
        // 125 + 5 clamps to 127, so coming back lands on 122
        assert_eq!(back.notes[1].pitch, 122);
    }

    #[test]
    fn test_extreme_shift_saturates() {
        let original = score(&[60]);
        assert_eq!(transposed(&original, i32::MAX).notes[0].pitch, 127);
        assert_eq!(transposed(&original, i32::MIN).notes[0].pitch, 0);
    }
}
