use crate::timeline::types::{Hand, Measure, MusicData, Note};

pub fn active_notes_at_time(data: &MusicData, t: f64) -> Vec<&Note> {
    data.notes.iter().filter(|n| n.contains(t)).collect()
}

/// First measure containing `t`. Falls back to measure 1 when `t` lies
/// outside every measure or the score has none.
pub fn current_measure_at_time(data: &MusicData, t: f64) -> Measure {
    if let Some(m) = data.measures.iter().find(|m| m.contains(t)) {
        return *m;
    }
    data.measures
        .iter()
        .find(|m| m.number == 1)
        .copied()
        .unwrap_or(Measure {
            number: 1,
            start: 0.0,
            end: 0.0,
        })
}

pub fn notes_by_hand(data: &MusicData, hand: Hand) -> Vec<&Note> {
    match hand {
        Hand::Both => data.notes.iter().collect(),
        _ => data.notes.iter().filter(|n| n.hand == hand).collect(),
    }
}
