use crate::scoring::types::*;

/// Mean signed offset beyond which the player is considered early or late.
const TENDENCY_THRESHOLD_MS: f64 = 100.0;

pub fn timing_tendency(log: &[AccuracyRecord]) -> TimingTendency {
    let offsets: Vec<i64> = log
        .iter()
        .filter(|r| r.is_correct)
        .map(|r| r.timing_offset_ms)
        .collect();
    if offsets.is_empty() {
        return TimingTendency::OnTime;
    }
    let mean = offsets.iter().sum::<i64>() as f64 / offsets.len() as f64;
    if mean > TENDENCY_THRESHOLD_MS {
        TimingTendency::Late
    } else if mean < -TENDENCY_THRESHOLD_MS {
        TimingTendency::Early
    } else {
        TimingTendency::OnTime
    }
}

pub fn summarize(
    log: &[AccuracyRecord],
    accuracy_percentage: u32,
    average_timing_offset_ms: i64,
) -> SessionSummary {
    let total = log.len() as u32;
    let correct = log.iter().filter(|r| r.is_correct).count() as u32;
    let wrong = total - correct;
    let tendency = timing_tendency(log);

    let mut feedback: Vec<String> = Vec::new();

    if total == 0 {
        feedback.push("Play along with the score to get feedback!".to_string());
    } else {
        let pct = accuracy_percentage;
        if pct >= 90 {
            feedback.push(format!("Excellent! You nailed {}% of the notes.", pct));
        } else if pct >= 70 {
            feedback.push(format!("Good job! You got {}% of the notes right.", pct));
        } else if pct >= 50 {
            feedback.push(format!(
                "Keep practicing! You hit {}% of the notes correctly.",
                pct
            ));
        } else {
            feedback.push(format!(
                "This one's tough! You got {}% correct. Try slowing down the tempo.",
                pct
            ));
        }

        if wrong > 0 {
            feedback.push(format!(
                "{} note{} didn't match the score.",
                wrong,
                if wrong == 1 { "" } else { "s" }
            ));
        }

        match tendency {
            TimingTendency::Late => feedback.push(
                "You tend to come in late. Try anticipating the beat.".to_string(),
            ),
            TimingTendency::Early => feedback.push(
                "You tend to rush ahead. Try listening to the beat and holding back slightly."
                    .to_string(),
            ),
            TimingTendency::OnTime => {}
        }
    }

    SessionSummary {
        total,
        correct,
        wrong,
        accuracy_percentage,
        average_timing_offset_ms,
        timing_tendency: tendency,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(offset: i64, is_correct: bool) -> AccuracyRecord {
        AccuracyRecord {
            note_id: if is_correct {
                "m1-n0".to_string()
            } else {
                "wrong-0-1".to_string()
            },
            expected_pitch: if is_correct { 60 } else { UNMATCHED_PITCH },
            actual_pitch: 60,
            timing_offset_ms: offset,
            is_correct,
        }
    }

    #[test]
    fn test_empty_log() {
        let summary = summarize(&[], 0, 0);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.timing_tendency, TimingTendency::OnTime);
        assert_eq!(summary.feedback.len(), 1);
    }

    #[test]
    fn test_tendency_ignores_wrong_notes() {
        let log = vec![record(250, true), record(150, true), record(0, false), record(0, false)];
        assert_eq!(timing_tendency(&log), TimingTendency::Late);

        let log = vec![record(-300, true), record(-50, true)];
        assert_eq!(timing_tendency(&log), TimingTendency::Early);

        let log = vec![record(80, true), record(-60, true)];
        assert_eq!(timing_tendency(&log), TimingTendency::OnTime);
    }

    #[test]
    fn test_summary_counts_and_feedback() {
        let log = vec![record(0, true), record(10, true), record(0, false)];
        let summary = summarize(&log, 67, 3);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.wrong, 1);
        assert_eq!(summary.accuracy_percentage, 67);
        assert_eq!(summary.average_timing_offset_ms, 3);
        assert!(summary.feedback[0].starts_with("Keep practicing!"));
        assert_eq!(summary.feedback[1], "1 note didn't match the score.");
    }

    #[test]
    fn test_excellent_feedback() {
        let log = vec![record(0, true)];
        let summary = summarize(&log, 100, 0);
        assert_eq!(summary.feedback, vec!["Excellent! You nailed 100% of the notes.".to_string()]);
    }
}
