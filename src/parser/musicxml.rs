use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::PracticeError;
use crate::timeline::types::{Hand, Measure, MusicData, Note};

pub const DEFAULT_TEMPO: f64 = 74.0;
pub const DEFAULT_DIVISIONS: f64 = 4.0;
pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_COMPOSER: &str = "Unknown";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    /// Used when the score declares no tempo, or a malformed one.
    pub fallback_tempo: f64,
    /// Divisions per quarter note for measures that don't declare their own.
    pub default_divisions: f64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            fallback_tempo: DEFAULT_TEMPO,
            default_divisions: DEFAULT_DIVISIONS,
        }
    }
}

pub fn midi_from_pitch(step: char, alter: i32, octave: i32) -> Option<i32> {
    let base = match step.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    octave.checked_mul(12)?.checked_add(base)?.checked_add(alter)
}

fn valid_tempo(t: f64) -> Option<f64> {
    if t.is_finite() && t > 0.0 {
        Some(t)
    } else {
        None
    }
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| std::str::from_utf8(&a.value).ok().map(|s| s.trim().to_string()))
}

#[derive(Default)]
struct RawNote {
    is_rest: bool,
    step: Option<char>,
    alter: i32,
    octave: Option<i32>,
    duration_divs: Option<f64>,
    finger: Option<u8>,
}

struct RawMeasure {
    number: Option<u32>,
    divisions: Option<f64>,
    notes: Vec<RawNote>,
}

/// Document contents before timing is applied. Timing needs the tempo, and
/// the tempo declaration may come after the first notes.
#[derive(Default)]
struct RawScore {
    measures: Vec<RawMeasure>,
    tempo_declaration: Option<String>,
    title: Option<String>,
    composer: Option<String>,
}

pub fn parse_musicxml(xml: &str) -> Result<MusicData, PracticeError> {
    parse_music_data(xml, &ParseOptions::default())
}

pub fn parse_music_data(xml: &str, options: &ParseOptions) -> Result<MusicData, PracticeError> {
    if xml.trim().is_empty() {
        return Err(PracticeError::Parse("empty score document".to_string()));
    }
    let raw = read_document(xml)?;
    Ok(build_timeline(raw, options))
}

fn read_document(xml: &str) -> Result<RawScore, PracticeError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut raw = RawScore::default();
    let mut saw_element = false;

    let mut current_tag: Option<&'static str> = None;

    let mut parts_seen: u32 = 0;
    let mut in_first_part = true;
    let mut current_measure: Option<RawMeasure> = None;
    let mut current_note: Option<RawNote> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                saw_element = true;
                match e.name().as_ref() {
                    b"part" => {
                        parts_seen += 1;
                        in_first_part = parts_seen <= 1;
                    }
                    b"measure" if in_first_part => {
                        current_measure = Some(RawMeasure {
                            number: attr_value(e, b"number").and_then(|v| v.parse::<u32>().ok()),
                            divisions: None,
                            notes: Vec::new(),
                        });
                    }
                    b"note" if current_measure.is_some() => {
                        current_note = Some(RawNote::default());
                    }
                    b"rest" => {
                        if let Some(note) = current_note.as_mut() {
                            note.is_rest = true;
                        }
                    }
                    b"sound" => {
                        if raw.tempo_declaration.is_none() {
                            raw.tempo_declaration = attr_value(e, b"tempo");
                        }
                    }
                    b"creator" => {
                        if attr_value(e, b"type").as_deref() == Some("composer") {
                            current_tag = Some("composer");
                        }
                    }
                    b"divisions" => current_tag = Some("divisions"),
                    b"per-minute" => current_tag = Some("per-minute"),
                    b"work-title" | b"movement-title" => current_tag = Some("title"),
                    b"duration" if current_note.is_some() => current_tag = Some("duration"),
                    b"step" if current_note.is_some() => current_tag = Some("step"),
                    b"alter" if current_note.is_some() => current_tag = Some("alter"),
                    b"octave" if current_note.is_some() => current_tag = Some("octave"),
                    b"fingering" if current_note.is_some() => current_tag = Some("fingering"),
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                saw_element = true;
                match e.name().as_ref() {
                    b"rest" => {
                        if let Some(note) = current_note.as_mut() {
                            note.is_rest = true;
                        }
                    }
                    b"sound" => {
                        if raw.tempo_declaration.is_none() {
                            raw.tempo_declaration = attr_value(e, b"tempo");
                        }
                    }
                    b"measure" if in_first_part => {
                        raw.measures.push(RawMeasure {
                            number: attr_value(e, b"number").and_then(|v| v.parse::<u32>().ok()),
                            divisions: None,
                            notes: Vec::new(),
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(tag) = current_tag.take() {
                    let text = e.unescape()?;
                    let text = text.trim();
                    match tag {
                        "divisions" => {
                            if let (Some(m), Ok(v)) = (current_measure.as_mut(), text.parse::<f64>()) {
                                if v > 0.0 && v.is_finite() {
                                    m.divisions = Some(v);
                                }
                            }
                        }
                        "per-minute" => {
                            if raw.tempo_declaration.is_none() {
                                raw.tempo_declaration = Some(text.to_string());
                            }
                        }
                        "title" => {
                            if raw.title.is_none() && !text.is_empty() {
                                raw.title = Some(text.to_string());
                            }
                        }
                        "composer" => {
                            if raw.composer.is_none() && !text.is_empty() {
                                raw.composer = Some(text.to_string());
                            }
                        }
                        _ => {
                            if let Some(note) = current_note.as_mut() {
                                apply_note_field(note, tag, text);
                            }
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                current_tag = None;
                match e.name().as_ref() {
                    b"note" => {
                        if let (Some(note), Some(m)) = (current_note.take(), current_measure.as_mut()) {
                            m.notes.push(note);
                        }
                    }
                    b"measure" => {
                        if let Some(m) = current_measure.take() {
                            raw.measures.push(m);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    if !saw_element {
        return Err(PracticeError::Parse("document contains no elements".to_string()));
    }
    Ok(raw)
}

fn apply_note_field(note: &mut RawNote, tag: &str, text: &str) {
    match tag {
        "duration" => note.duration_divs = text.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0),
        "step" => note.step = text.chars().next(),
        "alter" => {
            // MusicXML allows fractional alters for microtones; round to the nearest semitone
            if let Ok(v) = text.parse::<f64>() {
                note.alter = v.round() as i32;
            }
        }
        "octave" => note.octave = text.parse::<i32>().ok(),
        "fingering" => {
            note.finger = text.parse::<u8>().ok().filter(|f| (1..=5).contains(f));
        }
        _ => {}
    }
}

fn build_timeline(raw: RawScore, options: &ParseOptions) -> MusicData {
    let fallback = valid_tempo(options.fallback_tempo).unwrap_or(DEFAULT_TEMPO);
    let tempo = raw
        .tempo_declaration
        .as_deref()
        .and_then(|t| t.parse::<f64>().ok())
        .and_then(valid_tempo)
        .unwrap_or(fallback);
    let default_divisions = if options.default_divisions > 0.0 && options.default_divisions.is_finite() {
        options.default_divisions
    } else {
        DEFAULT_DIVISIONS
    };
    let seconds_per_quarter = 60.0 / tempo;

    let mut notes: Vec<Note> = Vec::new();
    let mut measures: Vec<Measure> = Vec::with_capacity(raw.measures.len());
    let mut clock: f64 = 0.0;
    let mut last_number: u32 = 0;

    for raw_measure in raw.measures {
        // pickup bars are numbered 0; numbers must strictly increase
        let number = match raw_measure.number {
            Some(n) if n > last_number => n,
            _ => last_number.saturating_add(1),
        };
        last_number = number;

        let divisions = raw_measure.divisions.unwrap_or(default_divisions);
        let measure_start = clock;

        for raw_note in raw_measure.notes {
            if raw_note.is_rest {
                continue;
            }
            let (Some(step), Some(octave), Some(divs)) =
                (raw_note.step, raw_note.octave, raw_note.duration_divs)
            else {
                continue;
            };
            let Some(pitch) = midi_from_pitch(step, raw_note.alter, octave).filter(|p| (0..=127).contains(p))
            else {
                continue;
            };

            let duration = (divs / divisions) * seconds_per_quarter;
            let start = clock;
            let end = start + duration;
            clock += duration;

            notes.push(Note {
                id: format!("m{}-n{}", number, notes.len()),
                pitch,
                start,
                end,
                duration,
                measure: number,
                hand: Hand::for_pitch(pitch),
                finger: raw_note.finger,
            });
        }

        measures.push(Measure {
            number,
            start: measure_start,
            end: clock,
        });
    }

    MusicData {
        notes,
        measures,
        title: raw.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        composer: raw.composer.unwrap_or_else(|| DEFAULT_COMPOSER.to_string()),
        tempo,
    }
}
