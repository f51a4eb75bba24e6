use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PracticeError {
    /// Malformed or unreachable score source. The caller decides whether to retry.
    #[error("Score parse error: {0}")]
    Parse(String),

    /// Live performance input is unsupported or access was denied.
    #[error("Performance input unavailable: {0}")]
    InputUnavailable(String),

    /// Failure reported by a playback or audio collaborator. Never fatal.
    #[error("Device error: {0}")]
    Device(String),

    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),

    #[error("Invalid meter: {0} beats per measure")]
    InvalidMeter(u32),

    #[error("No score loaded")]
    NoScoreLoaded,
}

impl From<quick_xml::Error> for PracticeError {
    fn from(e: quick_xml::Error) -> Self {
        PracticeError::Parse(format!("XML parse error: {}", e))
    }
}
