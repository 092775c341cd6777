use thiserror::Error;

/// Values the server sent that break the room protocol.
///
/// These never abort the session: the offending update is logged and skipped.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("face value {0} is outside 1..=6")]
    FaceOutOfRange(i64),
    #[error("roll counter {0} is negative")]
    NegativeRollCount(i64),
}
