use std::io;

/// A malformed or unexpected packet. Always fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown packet id 0x{0:02x}")]
    UnknownPacket(u8),
    #[error("invalid string length {0}")]
    StringLength(i32),
    #[error("string is not valid utf-16")]
    BadString,
    #[error("invalid boolean byte {0}")]
    BadBool(u8),
    #[error("unexpected {0} packet")]
    Unexpected(&'static str),
    /// The peer closed the stream cleanly between two packets.
    #[error("end of stream")]
    EndOfStream,
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
}
impl ProtocolError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("actor has shut down")]
    Closed,
    #[error("actor queue is full")]
    Full,
}
impl<T> From<crossbeam_channel::SendError<T>> for EnqueueError {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::Closed
    }
}
impl<T> From<crossbeam_channel::TrySendError<T>> for EnqueueError {
    fn from(e: crossbeam_channel::TrySendError<T>) -> Self {
        match e {
            crossbeam_channel::TrySendError::Full(_) => Self::Full,
            crossbeam_channel::TrySendError::Disconnected(_) => Self::Closed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("client speaks protocol {0}")]
    Version(i32),
    #[error("invalid username {0:?}")]
    Username(String),
    #[error("login name {login:?} does not match handshake name {handshake:?}")]
    NameMismatch { handshake: String, login: String },
}

/// Why a participant's session ended.
#[derive(Debug, thiserror::Error)]
pub enum Disconnection {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("client quit: {0}")]
    Quit(String),
    /// The participant was kicked by another actor, usually for falling behind.
    #[error("connection closed by the server")]
    Closed,
    #[error("game is unreachable: {0}")]
    Game(#[from] EnqueueError),
}
