use thiserror::Error;

/// Crate-wide result alias; every fallible operation below the connection
/// or HTTP request boundary returns this.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised anywhere below the connection/request boundary. The
/// boundary (connection handler, admin HTTP handler) is the only place
/// that converts a variant into a wire frame or HTTP response.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("application error: {0}")]
    Application(String),

    #[error("pub/sub backend error: {0}")]
    PubSub(String),

    #[error("pub/sub backend unavailable: {0}")]
    PubSubUnavailable(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("other error: {0}")]
    Other(String),
}

impl Error {
    /// Maps this error onto one of the abstract "kinds" from §7, for
    /// handlers that need to pick an outbound Pusher error code.
    pub fn protocol_error_code(&self) -> Option<u16> {
        match self {
            Error::InvalidMessageFormat(_) => Some(4007),
            Error::Auth(_) => Some(4009),
            Error::PubSubUnavailable(_) => None,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_variants_to_their_wire_codes() {
        assert_eq!(Error::InvalidMessageFormat("x".to_string()).protocol_error_code(), Some(4007));
        assert_eq!(Error::Auth("x".to_string()).protocol_error_code(), Some(4009));
        assert_eq!(Error::Config("x".to_string()).protocol_error_code(), None);
    }
}
