use lobbybot_protocol::ProtocolError;

/// Errors from the real-time hub connection.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Establishing the connection failed.
    #[error("hub connection failed: {0}")]
    Connect(String),

    /// The connection is gone; the invocation never completed.
    #[error("hub connection closed")]
    Closed,

    /// Writing the invocation to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The hub did not answer in time.
    #[error("hub did not complete {0} in time")]
    Timeout(&'static str),

    /// The hub answered with an error.
    #[error("hub rejected {method}: {reason}")]
    Rejected {
        method: &'static str,
        reason: String,
    },

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors from the REST collaborator (catalog, users, chat, rooms).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (connect, TLS, body read).
    #[cfg(feature = "rest")]
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// A non-HTTP transport failure (used by alternate clients and mocks).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body didn't have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The API answered with an error message.
    #[error("api error: {0}")]
    Remote(String),
}

impl ApiError {
    /// `true` when the account itself is blocked from acting: silenced,
    /// restricted or banned. Those failures are never retried.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Remote(reason) => {
                let reason = reason.to_ascii_lowercase();
                ["silenced", "restricted", "banned"]
                    .iter()
                    .any(|word| reason.contains(word))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_account_errors() {
        assert!(ApiError::Remote("You are silenced".into()).is_terminal());
        assert!(ApiError::Remote("account RESTRICTED".into()).is_terminal());
        assert!(ApiError::Remote("user is banned".into()).is_terminal());
    }

    #[test]
    fn test_transient_errors_are_not_terminal() {
        assert!(!ApiError::Remote("rate limited".into()).is_terminal());
        assert!(!ApiError::Transport("banned".into()).is_terminal());
        assert!(!ApiError::Decode("bad json".into()).is_terminal());
    }

    #[test]
    fn test_rejected_display() {
        let err = HubError::Rejected {
            method: "RemovePlaylistItem",
            reason: "cannot empty playlist".into(),
        };
        assert_eq!(
            err.to_string(),
            "hub rejected RemovePlaylistItem: cannot empty playlist"
        );
    }
}
