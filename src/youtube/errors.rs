use thiserror::Error;

use super::innertube::types::{IdType, ModerationAction};

/// トランスポート層で発生したエラー（`LiveChatError::TransportFailure`の原因）
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum LiveChatError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("{summary}: {source}")]
    TransportFailure {
        summary: String,
        #[source]
        source: TransportError,
    },

    #[error("Continuation is missing - call reset() to re-bootstrap")]
    MissingContinuation,

    #[error("Invalid {kind} id: {id}")]
    InvalidIdentifier { kind: IdType, id: String },

    #[error("Permission denied: no {0} token is available for this item")]
    PermissionDenied(ModerationAction),

    #[error("Credentials are required - call set_credentials() first")]
    CredentialsRequired,

    #[error("{0} is not supported for a replay")]
    UnsupportedInReplay(&'static str),

    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    #[error("The channel (ID:{0}) has not started live streaming")]
    ChannelNotLive(String),

    #[error("The broadcast has ended")]
    BroadcastEnded,

    #[error("Unrecognized URL: {0}")]
    InvalidUrl(String),
}

impl LiveChatError {
    /// トランスポートエラーを要約付きでラップする
    pub fn transport(summary: impl Into<String>, source: TransportError) -> Self {
        Self::TransportFailure {
            summary: summary.into(),
            source,
        }
    }

    /// `TransportFailure`の場合は要約を差し替える（呼び出し元の操作名を付与するため）
    pub(crate) fn with_summary(self, summary: &str) -> Self {
        match self {
            Self::TransportFailure { source, .. } => Self::transport(summary, source),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_message_includes_cause() {
        let err = LiveChatError::transport(
            "Can't get youtube live chat",
            TransportError::Status {
                status: 403,
                body: "forbidden".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "Can't get youtube live chat: unexpected status 403: forbidden"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_with_summary_only_touches_transport_failures() {
        let err = LiveChatError::transport("inner", TransportError::Other("boom".to_string()))
            .with_summary("Couldn't delete chat");
        assert_eq!(err.to_string(), "Couldn't delete chat: boom");

        let err = LiveChatError::MissingContinuation.with_summary("ignored");
        assert!(matches!(err, LiveChatError::MissingContinuation));
    }
}
