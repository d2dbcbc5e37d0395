//! `GET /stream?magnet=<uri>` handler.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, warn};
use undertow_core::streaming::{ChannelSink, StreamError};

use crate::server::AppState;

/// Query parameters for stream requests
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Magnet URI of the bundle to stream from
    pub magnet: Option<String>,
}

/// Streams the largest video file of the requested bundle.
///
/// Always answers a successful request with `206 Partial Content`, even when
/// no `Range` header was sent. The body is produced by a session task that
/// feeds a bounded channel, so the file is read no faster than the client
/// consumes it.
///
/// # Errors
///
/// - `HandlerError` - Any failure before the response status is committed
pub async fn stream_content(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let prepared = state.coordinator.prepare(query.magnet, range_header).await?;

    let (sink, body) = ChannelSink::channel(state.coordinator.config().channel_capacity);
    let response_headers = prepared.headers();
    prepared.spawn_into(sink);

    Ok((
        StatusCode::PARTIAL_CONTENT,
        response_headers,
        Body::from_stream(body),
    )
        .into_response())
}

/// HTTP rendering of a [`StreamError`].
#[derive(Debug)]
pub struct HandlerError(pub StreamError);

impl From<StreamError> for HandlerError {
    fn from(error: StreamError) -> Self {
        Self(error)
    }
}

impl HandlerError {
    /// Status code the error maps to.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StreamError::MissingLocator => StatusCode::BAD_REQUEST,
            StreamError::NoPlayableFile => StatusCode::NOT_FOUND,
            StreamError::MetadataTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            StreamError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            StreamError::Acquisition(_)
            | StreamError::OpenReader(_)
            | StreamError::Seek { .. }
            | StreamError::Read { .. }
            | StreamError::ClientWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Stream request failed with {}: {}", status, self.0);
        } else {
            warn!("Stream request rejected with {}: {}", status, self.0);
        }

        match self.0 {
            StreamError::RangeNotSatisfiable { file_length, .. } => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{file_length}"))],
                "Requested range not satisfiable",
            )
                .into_response(),
            error => (status, error.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use undertow_core::source::SourceError;

    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (StreamError::MissingLocator, StatusCode::BAD_REQUEST),
            (
                StreamError::Acquisition(SourceError::InvalidLocator {
                    reason: "no info hash".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (StreamError::NoPlayableFile, StatusCode::NOT_FOUND),
            (
                StreamError::MetadataTimeout {
                    waited: Duration::from_secs(1),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                StreamError::RangeNotSatisfiable {
                    start: 10,
                    file_length: 5,
                },
                StatusCode::RANGE_NOT_SATISFIABLE,
            ),
            (
                StreamError::Seek {
                    position: 3,
                    source: io::Error::other("bad seek"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(HandlerError(error).status(), expected);
        }
    }

    #[test]
    fn test_unsatisfiable_range_reports_file_length() {
        let response = HandlerError(StreamError::RangeNotSatisfiable {
            start: 900,
            file_length: 512,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */512");
    }

    #[test]
    fn test_acquisition_error_body_names_cause() {
        let response = HandlerError(StreamError::Acquisition(SourceError::UnsupportedHash {
            hash: "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".to_string(),
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
