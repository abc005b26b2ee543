//! Message body framing.

use hyper::header::{HeaderMap, CONTENT_LENGTH, TRANSFER_ENCODING};

use crate::protocol::ProtocolError;

/// How a message body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLength {
    Chunked,
    Length(u64),
    /// No framing headers: body runs until the connection closes (responses),
    /// or there is no body (requests).
    Undefined,
}

/// Determines body framing from message headers.
pub trait ContentLengthStrategy: Send + Sync {
    fn determine_length(&self, headers: &HeaderMap) -> Result<ContentLength, ProtocolError>;
}

/// `Transfer-Encoding` wins over `Content-Length`; the only supported
/// transfer coding is `chunked`, which must be the final coding.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContentLengthStrategy;

impl ContentLengthStrategy for DefaultContentLengthStrategy {
    fn determine_length(&self, headers: &HeaderMap) -> Result<ContentLength, ProtocolError> {
        let mut codings = Vec::new();
        for value in headers.get_all(TRANSFER_ENCODING) {
            let value = value
                .to_str()
                .map_err(|_| ProtocolError::InvalidHeader("transfer-encoding"))?;
            codings.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_ascii_lowercase),
            );
        }
        if let Some(last) = codings.last() {
            return if last == "chunked" {
                Ok(ContentLength::Chunked)
            } else {
                Err(ProtocolError::UnsupportedTransferEncoding(codings.join(", ")))
            };
        }

        let mut values = headers.get_all(CONTENT_LENGTH).iter();
        let Some(value) = values.next() else {
            return Ok(ContentLength::Undefined);
        };
        if values.next().is_some() {
            return Err(ProtocolError::MultipleContentLength);
        }
        let raw = value
            .to_str()
            .map_err(|_| ProtocolError::InvalidHeader("content-length"))?;
        raw.trim()
            .parse::<u64>()
            .map(ContentLength::Length)
            .map_err(|_| ProtocolError::InvalidContentLength(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_length_and_undefined() {
        let strategy = DefaultContentLengthStrategy;
        assert_eq!(
            strategy.determine_length(&headers(&[("content-length", " 42 ")])),
            Ok(ContentLength::Length(42))
        );
        assert_eq!(strategy.determine_length(&HeaderMap::new()), Ok(ContentLength::Undefined));
    }

    #[test]
    fn test_chunked_overrides_length() {
        let strategy = DefaultContentLengthStrategy;
        let map = headers(&[("transfer-encoding", "gzip, Chunked"), ("content-length", "10")]);
        assert_eq!(strategy.determine_length(&map), Ok(ContentLength::Chunked));
    }

    #[test]
    fn test_rejects_bad_framing() {
        let strategy = DefaultContentLengthStrategy;
        assert!(matches!(
            strategy.determine_length(&headers(&[("transfer-encoding", "gzip")])),
            Err(ProtocolError::UnsupportedTransferEncoding(_))
        ));
        assert_eq!(
            strategy.determine_length(&headers(&[("content-length", "1"), ("content-length", "1")])),
            Err(ProtocolError::MultipleContentLength)
        );
        assert_eq!(
            strategy.determine_length(&headers(&[("content-length", "-5")])),
            Err(ProtocolError::InvalidContentLength("-5".into()))
        );
    }
}
