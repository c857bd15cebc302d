// Request line extraction.

use super::ParseError;

/// The only method the proxy serves.
pub const GET: &str = "GET";

const MAX_HEADERS: usize = 64;

/// Method and target of the first request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub target: &'a str,
}

impl RequestLine<'_> {
    pub fn is_get(&self) -> bool {
        self.method == GET
    }
}

/// Extracts method and target from the start of `buf`.
///
/// Only the request line matters: whatever follows it (headers cut off by the
/// read, too many of them, or malformed ones) is ignored. A request line longer
/// than `buf` yields the target as far as it was read.
pub fn parse_request_line(buf: &[u8]) -> Result<RequestLine<'_>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let parsed = req.parse(buf);
    if let (Some(method), Some(target)) = (req.method, req.path) {
        return Ok(RequestLine { method, target });
    }

    match parsed {
        Ok(httparse::Status::Partial) => split_first_line(buf).ok_or(ParseError::Incomplete),
        Ok(httparse::Status::Complete(_)) => Err(ParseError::Incomplete),
        Err(err) => Err(ParseError::Malformed(err)),
    }
}

/// Splits a request line that never reached its end into method and target.
fn split_first_line(buf: &[u8]) -> Option<RequestLine<'_>> {
    let line = match std::str::from_utf8(buf) {
        Ok(line) => line,
        // The read may have stopped inside a multi-byte character.
        Err(err) => std::str::from_utf8(&buf[..err.valid_up_to()]).ok()?,
    };
    let line = line.split(['\r', '\n']).next()?;

    let mut parts = line.split(' ').filter(|p| !p.is_empty());
    let method = parts.next()?;
    let target = parts.next()?;
    Some(RequestLine { method, target })
}

/// Like [`parse_request_line`], but rejects anything other than `GET`.
pub fn parse_get_target(buf: &[u8]) -> Result<&str, ParseError> {
    let line = parse_request_line(buf)?;
    if !line.is_get() {
        return Err(ParseError::UnsupportedMethod(line.method.to_owned()));
    }
    Ok(line.target)
}
