//! Minimal HTTP/1.1 request reading and response writing.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};

/// Bodies are never needed by the directory endpoints; anything larger is refused.
const MAX_BODY: usize = 64 * 1024;
const MAX_HEADERS: usize = 100;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    /// Decoded query parameters; the first occurrence of a key wins.
    pub query: HashMap<String, String>,
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Read one request from `reader`. Returns `Ok(None)` when the peer
    /// closed the connection before sending anything.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Option<Self>> {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line)? == 0 {
            return Ok(None);
        }

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(anyhow!("malformed request line"));
        }
        let method = parts[0].to_uppercase();
        let target = parts[1];

        let mut headers = HashMap::new();
        let mut content_length = 0usize;
        loop {
            let mut header_line = String::new();
            if reader.read_line(&mut header_line)? == 0 {
                break;
            }
            let header_line = header_line.trim();
            if header_line.is_empty() {
                break;
            }
            if headers.len() >= MAX_HEADERS {
                return Err(anyhow!("too many headers"));
            }
            if let Some((key, value)) = header_line.split_once(':') {
                let key = key.trim().to_lowercase();
                let value = value.trim().to_string();
                if key == "content-length" {
                    content_length = value.parse().unwrap_or(0);
                }
                headers.insert(key, value);
            }
        }

        if content_length > MAX_BODY {
            return Err(anyhow!("request body too large"));
        }
        if content_length > 0 {
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body)?;
        }

        let (path, query) = split_target(target);
        Ok(Some(Self {
            method,
            path,
            query,
            headers,
        }))
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Trimmed parameter value, empty when absent.
    pub fn param_trimmed(&self, key: &str) -> &str {
        self.param(key).map(str::trim).unwrap_or_default()
    }
}

fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, raw_query) = target.split_once('?').unwrap_or((target, ""));
    let mut query = HashMap::new();
    for (k, v) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        query.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    (path.to_string(), query)
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(status: u16, message: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())],
            body: message.as_bytes().to_vec(),
        }
    }

    pub fn json<T: serde::Serialize>(status: u16, body: &T) -> Result<Self> {
        let json_body = serde_json::to_string_pretty(body)?;
        Ok(Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: json_body.into_bytes(),
        })
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn write_to<W: Write>(&self, stream: &mut W) -> Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_text(self.status));
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));

        stream.write_all(head.as_bytes())?;
        stream.write_all(&self.body)?;
        stream.flush()?;
        Ok(())
    }
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_request() {
        let raw = "GET /download?type=single&id=0123456789abcdef&name=St.%20Dominic HTTP/1.1\r\n\
                   Host: localhost\r\nX-Forwarded-For: 203.0.113.9\r\n\r\n";
        let req = Request::read_from(&mut Cursor::new(raw)).unwrap().unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/download");
        assert_eq!(req.param("type"), Some("single"));
        assert_eq!(req.param("name"), Some("St. Dominic"));
        assert_eq!(req.headers.get("x-forwarded-for").map(String::as_str), Some("203.0.113.9"));
    }

    #[test]
    fn test_first_query_value_wins() {
        let raw = "GET /fetch?key=a&key=b HTTP/1.1\r\n\r\n";
        let req = Request::read_from(&mut Cursor::new(raw)).unwrap().unwrap();
        assert_eq!(req.param("key"), Some("a"));
        assert_eq!(req.param_trimmed("missing"), "");
    }

    #[test]
    fn test_closed_connection() {
        assert!(Request::read_from(&mut Cursor::new("")).unwrap().is_none());
    }

    #[test]
    fn test_malformed_request_line() {
        assert!(Request::read_from(&mut Cursor::new("GARBAGE\r\n\r\n")).is_err());
    }

    #[test]
    fn test_body_consumed() {
        let raw = "POST /fetch HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd";
        let req = Request::read_from(&mut Cursor::new(raw)).unwrap().unwrap();
        assert_eq!(req.method, "POST");
    }

    #[test]
    fn test_write_response() {
        let response = Response::text(429, "Too many requests. Please try again later.")
            .with_header("Retry-After", "60");
        let mut out = Vec::new();
        response.write_to(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 429 Too Many Requests\r\n"));
        assert!(text.contains("Retry-After: 60\r\n"));
        assert!(text.contains("Content-Length: 42\r\n"));
        assert!(text.ends_with("\r\n\r\nToo many requests. Please try again later."));
    }
}
