//! HTTP/1.1 request parsing using the [`httparse`] crate.
//!
//! Besides the request line and headers, a [`Request`] knows how to decode its
//! query string and its body into name/value fields, which is what the router
//! merges into a route's parameters.

use std::convert::Infallible;

use bytes::Bytes;
use futures::{executor, stream};
use thiserror::Error;
use url::form_urlencoded;

use super::{Headers, Method};

/// Errors that can occur while parsing a request or decoding its body.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON request body must be an object")]
    JsonNotObject,

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] multer::Error),
}

/// A parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer, or by [`Request::new`]
/// when a transport has already done the parsing.
///
/// # Examples
///
/// ```
/// use signpost::http::request::Request;
///
/// let raw = b"GET /hello?name=world&tag=a+b HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.query_param("tag"), Some("a b"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    query_params: Vec<(String, String)>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Builds a request from a method and a request target (`/path?query`).
    ///
    /// # Examples
    ///
    /// ```
    /// use signpost::http::{Method, Request};
    ///
    /// let request = Request::new(Method::Post, "/register/42?ref=mail")
    ///     .with_body("name=Ada");
    /// assert_eq!(request.path(), "/register/42");
    /// assert_eq!(request.query_param("ref"), Some("mail"));
    /// ```
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        let query_params = query.as_deref().map(decode_form).unwrap_or_default();
        Self {
            method,
            path,
            version: 1,
            headers: Headers::new(),
            query,
            body: Bytes::new(),
            query_params,
        }
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf`. The body holds whatever bytes follow the headers; a transport
    /// still waiting on `Content-Length` bytes should call
    /// [`with_body`](Self::with_body) once they have arrived.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the headers.
    /// - [`RequestError::Parse`] — the data is malformed.
    /// - [`RequestError::MissingField`] — method, path or version is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = match raw_req.method {
            Some(method) => method.parse::<Method>().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let mut request = Self::new(method, target);
        request.version = version;
        request.headers = header_map;
        request.body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((request, body_offset))
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a decoded query parameter by key. Repeated keys resolve to the last value.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every decoded query pair in order of appearance.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the body into name/value fields.
    ///
    /// `application/json` bodies must be objects; scalar members are
    /// stringified, `null` becomes an empty string and nested values keep
    /// their JSON text. `multipart/form-data` bodies contribute their text
    /// parts; file parts are skipped. Any other body is read as
    /// `application/x-www-form-urlencoded`, which is also assumed when no
    /// `Content-Type` is sent. An empty body yields no fields.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Json`] / [`RequestError::JsonNotObject`] for bad JSON bodies.
    /// - [`RequestError::Multipart`] for a multipart body without a boundary
    ///   or with malformed parts.
    pub fn body_fields(&self) -> Result<Vec<(String, String)>, RequestError> {
        if self.body.is_empty() {
            return Ok(Vec::new());
        }

        let header = self.headers.get("content-type").unwrap_or_default();
        let content_type = header
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match content_type.as_str() {
            "application/json" => {
                let value: serde_json::Value = serde_json::from_slice(&self.body)?;
                let serde_json::Value::Object(object) = value else {
                    return Err(RequestError::JsonNotObject);
                };
                Ok(object
                    .into_iter()
                    .map(|(key, value)| (key, json_field(value)))
                    .collect())
            }
            ct if ct.starts_with("multipart/") => multipart_fields(header, self.body.clone()),
            _ => Ok(form_urlencoded::parse(&self.body).into_owned().collect()),
        }
    }

    /// Returns `true` if the connection should be kept alive after this request.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
        None => (target.to_owned(), None),
    }
}

fn decode_form(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

// The body is already fully buffered, so the multipart future completes on
// its first poll.
fn multipart_fields(content_type: &str, body: Bytes) -> Result<Vec<(String, String)>, RequestError> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    executor::block_on(async move {
        let mut fields = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            fields.push((name, field.text().await?));
        }
        Ok::<_, RequestError>(fields)
    })
}

fn json_field(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn query_is_percent_decoded() {
        let raw = b"GET /search?q=caf%C3%A9&page=2&page=3 HTTP/1.1\r\nHost: x\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_string(), Some("q=caf%C3%A9&page=2&page=3"));
        assert_eq!(req.query_param("q"), Some("café"));
        assert_eq!(req.query_param("page"), Some("3"));
        assert_eq!(req.query_params().len(), 3);
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn keep_alive_follows_version_and_header() {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.0\r\nHost: x\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn body_offset_and_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 7\r\n\r\nname=Ad";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(7));
        assert_eq!(&raw[body_offset..], b"name=Ad");
        assert_eq!(req.body().as_ref(), b"name=Ad");
    }

    #[test]
    fn form_body_fields() {
        let req = Request::new(Method::Post, "/register")
            .with_header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .with_body("name=Ada+Lovelace&email=ada%40example.com");
        let fields = req.body_fields().unwrap();
        assert_eq!(
            fields,
            vec![
                ("name".to_owned(), "Ada Lovelace".to_owned()),
                ("email".to_owned(), "ada@example.com".to_owned()),
            ]
        );
    }

    #[test]
    fn json_body_fields_are_stringified() {
        let req = Request::new(Method::Put, "/items/1")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"qty":3,"name":"bolt","gone":null,"tags":["a"]}"#);
        let mut fields = req.body_fields().unwrap();
        fields.sort();
        assert_eq!(
            fields,
            vec![
                ("gone".to_owned(), String::new()),
                ("name".to_owned(), "bolt".to_owned()),
                ("qty".to_owned(), "3".to_owned()),
                ("tags".to_owned(), r#"["a"]"#.to_owned()),
            ]
        );
    }

    #[test]
    fn json_array_body_is_rejected() {
        let req = Request::new(Method::Patch, "/items/1")
            .with_header("Content-Type", "application/json")
            .with_body("[1,2]");
        assert!(matches!(req.body_fields(), Err(RequestError::JsonNotObject)));
    }

    #[test]
    fn empty_body_has_no_fields() {
        let req = Request::new(Method::Delete, "/items/1");
        assert!(req.body_fields().unwrap().is_empty());
    }

    const MULTIPART: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"name\"\r\n\r\n\
        Ada Lovelace\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"avatar\"; filename=\"ada.png\"\r\n\
        Content-Type: image/png\r\n\r\n\
        PNG\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"email\"\r\n\r\n\
        ada@example.com\r\n\
        --XyZ--\r\n";

    #[test]
    fn multipart_text_parts_become_fields() {
        let req = Request::new(Method::Post, "/register")
            .with_header("Content-Type", "multipart/form-data; boundary=XyZ")
            .with_body(MULTIPART);
        assert_eq!(
            req.body_fields().unwrap(),
            vec![
                ("name".to_owned(), "Ada Lovelace".to_owned()),
                ("email".to_owned(), "ada@example.com".to_owned()),
            ]
        );
    }

    #[test]
    fn multipart_without_boundary_is_an_error() {
        let req = Request::new(Method::Post, "/upload")
            .with_header("Content-Type", "multipart/form-data")
            .with_body("--x--");
        assert!(matches!(req.body_fields(), Err(RequestError::Multipart(_))));
    }
}
