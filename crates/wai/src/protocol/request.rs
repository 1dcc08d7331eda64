//! Inbound request model.
//!
//! A [`Request`] is built once per request by the hosting server and never changes
//! afterwards. The decomposed views, path segments and query parameters, are computed
//! from the raw path and query at build time, so they always agree with them.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use http::header::HOST;
use http::request::Parts;
use http::{HeaderName, HeaderValue, Method, Uri, Version};
use percent_encoding::percent_decode_str;
use tracing::info;

use crate::protocol::{HeaderList, RequestError};

/// The per-request diagnostic sink.
///
/// Delivery is host defined. The default forwards every message to `tracing` at info
/// level under the `micro_wai::request` target.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Fn(&str) + Send + Sync>,
}

impl Logger {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self { sink: Arc::new(f) }
    }

    pub fn tracing() -> Self {
        Self::new(|message| info!(target: "micro_wai::request", "{message}"))
    }

    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    #[inline]
    pub fn log(&self, message: &str) {
        (self.sink)(message)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// An inbound HTTP request, as seen by an application.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    version: Version,
    raw_path: String,
    raw_query: String,
    path_segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: HeaderList,
    server_name: String,
    server_port: u16,
    secure: bool,
    remote_addr: SocketAddr,
    logger: Logger,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// The path exactly as received, still percent-encoded.
    #[inline]
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// The query string without the leading `?`, empty when absent.
    #[inline]
    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    /// Percent-decoded path segments: `/a/b%20c/` is `["a", "b c", ""]`.
    #[inline]
    pub fn path_segments(&self) -> &[String] {
        &self.path_segments
    }

    /// Decoded query parameters in order of appearance, a key without `=` maps to "".
    #[inline]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The first value of the query parameter `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// The first value of the header `name`.
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Every value of the header `name`, in the order received.
    pub fn header_all<'a>(&'a self, name: &'a HeaderName) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.headers.iter().filter(move |(key, _)| key == name).map(|(_, value)| value)
    }

    #[inline]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    #[inline]
    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Returns true if the request arrived over a secure transport.
    #[inline]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    #[inline]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    #[inline]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Sends a diagnostic message to the request's logging sink.
    #[inline]
    pub fn log(&self, message: &str) {
        self.logger.log(message)
    }
}

#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    version: Version,
    uri: Option<String>,
    headers: HeaderList,
    server_name: Option<String>,
    server_port: Option<u16>,
    secure: bool,
    remote_addr: SocketAddr,
    logger: Logger,
}

impl RequestBuilder {
    fn new() -> Self {
        Self {
            method: Method::GET,
            version: Version::HTTP_11,
            uri: None,
            headers: Vec::new(),
            server_name: None,
            server_port: None,
            secure: false,
            remote_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            logger: Logger::default(),
        }
    }

    /// Starts from the parts of an `http::Request`.
    ///
    /// Headers are taken in the iteration order of the `HeaderMap`, which keeps every
    /// value of a name together.
    pub fn from_parts(parts: Parts) -> Self {
        let mut builder = Self::new().method(parts.method).version(parts.version).uri(parts.uri.to_string());
        builder.headers.reserve(parts.headers.len());
        for (name, value) in &parts.headers {
            builder.headers.push((name.clone(), value.clone()));
        }
        builder
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// The request target, origin form (`/path?query`) or absolute form.
    pub fn uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn server_name<S: Into<String>>(mut self, server_name: S) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn server_port(mut self, server_port: u16) -> Self {
        self.server_port = Some(server_port);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn remote_addr(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = remote_addr;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Builds the request.
    ///
    /// Server name and port not set explicitly are taken from the uri authority, then
    /// from the `Host` header, falling back to `localhost` and the scheme default port.
    pub fn build(self) -> Result<Request, RequestError> {
        let uri: Uri = match &self.uri {
            Some(uri) => uri.parse().map_err(RequestError::invalid_uri)?,
            None => Uri::from_static("/"),
        };

        let raw_path = uri.path().to_string();
        let raw_query = uri.query().unwrap_or_default().to_string();
        // decoding is lossy, malformed escapes and bad utf-8 never reject a request
        let query = serde_urlencoded::from_str::<Vec<(String, String)>>(&raw_query).map_err(RequestError::invalid_uri)?;
        let path_segments = decode_path_segments(&raw_path);

        let (host, port) = self.authority(&uri);
        let server_name = self.server_name.or(host).unwrap_or_else(|| "localhost".to_string());
        let default_port = if self.secure { 443 } else { 80 };
        let server_port = self.server_port.or(port).unwrap_or(default_port);

        Ok(Request {
            method: self.method,
            version: self.version,
            raw_path,
            raw_query,
            path_segments,
            query,
            headers: self.headers,
            server_name,
            server_port,
            secure: self.secure,
            remote_addr: self.remote_addr,
            logger: self.logger,
        })
    }

    fn authority(&self, uri: &Uri) -> (Option<String>, Option<u16>) {
        if let Some(authority) = uri.authority() {
            return (Some(authority.host().to_string()), authority.port_u16());
        }

        let host = self.headers.iter().find(|(name, _)| name == HOST).and_then(|(_, value)| value.to_str().ok());
        match host.and_then(|host| host.parse::<http::uri::Authority>().ok()) {
            Some(authority) => (Some(authority.host().to_string()), authority.port_u16()),
            None => (None, None),
        }
    }
}

fn decode_path_segments(path: &str) -> Vec<String> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }

    path.split('/').map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ACCEPT, COOKIE, USER_AGENT};
    use std::sync::Mutex;

    #[test]
    fn decompose_path_and_query() {
        let request = Request::builder().uri("/index/b%20c/?a=1&b=2&a=3&flag").build().unwrap();

        assert_eq!(request.raw_path(), "/index/b%20c/");
        assert_eq!(request.raw_query(), "a=1&b=2&a=3&flag");
        assert_eq!(request.path_segments(), ["index", "b c", ""]);
        assert_eq!(
            request.query(),
            [
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "3".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
        assert_eq!(request.query_value("a"), Some("1"));
        assert_eq!(request.query_value("missing"), None);
    }

    #[test]
    fn root_has_no_segments() {
        let request = Request::builder().build().unwrap();
        assert_eq!(request.raw_path(), "/");
        assert_eq!(request.raw_query(), "");
        assert!(request.path_segments().is_empty());
        assert!(request.query().is_empty());
    }

    #[test]
    fn headers_keep_wire_order_and_duplicates() {
        let request = Request::builder()
            .header(COOKIE, HeaderValue::from_static("a=1"))
            .header(ACCEPT, HeaderValue::from_static("*/*"))
            .header(COOKIE, HeaderValue::from_static("b=2"))
            .build()
            .unwrap();

        let names: Vec<_> = request.headers().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["cookie", "accept", "cookie"]);
        assert_eq!(request.header(&COOKIE), Some(&HeaderValue::from_static("a=1")));
        assert_eq!(request.header_all(&COOKIE).count(), 2);
        assert_eq!(request.header(&USER_AGENT), None);
    }

    #[test]
    fn server_from_host_header() {
        let request = Request::builder().uri("/").header(HOST, HeaderValue::from_static("127.0.0.1:8080")).build().unwrap();
        assert_eq!(request.server_name(), "127.0.0.1");
        assert_eq!(request.server_port(), 8080);

        let request = Request::builder().uri("/").secure(true).header(HOST, HeaderValue::from_static("example.com")).build().unwrap();
        assert_eq!(request.server_name(), "example.com");
        assert_eq!(request.server_port(), 443);
        assert!(request.is_secure());
    }

    #[test]
    fn explicit_server_wins() {
        let request = Request::builder()
            .uri("http://example.com:8000/a")
            .server_name("internal")
            .server_port(9000)
            .build()
            .unwrap();

        assert_eq!(request.server_name(), "internal");
        assert_eq!(request.server_port(), 9000);
        assert_eq!(request.path_segments(), ["a"]);
    }

    #[test]
    fn from_http_parts() {
        let (parts, ()) = http::Request::builder()
            .method(Method::POST)
            .uri("/upload?name=a.txt")
            .version(Version::HTTP_10)
            .header(HOST, "localhost:3000")
            .header(USER_AGENT, "curl/7.79.1")
            .body(())
            .unwrap()
            .into_parts();

        let remote_addr: SocketAddr = "10.0.0.1:51000".parse().unwrap();
        let request = RequestBuilder::from_parts(parts).remote_addr(remote_addr).build().unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.version(), Version::HTTP_10);
        assert_eq!(request.path_segments(), ["upload"]);
        assert_eq!(request.query_value("name"), Some("a.txt"));
        assert_eq!(request.server_port(), 3000);
        assert_eq!(request.remote_addr(), remote_addr);
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn invalid_uri_is_rejected() {
        let result = Request::builder().uri("/a b").build();
        assert!(matches!(result, Err(RequestError::InvalidUri { .. })));
    }

    #[test]
    fn malformed_query_is_decoded_lossily() {
        let request = Request::builder().uri("/?a=%FF&b=%zz&c").build().unwrap();

        assert_eq!(request.query_value("a"), Some("\u{FFFD}"));
        assert_eq!(request.query_value("b"), Some("%zz"));
        assert_eq!(request.query_value("c"), Some(""));
    }

    #[test]
    fn logger_receives_messages() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let logger = Logger::new(move |message| captured.lock().unwrap().push(message.to_string()));

        let request = Request::builder().logger(logger).build().unwrap();
        request.log("hello");
        request.logger().log("world");

        assert_eq!(*lines.lock().unwrap(), vec!["hello".to_string(), "world".to_string()]);
    }
}
