//! Lenient parser for JDBC-style connection URLs.
//!
//! Grammar: `<prefix><protocol-marker><host>[:<port>][<sep><database>][;params]`
//! where the protocol marker is one of `://`, `@`, `:@//` and the separator is
//! one of `/`, `:`, `;databaseName=`.
//!
//! Parsing never fails. Input without a protocol marker, or with a host token
//! that is not a valid host, yields an empty [`ConnectionString`]. A port
//! outside `u16` is left undefined.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

static PROTOCOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(://|@|:@//)").unwrap());
static AUTHORITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^/:]+(:\d+)?").unwrap());
static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(/|:|;databaseName=)").unwrap());
static DATABASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^;]*").unwrap());

/// `{host, port, database}` extracted from a connection URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionString {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
}

impl ConnectionString {
    /// Parse `input`. Unrecognised input produces the empty value.
    pub fn parse(input: &str) -> Self {
        let mut scanner = Scanner::new(input);
        if scanner.find(&PROTOCOL).is_none() {
            return Self::default();
        }
        let Some(authority) = scanner.find(&AUTHORITY) else {
            return Self::default();
        };
        scanner.find(&SEPARATOR);
        let database = scanner
            .find(&DATABASE)
            .filter(|d| !d.is_empty())
            .map(String::from);

        // An out-of-range port drops only the port; the host still has to
        // pass the bind policy.
        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().ok()),
            None => (authority, None),
        };
        let Some(host) = Url::parse(&format!("http://{}", host))
            .ok()
            .and_then(|url| url.host_str().map(String::from))
        else {
            return Self::default();
        };

        Self {
            host: Some(host),
            port,
            database,
        }
    }

    /// True when nothing could be extracted.
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.port.is_none() && self.database.is_none()
    }
}

/// Left-to-right cursor: each successful `find` consumes input up to the end
/// of the match, a failed one leaves the cursor in place.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        let line_end = input.find(['\r', '\n']).unwrap_or(input.len());
        Self {
            input: &input[..line_end],
            pos: 0,
        }
    }

    fn find(&mut self, pattern: &Regex) -> Option<&'a str> {
        let m = pattern.find_at(self.input, self.pos)?;
        self.pos = m.end();
        Some(m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(host: Option<&str>, port: Option<u16>, database: Option<&str>) -> ConnectionString {
        ConnectionString {
            host: host.map(String::from),
            port,
            database: database.map(String::from),
        }
    }

    #[test]
    fn hsqldb_server_url() {
        assert_eq!(
            ConnectionString::parse("jdbc:hsqldb:hsql://localhost:9001/mydb"),
            cs(Some("localhost"), Some(9001), Some("mydb"))
        );
    }

    #[test]
    fn missing_port_stays_undefined() {
        assert_eq!(
            ConnectionString::parse("jdbc:hsqldb:hsql://127.0.0.1/fs"),
            cs(Some("127.0.0.1"), None, Some("fs"))
        );
    }

    #[test]
    fn not_a_url_is_empty() {
        let parsed = ConnectionString::parse("not-a-url");
        assert_eq!(parsed, ConnectionString::default());
        assert!(parsed.is_empty());
    }

    #[test]
    fn in_memory_url_is_empty() {
        assert!(ConnectionString::parse("jdbc:hsqldb:mem:test").is_empty());
    }

    #[test]
    fn trailing_parameters_are_ignored() {
        assert_eq!(
            ConnectionString::parse("jdbc:hsqldb:hsql://localhost:9001/fs;ifexists=true"),
            cs(Some("localhost"), Some(9001), Some("fs"))
        );
    }

    #[test]
    fn oracle_thin_url() {
        assert_eq!(
            ConnectionString::parse("jdbc:oracle:thin:@//dbhost:1521/ORCL"),
            cs(Some("dbhost"), Some(1521), Some("ORCL"))
        );
        assert_eq!(
            ConnectionString::parse("jdbc:oracle:thin:@dbhost:1521:ORCL"),
            cs(Some("dbhost"), Some(1521), Some("ORCL"))
        );
    }

    #[test]
    fn sqlserver_database_name_parameter() {
        assert_eq!(
            ConnectionString::parse("jdbc:sqlserver://sql.local:1433;databaseName=files;encrypt=true"),
            cs(Some("sql.local"), Some(1433), Some("files"))
        );
    }

    #[test]
    fn host_without_database() {
        assert_eq!(
            ConnectionString::parse("jdbc:hsqldb:hsql://localhost:9001"),
            cs(Some("localhost"), Some(9001), None)
        );
    }

    #[test]
    fn out_of_range_port_keeps_host() {
        assert_eq!(
            ConnectionString::parse("jdbc:hsqldb:hsql://10.0.0.5:99999/fs"),
            cs(Some("10.0.0.5"), None, Some("fs"))
        );
    }

    #[test]
    fn parse_is_idempotent() {
        let input = "jdbc:hsqldb:hsql://localhost:9001/mydb";
        assert_eq!(ConnectionString::parse(input), ConnectionString::parse(input));
    }
}
