//! Raw IMAP over TLS (rustls), blocking.
//!
//! Only the handful of commands triage needs: LOGIN, SELECT, CREATE,
//! STATUS, UID SEARCH, UID FETCH (BODY.PEEK), UID COPY, UID STORE, EXPUNGE.
//! Literals (`{n}`) are read byte-exact so message bodies survive intact.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::MailError;
use crate::mail::{MailSession, MessageId};

/// TLS stream used in production.
pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A tagged command's full response.
#[derive(Debug, Default)]
struct Response {
    /// Untagged and continuation lines, CRLF stripped.
    lines: Vec<String>,
    /// Literal payloads in the order they appeared.
    literals: Vec<Vec<u8>>,
    /// Status word from the tagged line: OK, NO or BAD.
    status: String,
    /// The full tagged line, CRLF stripped.
    tagged: String,
}

impl Response {
    fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("OK")
    }
}

/// IMAP session over any byte stream.
pub struct ImapSession<S: Read + Write> {
    stream: S,
    tag_counter: u32,
    mailbox: Option<String>,
}

impl ImapSession<TlsStream> {
    /// Connect, log in, select the mailbox and make sure destination folders exist.
    pub fn open(config: &MailConfig) -> Result<Self, MailError> {
        let stream = connect_tls(&config.host, config.port)?;
        let mut session = Self::from_stream(stream)?;
        session.login(&config.username, config.password.expose_secret())?;
        session.select(&config.mailbox)?;
        session.ensure_folder(&config.promotional_folder)?;
        session.ensure_folder(&config.trash_folder)?;
        info!(
            host = %config.host,
            mailbox = %config.mailbox,
            "IMAP session ready"
        );
        Ok(session)
    }
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap an already-connected stream and consume the server greeting.
    pub fn from_stream(mut stream: S) -> Result<Self, MailError> {
        let greeting = read_line(&mut stream)?;
        debug!(greeting = %greeting.trim_end(), "IMAP greeting");
        Ok(Self {
            stream,
            tag_counter: 0,
            mailbox: None,
        })
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), MailError> {
        let response = self.send(&format!("LOGIN {} {}", quote(username), quote(password)))?;
        if !response.is_ok() {
            return Err(MailError::LoginFailed {
                username: username.to_string(),
            });
        }
        Ok(())
    }

    /// Select a mailbox read-write.
    pub fn select(&mut self, mailbox: &str) -> Result<(), MailError> {
        self.run_ok("SELECT", &format!("SELECT {}", quote(mailbox)))?;
        self.mailbox = Some(mailbox.to_string());
        Ok(())
    }

    /// Create a folder; a NO/BAD reply means it already exists.
    pub fn ensure_folder(&mut self, name: &str) -> Result<(), MailError> {
        let response = self.send(&format!("CREATE {}", quote(name)))?;
        if !response.is_ok() {
            debug!(folder = name, reply = %response.tagged, "CREATE refused, assuming folder exists");
        }
        Ok(())
    }

    /// `UIDVALIDITY` of a mailbox via STATUS.
    pub fn uidvalidity(&mut self, mailbox: &str) -> Result<String, MailError> {
        let response = self.run_ok("STATUS", &format!("STATUS {} (UIDVALIDITY)", quote(mailbox)))?;
        response
            .lines
            .iter()
            .find_map(|line| parse_uidvalidity(line))
            .ok_or_else(|| MailError::Protocol {
                command: "STATUS".into(),
                reason: "no UIDVALIDITY in response".into(),
            })
    }

    /// Send one tagged command and collect the response.
    fn send(&mut self, command: &str) -> Result<Response, MailError> {
        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let full = format!("{tag} {command}\r\n");
        self.stream.write_all(full.as_bytes())?;
        self.stream.flush()?;

        let tag_prefix = format!("{tag} ");
        let mut response = Response::default();
        loop {
            let line = read_line(&mut self.stream)?;
            if let Some(rest) = line.strip_prefix(&tag_prefix) {
                // A bare tag leaves the status empty, which reads as a failure.
                response.status = rest.split_whitespace().next().unwrap_or_default().to_string();
                response.tagged = line.trim_end().to_string();
                return Ok(response);
            }
            if let Some(len) = literal_length(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            response.lines.push(line.trim_end().to_string());
        }
    }

    /// Send a command and require an OK status.
    fn run_ok(&mut self, name: &str, command: &str) -> Result<Response, MailError> {
        let response = self.send(command)?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(MailError::CommandFailed {
                command: name.to_string(),
                status: response.tagged,
            })
        }
    }

    fn fetch_literal(&mut self, id: MessageId, item: &str) -> Result<Vec<u8>, MailError> {
        let mut response = self.run_ok("UID FETCH", &format!("UID FETCH {id} ({item})"))?;
        if response.literals.is_empty() {
            return Err(MailError::Protocol {
                command: "UID FETCH".into(),
                reason: format!("no literal for UID {id}"),
            });
        }
        Ok(response.literals.swap_remove(0))
    }
}

impl<S: Read + Write + Send> MailSession for ImapSession<S> {
    fn epoch(&mut self) -> Result<String, MailError> {
        let mailbox = self.mailbox.clone().ok_or_else(|| MailError::Protocol {
            command: "STATUS".into(),
            reason: "no mailbox selected".into(),
        })?;
        self.uidvalidity(&mailbox)
    }

    fn list_new_ids(&mut self, watermark: MessageId) -> Result<Vec<MessageId>, MailError> {
        let response = self.run_ok("UID SEARCH", "UID SEARCH ALL")?;
        let mut ids: Vec<MessageId> = response
            .lines
            .iter()
            .filter_map(|line| line.strip_prefix("* SEARCH"))
            .flat_map(|rest| rest.split_whitespace())
            .filter_map(|tok| tok.parse().ok())
            .filter(|id| *id > watermark)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn fetch_full(&mut self, id: MessageId) -> Result<Vec<u8>, MailError> {
        self.fetch_literal(id, "BODY.PEEK[]")
    }

    fn fetch_headers(&mut self, id: MessageId) -> Result<String, MailError> {
        let bytes = self.fetch_literal(id, "BODY.PEEK[HEADER]")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn move_to(&mut self, id: MessageId, folder: &str) -> Result<(), MailError> {
        self.run_ok("UID COPY", &format!("UID COPY {id} {}", quote(folder)))?;
        self.run_ok("UID STORE", &format!("UID STORE {id} +FLAGS (\\Deleted)"))?;
        self.run_ok("EXPUNGE", "EXPUNGE")?;
        debug!(uid = id, folder, "Message moved");
        Ok(())
    }

    fn logout(&mut self) {
        if let Err(e) = self.send("LOGOUT") {
            warn!(error = %e, "IMAP logout failed");
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Open TCP + rustls using the webpki root store.
fn connect_tls(host: &str, port: u16) -> Result<TlsStream, MailError> {
    let tcp = TcpStream::connect((host, port)).map_err(|e| MailError::Connect {
        host: host.to_string(),
        port,
        reason: e.to_string(),
    })?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| MailError::Tls(format!("invalid server name {host}: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| MailError::Tls(e.to_string()))?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// Read one CRLF-terminated line (CRLF included).
fn read_line<R: Read>(stream: &mut R) -> Result<String, MailError> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match stream.read(&mut byte) {
            Ok(0) => return Err(MailError::Closed),
            Ok(_) => {
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n") {
                    return Ok(String::from_utf8_lossy(&buf).into_owned());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Length of a trailing `{n}` literal marker, if present.
fn literal_length(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let inner = trimmed.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

/// `UIDVALIDITY` value from a STATUS line.
fn parse_uidvalidity(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("UIDVALIDITY")?;
    let value: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (!value.is_empty()).then_some(value)
}

/// IMAP quoted string.
pub fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Server replies are scripted up front; client writes are captured.
    struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(script: impl Into<Vec<u8>>) -> Self {
            Self {
                input: Cursor::new(script.into()),
                written: Vec::new(),
            }
        }

        fn written(&self) -> String {
            String::from_utf8_lossy(&self.written).into_owned()
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(script: &str) -> ImapSession<ScriptedStream> {
        let full = format!("* OK IMAP4rev1 ready\r\n{script}");
        ImapSession::from_stream(ScriptedStream::new(full)).unwrap()
    }

    #[test]
    fn login_sends_quoted_credentials() {
        let mut s = session("A1 OK LOGIN completed\r\n");
        s.login("me@example.com", "p\"w").unwrap();
        assert_eq!(
            s.get_ref().written(),
            "A1 LOGIN \"me@example.com\" \"p\\\"w\"\r\n"
        );
    }

    #[test]
    fn login_rejected() {
        let mut s = session("A1 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n");
        let err = s.login("me", "bad").unwrap_err();
        assert!(matches!(err, MailError::LoginFailed { .. }));
    }

    #[test]
    fn epoch_requires_selected_mailbox() {
        let mut s = session("");
        assert!(matches!(s.epoch(), Err(MailError::Protocol { .. })));
    }

    #[test]
    fn epoch_from_status() {
        let mut s = session(
            "* 12 EXISTS\r\n\
             A1 OK [READ-WRITE] SELECT completed\r\n\
             * STATUS \"INBOX\" (UIDVALIDITY 1700000001)\r\n\
             A2 OK STATUS completed\r\n",
        );
        s.select("INBOX").unwrap();
        assert_eq!(s.epoch().unwrap(), "1700000001");
        assert!(s.get_ref().written().contains("A2 STATUS \"INBOX\" (UIDVALIDITY)\r\n"));
    }

    #[test]
    fn list_new_ids_filters_and_sorts() {
        let mut s = session("* SEARCH 9 3 7 1\r\nA1 OK SEARCH completed\r\n");
        assert_eq!(s.list_new_ids(3).unwrap(), vec![7, 9]);
    }

    #[test]
    fn list_new_ids_empty_mailbox() {
        let mut s = session("* SEARCH\r\nA1 OK SEARCH completed\r\n");
        assert!(s.list_new_ids(0).unwrap().is_empty());
    }

    #[test]
    fn fetch_full_reads_literal_exactly() {
        // The body contains a line that looks like a tagged reply.
        let body = "Subject: hi\r\n\r\nA1 OK not really\r\n";
        let script = format!(
            "* 1 FETCH (UID 7 BODY[] {{{}}}\r\n{body})\r\nA1 OK FETCH completed\r\n",
            body.len()
        );
        let mut s = session(&script);
        assert_eq!(s.fetch_full(7).unwrap(), body.as_bytes());
        assert_eq!(s.get_ref().written(), "A1 UID FETCH 7 (BODY.PEEK[])\r\n");
    }

    #[test]
    fn fetch_headers_decodes_lossily() {
        let mut bytes = b"* OK ready\r\n".to_vec();
        bytes.extend_from_slice(b"* 1 FETCH (UID 4 BODY[HEADER] {4}\r\nab\xffc)\r\nA1 OK done\r\n");
        let mut s = ImapSession::from_stream(ScriptedStream::new(bytes)).unwrap();
        assert_eq!(s.fetch_headers(4).unwrap(), "ab\u{FFFD}c");
    }

    #[test]
    fn fetch_without_literal_is_protocol_error() {
        let mut s = session("A1 OK FETCH completed\r\n");
        assert!(matches!(s.fetch_full(5), Err(MailError::Protocol { .. })));
    }

    #[test]
    fn move_copies_flags_and_expunges() {
        let mut s = session(
            "A1 OK COPY completed\r\n\
             * 3 FETCH (FLAGS (\\Deleted))\r\n\
             A2 OK STORE completed\r\n\
             * 3 EXPUNGE\r\n\
             A3 OK EXPUNGE completed\r\n",
        );
        s.move_to(42, "Bulk Mail").unwrap();
        assert_eq!(
            s.get_ref().written(),
            "A1 UID COPY 42 \"Bulk Mail\"\r\n\
             A2 UID STORE 42 +FLAGS (\\Deleted)\r\n\
             A3 EXPUNGE\r\n"
        );
    }

    #[test]
    fn failed_copy_aborts_move() {
        let mut s = session("A1 NO [TRYCREATE] no such mailbox\r\n");
        let err = s.move_to(42, "Missing").unwrap_err();
        assert!(matches!(err, MailError::CommandFailed { ref command, .. } if command == "UID COPY"));
        assert!(!s.get_ref().written().contains("STORE"));
    }

    #[test]
    fn ensure_folder_tolerates_existing() {
        let mut s = session("A1 NO [ALREADYEXISTS] Mailbox exists\r\n");
        assert!(s.ensure_folder("Promotional").is_ok());
    }

    #[test]
    fn bare_tagged_line_is_command_failure() {
        let mut s = session("A1 \r\n");
        let err = s.list_new_ids(0).unwrap_err();
        assert!(matches!(err, MailError::CommandFailed { ref status, .. } if status == "A1"));
    }

    #[test]
    fn closed_connection_is_error() {
        let mut s = session("* SEARCH 1\r\n");
        assert!(matches!(s.list_new_ids(0), Err(MailError::Closed)));
    }

    #[test]
    fn tags_do_not_prefix_match() {
        // After nine commands, "A1" must not be mistaken for "A10".
        let mut script = String::new();
        for n in 1..=9 {
            script.push_str(&format!("A{n} OK done\r\n"));
        }
        script.push_str("A1 OK stale\r\n* SEARCH 5\r\nA10 OK SEARCH completed\r\n");
        let mut s = session(&script);
        for _ in 0..9 {
            s.ensure_folder("x").unwrap();
        }
        assert_eq!(s.list_new_ids(0).unwrap(), vec![5]);
    }

    #[test]
    fn literal_marker_parsing() {
        assert_eq!(literal_length("* 1 FETCH (BODY[] {120}\r\n"), Some(120));
        assert_eq!(literal_length("* 1 FETCH (FLAGS ())\r\n"), None);
        assert_eq!(literal_length("* 1 {abc}\r\n"), None);
    }

    #[test]
    fn uidvalidity_parsing() {
        assert_eq!(
            parse_uidvalidity("* STATUS INBOX (UIDVALIDITY 3)").as_deref(),
            Some("3")
        );
        assert_eq!(parse_uidvalidity("* STATUS INBOX (MESSAGES 3)"), None);
    }

    #[test]
    fn quoting_escapes() {
        assert_eq!(quote("INBOX"), "\"INBOX\"");
        assert_eq!(quote("a\\b\"c"), "\"a\\\\b\\\"c\"");
    }
}
