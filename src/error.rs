//! Closed error taxonomy for the measurement engine.
//!
//! Every asynchronous operation in the engine resolves with a `Result<T, Error>`.
//! Construction never panics; propagation always goes through the single
//! completion of whatever `Future` produced the error — there is no exception
//! path to thread through FFI boundaries the way a C++ callback-based
//! engine would need.

use std::fmt;

/// The closed set of error kinds the engine can report.
///
/// `thiserror` derives `Display` per-variant; each variant here stays a unit
/// case (no per-variant payload) because the payload — cause and context —
/// lives uniformly on the enclosing [`Error`] envelope: a kind, an optional
/// underlying-cause error, and an optional context object, rather than one
/// message format per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Kind {
    #[error("generic error")]
    GenericError,
    #[error("mocked error")]
    MockedError,
    #[error("operation timed out")]
    TimeoutError,
    #[error("end of file")]
    EofError,
    #[error("network error")]
    NetworkError,
    #[error("socket error")]
    SocketError,
    #[error("DNS resolution failed")]
    DnsGenericError,
    #[error("unsupported DNS class")]
    UnsupportedClass,
    #[error("all connect attempts failed")]
    ConnectFailedError,
    #[error("JSON parse error")]
    JsonParseError,
    #[error("missing expected JSON key")]
    JsonKeyError,
    #[error("JSON value out of domain")]
    JsonDomainError,
    #[error("message exceeds 65535 bytes")]
    MessageTooLongError,
    #[error("reading message type/length failed")]
    ReadingMessageTypeLengthError,
    #[error("reading message payload failed")]
    ReadingMessagePayloadError,
    #[error("value error")]
    ValueError,
    #[error("TLS error")]
    SslError,
    #[error("peer presented no certificate")]
    SslNoCertificateError,
    #[error("invalid peer certificate")]
    SslInvalidCertificateError,
    #[error("certificate does not match requested hostname")]
    SslInvalidHostnameError,
    #[error("CA bundle path missing or unreadable")]
    MissingCaBundlePathError,
    #[error("unexpected SOCKS5 version")]
    BadSocksVersionError,
    #[error("no acceptable SOCKS5 authentication method")]
    NoAvailableSocksAuthenticationError,
    #[error("SOCKS5 target address too long")]
    SocksAddressTooLongError,
    #[error("SOCKS5 target port out of range")]
    SocksInvalidPortError,
    #[error("SOCKS5 reserved field nonzero")]
    BadSocksReservedFieldError,
    #[error("unrecognised SOCKS5 address type")]
    BadSocksAtypeValueError,
    #[error("SOCKS5 protocol error")]
    SocksError,
    #[error("line exceeds maximum length")]
    LineTooLongError,
    #[error("no line terminator found yet")]
    EolNotFoundError,
    // Phase-wrapper kinds, one per NDT protocol-runner phase.
    #[error("connecting to NDT server failed")]
    ConnectingError,
    #[error("writing extended login message failed")]
    WritingLoginError,
    #[error("reading kickoff message failed")]
    ReadingKickoffMessageError,
    #[error("kickoff message did not match the expected literal")]
    InvalidKickoffMessageError,
    #[error("reading wait-in-queue message failed")]
    ReadingWaitInQueueError,
    #[error("server reported a nonzero queue wait time")]
    UnhandledSrvQueueMessageError,
    #[error("reading server version failed")]
    ReadingVersionError,
    #[error("reading granted test IDs failed")]
    ReadingTestsIdError,
    #[error("server granted a test ID the client did not request")]
    UnknownTestIdError,
    #[error("running a sub-test failed")]
    RunningTestError,
    #[error("reading results/logout failed")]
    ReadingResultsOrLogoutError,
    #[error("expected MSG_RESULTS or MSG_LOGOUT")]
    NotResultsOrLogoutError,
    #[error("server sent data after MSG_LOGOUT")]
    DataAfterLogoutError,
    #[error("disconnect failed")]
    DisconnectError,
}

/// A tagged error value: a [`Kind`], an optional boxed cause, and an optional
/// free-form context string (e.g. the connect-attempts trace, a SOCKS detail).
#[derive(Debug)]
pub struct Error {
    kind: Kind,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    context: Option<String>,
}

impl Error {
    pub fn new(kind: Kind) -> Self {
        Self { kind, cause: None, context: None }
    }

    pub fn with_cause(
        kind: Kind,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { kind, cause: Some(Box::new(cause)), context: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Wrap `self` as the cause of a phase-specific error: each NDT phase
    /// wraps its lower-level error in a phase-specific kind that carries the
    /// original error as context.
    pub fn wrap(self, phase_kind: Kind) -> Error {
        Error {
            kind: phase_kind,
            context: Some(format!("{}: {}", self.kind, self)),
            cause: self.cause,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({ctx})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;
        let kind = match e.kind() {
            IoKind::TimedOut => Kind::TimeoutError,
            IoKind::UnexpectedEof => Kind::EofError,
            _ => Kind::SocketError,
        };
        Error::with_cause(kind, e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
