/// Erros de decodificação do protocolo ORSP.
///
/// `Eof` e `Truncated` são recuperáveis (o chamador aguarda mais bytes ou
/// encerra a leitura); qualquer outra variante indica um frame malformado.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("end of input")]
    Eof,
    #[error("incomplete frame")]
    Truncated,
    #[error("unknown type byte: {0:#x}")]
    UnknownTypeByte(u8),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("invalid length: {0}")]
    InvalidLength(i64),
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("frame exceeds maximum size ({0} bytes)")]
    FrameTooLarge(usize),
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("map key must be a simple string")]
    InvalidMapKey,
    #[error("invalid verbatim string format")]
    InvalidVerbatim,
}

impl ProtocolError {
    /// Frame malformado, em oposição a entrada apenas incompleta.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ProtocolError::Eof | ProtocolError::Truncated)
    }
}

/// Erros de armazenamento. As mensagens seguem a convenção Redis porque
/// chegam ao cliente dentro de um frame Error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value for key {0} is not an integer")]
    NotInteger(String),
    #[error("value for key {0} is not a float")]
    NotFloat(String),
    #[error("increment or decrement would overflow")]
    Overflow,
}

/// Erros de parsing/validação de comandos.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("wrong number of arguments for '{0}'")]
    WrongArity(String),
    #[error("invalid option for SET: {0}")]
    InvalidSetOption(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Erros de conexão TCP.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("server shutting down")]
    Shutdown,
}

/// Erro top-level do Orion.
#[derive(Debug, thiserror::Error)]
pub enum OrionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Result type alias.
pub type OrionResult<T> = Result<T, OrionError>;

// Conversão implícita de io::Error → OrionError (via ConnectionError)
impl From<std::io::Error> for OrionError {
    fn from(e: std::io::Error) -> Self {
        OrionError::Connection(ConnectionError::Io(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_classes() {
        assert!(!ProtocolError::Eof.is_malformed());
        assert!(!ProtocolError::Truncated.is_malformed());
        assert!(ProtocolError::UnknownTypeByte(b'?').is_malformed());
        assert!(ProtocolError::InvalidMapKey.is_malformed());
    }

    #[test]
    fn storage_error_display() {
        assert_eq!(
            StorageError::NotInteger("a".into()).to_string(),
            "value for key a is not an integer"
        );
        assert_eq!(
            StorageError::WrongType.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }

    #[test]
    fn command_error_display() {
        assert_eq!(
            CommandError::WrongArity("get".into()).to_string(),
            "wrong number of arguments for 'get'"
        );
        assert_eq!(
            CommandError::Unknown("FOOBAR".into()).to_string(),
            "Unknown command: FOOBAR"
        );
    }

    #[test]
    fn orion_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken");
        let err: OrionError = io_err.into();
        assert!(matches!(err, OrionError::Connection(ConnectionError::Io(_))));
    }
}
