#![forbid(unsafe_code)]

mod error;

pub use error::*;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const MAX_CONNECTIONS: usize = 1024;
pub const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024; // 4 KB
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024; // 64 MB

/// Caminho padrão do journal, relativo ao diretório de trabalho.
pub const DEFAULT_AOF_PATH: &str = "appendonly.orion";
/// Diretório dos arquivos de log rotacionados diariamente.
pub const LOG_DIR: &str = "logs";
