use bytes::BytesMut;
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use orion_common::{ConnectionError, INITIAL_BUFFER_CAPACITY, ProtocolError};
use orion_protocol::Value;

/// Wrapper sobre TcpStream com buffer para leitura/escrita de valores ORSP.
///
/// A decodificação anda frame a frame, então pipelining cai de graça: o que
/// chegar além do frame corrente fica no buffer para a próxima leitura.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Lê um valor completo do stream. Retorna None no EOF limpo.
    ///
    /// Bytes malformados viram `ConnectionError::Protocol` com o buffer
    /// descartado; a conexão continua utilizável para o próximo request.
    pub async fn read_value(&mut self) -> Result<Option<Value>, ConnectionError> {
        loop {
            match self.parse_value() {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) => {
                    self.buffer.clear();
                    return Err(ConnectionError::Protocol(e));
                }
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ConnectionError::ConnectionReset);
            }
        }
    }

    /// Escreve um valor no stream.
    pub async fn write_value(&mut self, value: &Value) -> Result<(), ConnectionError> {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    fn parse_value(&mut self) -> Result<Option<Value>, ProtocolError> {
        let mut cursor = Cursor::new(&self.buffer[..]);

        match Value::check(&mut cursor) {
            Ok(()) => {
                let len = cursor.position() as usize;
                cursor.set_position(0);
                let value = Value::parse(&mut cursor)?;
                self.buffer = self.buffer.split_off(len);
                Ok(Some(value))
            }
            // Eof/Truncated: só faltam bytes, aguarda o próximo read
            Err(ProtocolError::Eof | ProtocolError::Truncated) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
