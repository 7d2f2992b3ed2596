use bytes::Bytes;
use orion_common::CommandError;

use crate::Value;

/// Cursor sobre um Value::Array para extrair argumentos sequencialmente.
pub struct Parse {
    parts: Vec<Value>,
    pos: usize,
}

impl Parse {
    /// Cria um Parse a partir de um Value. O valor deve ser Array não vazio.
    pub fn new(value: Value) -> Result<Parse, CommandError> {
        match value {
            Value::Array(parts) if !parts.is_empty() => Ok(Parse { parts, pos: 0 }),
            Value::Array(_) => Err(CommandError::InvalidArgument("empty command array".into())),
            _ => Err(CommandError::InvalidArgument("expected array".into())),
        }
    }

    /// Extrai o nome do comando: o primeiro elemento, obrigatoriamente uma
    /// bulk string, já em caixa alta.
    pub fn command_name(&mut self) -> Result<String, CommandError> {
        match self.next()? {
            Value::Bulk(data) => {
                let name = std::str::from_utf8(&data).map_err(|_| {
                    CommandError::InvalidArgument("command name is not valid UTF-8".into())
                })?;
                Ok(name.to_uppercase())
            }
            _ => Err(CommandError::InvalidArgument(
                "command name must be a bulk string".into(),
            )),
        }
    }

    /// Retorna o próximo elemento como String (de Bulk ou Simple).
    pub fn next_string(&mut self) -> Result<String, CommandError> {
        match self.next()? {
            Value::Simple(s) => Ok(s),
            Value::Bulk(data) => String::from_utf8(data.to_vec())
                .map_err(|_| CommandError::InvalidArgument("invalid UTF-8 string".into())),
            _ => Err(CommandError::InvalidArgument(
                "expected string or bulk".into(),
            )),
        }
    }

    /// Retorna o próximo elemento como Bytes (de Bulk).
    pub fn next_bytes(&mut self) -> Result<Bytes, CommandError> {
        match self.next()? {
            Value::Bulk(data) => Ok(data),
            Value::Simple(s) => Ok(Bytes::from(s)),
            _ => Err(CommandError::InvalidArgument("expected bulk".into())),
        }
    }

    /// Retorna o próximo elemento como i64.
    pub fn next_int(&mut self) -> Result<i64, CommandError> {
        let s = self.next_string()?;
        s.parse::<i64>()
            .map_err(|_| CommandError::InvalidArgument(format!("'{s}' is not an integer")))
    }

    /// Retorna o próximo elemento como f64.
    pub fn next_float(&mut self) -> Result<f64, CommandError> {
        let s = self.next_string()?;
        s.parse::<f64>()
            .map_err(|_| CommandError::InvalidArgument(format!("'{s}' is not a float")))
    }

    /// Verifica se todos os argumentos foram consumidos.
    pub fn finish(&self) -> Result<(), CommandError> {
        if self.pos < self.parts.len() {
            Err(CommandError::InvalidArgument("unexpected extra arguments".into()))
        } else {
            Ok(())
        }
    }

    /// Verifica se ainda há argumentos restantes.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.parts.len()
    }

    /// Retorna o número de argumentos restantes.
    pub fn remaining(&self) -> usize {
        self.parts.len() - self.pos
    }

    fn next(&mut self) -> Result<Value, CommandError> {
        if self.pos >= self.parts.len() {
            return Err(CommandError::InvalidArgument("missing arguments".into()));
        }
        let value = self.parts[self.pos].clone();
        self.pos += 1;
        Ok(value)
    }
}
