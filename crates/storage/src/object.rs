use bytes::Bytes;
use std::collections::{HashMap, HashSet};

/// Tipo do valor armazenado. Cada chave habita exatamente um tipo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    String(Bytes),
    Set(HashSet<Bytes>),
    Hash(HashMap<String, Bytes>),
}

impl Object {
    /// Nome do tipo, como exposto às views administrativas.
    pub fn kind(&self) -> &'static str {
        match self {
            Object::String(_) => "string",
            Object::Set(_) => "set",
            Object::Hash(_) => "hash",
        }
    }

    /// Bytes aproximados ocupados pelo payload (relatório INFO).
    pub fn approximate_size(&self) -> usize {
        match self {
            Object::String(data) => data.len(),
            Object::Set(members) => members.iter().map(|m| m.len()).sum(),
            Object::Hash(fields) => fields.iter().map(|(f, v)| f.len() + v.len()).sum(),
        }
    }
}
