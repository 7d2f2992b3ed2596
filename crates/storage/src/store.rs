use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::RwLock;
use rand::seq::IteratorRandom;
use tokio::time::{Duration, interval};
use tracing::debug;

use orion_common::StorageError;
use orion_protocol::{Command, SetCondition, SetOptions};

use crate::object::Object;

/// Estado guardado por um único readers-writer lock: leituras seguram o
/// lock compartilhado pelo corpo inteiro, escritas o exclusivo. Nenhum
/// await acontece com o lock em mãos.
struct StoreInner {
    data: HashMap<String, Object>,
    /// Contadores de segundos restantes; entrada existe só enquanto a chave
    /// correspondente vive em `data`.
    ttls: HashMap<String, i64>,
}

/// Handle para o keyspace in-memory.
#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
    started_at: Instant,
}

impl Store {
    pub fn new() -> Self {
        let store = Store {
            inner: Arc::new(RwLock::new(StoreInner {
                data: HashMap::new(),
                ttls: HashMap::new(),
            })),
            started_at: Instant::now(),
        };

        // Expirador de fundo: um tick por segundo
        let inner = store.inner.clone();
        tokio::spawn(async move {
            expire_keys(inner).await;
        });

        store
    }

    // --- Strings ---

    pub fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        let inner = self.inner.read();
        match inner.data.get(key) {
            Some(Object::String(data)) => Ok(Some(data.clone())),
            Some(_) => Err(StorageError::WrongType),
            None => Ok(None),
        }
    }

    /// Retorna false quando a condição NX/XX não é satisfeita. Um SET sem
    /// expiração não mexe em TTL já existente.
    pub fn set(&self, key: &str, value: Bytes, options: &SetOptions) -> bool {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(cond) = options.condition {
            let exists = inner.data.contains_key(key);
            match cond {
                SetCondition::Nx if exists => return false,
                SetCondition::Xx if !exists => return false,
                _ => {}
            }
        }

        inner.data.insert(key.to_string(), Object::String(value));
        if let Some(expiry) = options.expiry {
            inner.ttls.insert(key.to_string(), expiry.as_seconds());
        }
        true
    }

    /// Concatena ao valor existente (ou cria a chave); retorna o novo tamanho.
    pub fn append(&self, key: &str, value: &[u8]) -> Result<usize, StorageError> {
        let mut guard = self.inner.write();
        match guard.data.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Object::String(Bytes::copy_from_slice(value)));
                Ok(value.len())
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Object::String(data) => {
                    let mut joined = data.to_vec();
                    joined.extend_from_slice(value);
                    let len = joined.len();
                    *data = Bytes::from(joined);
                    Ok(len)
                }
                _ => Err(StorageError::WrongType),
            },
        }
    }

    pub fn getdel(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        match inner.data.get(key) {
            Some(Object::String(_)) => {}
            Some(_) => return Err(StorageError::WrongType),
            None => return Ok(None),
        }
        inner.ttls.remove(key);
        match inner.data.remove(key) {
            Some(Object::String(data)) => Ok(Some(data)),
            _ => Ok(None),
        }
    }

    /// Lê o valor e instala um TTL novo quando `seconds > 0`.
    pub fn getex(&self, key: &str, seconds: i64) -> Result<Option<Bytes>, StorageError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        match inner.data.get(key) {
            Some(Object::String(data)) => {
                let data = data.clone();
                if seconds > 0 {
                    inner.ttls.insert(key.to_string(), seconds);
                }
                Ok(Some(data))
            }
            Some(_) => Err(StorageError::WrongType),
            None => Ok(None),
        }
    }

    /// Troca o valor e devolve o antigo.
    pub fn getset(&self, key: &str, value: Bytes) -> Result<Option<Bytes>, StorageError> {
        let mut guard = self.inner.write();
        match guard.data.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Object::String(value));
                Ok(None)
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Object::String(data) => {
                    let old = std::mem::replace(data, value);
                    Ok(Some(old))
                }
                _ => Err(StorageError::WrongType),
            },
        }
    }

    /// Substring por índices inclusivos; negativos contam a partir do fim.
    /// Intervalo invertido ou chave ausente devolvem vazio.
    pub fn getrange(&self, key: &str, start: i64, end: i64) -> Result<Bytes, StorageError> {
        let inner = self.inner.read();
        let data = match inner.data.get(key) {
            Some(Object::String(data)) => data,
            Some(_) => return Err(StorageError::WrongType),
            None => return Ok(Bytes::new()),
        };

        let len = data.len() as i64;
        let mut start = if start < 0 { len + start } else { start };
        let mut end = if end < 0 { len + end } else { end };
        if start < 0 {
            start = 0;
        }
        if end > len - 1 {
            end = len - 1;
        }
        if len == 0 || start > end || start >= len || end < 0 {
            return Ok(Bytes::new());
        }
        Ok(data.slice(start as usize..end as usize + 1))
    }

    pub fn incr(&self, key: &str) -> Result<i64, StorageError> {
        self.incr_by(key, 1)
    }

    pub fn decr(&self, key: &str) -> Result<i64, StorageError> {
        self.incr_by(key, -1)
    }

    pub fn decr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        self.incr_by(key, delta.checked_neg().ok_or(StorageError::Overflow)?)
    }

    /// Chave ausente parte de zero; valor não numérico é erro, nunca é
    /// sobrescrito.
    pub fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let mut guard = self.inner.write();
        match guard.data.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Object::String(Bytes::from(delta.to_string())));
                Ok(delta)
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Object::String(data) => {
                    let current = std::str::from_utf8(data)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| StorageError::NotInteger(key.to_string()))?;
                    let updated = current.checked_add(delta).ok_or(StorageError::Overflow)?;
                    *data = Bytes::from(updated.to_string());
                    Ok(updated)
                }
                _ => Err(StorageError::WrongType),
            },
        }
    }

    /// Retorna o novo valor já formatado (representação mais curta).
    pub fn incr_by_float(&self, key: &str, delta: f64) -> Result<String, StorageError> {
        let mut guard = self.inner.write();
        match guard.data.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let formatted = delta.to_string();
                slot.insert(Object::String(Bytes::from(formatted.clone())));
                Ok(formatted)
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Object::String(data) => {
                    let current = std::str::from_utf8(data)
                        .ok()
                        .and_then(|s| s.parse::<f64>().ok())
                        .ok_or_else(|| StorageError::NotFloat(key.to_string()))?;
                    let formatted = (current + delta).to_string();
                    *data = Bytes::from(formatted.clone());
                    Ok(formatted)
                }
                _ => Err(StorageError::WrongType),
            },
        }
    }

    pub fn setex(&self, key: &str, seconds: i64, value: Bytes) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.data.insert(key.to_string(), Object::String(value));
        inner.ttls.insert(key.to_string(), seconds);
    }

    /// -2 se a chave não existe, -1 se existe sem TTL, senão o contador.
    pub fn ttl(&self, key: &str) -> i64 {
        let inner = self.inner.read();
        if !inner.data.contains_key(key) {
            return -2;
        }
        inner.ttls.get(key).copied().unwrap_or(-1)
    }

    pub fn exists(&self, keys: &[String]) -> usize {
        let inner = self.inner.read();
        keys.iter().filter(|k| inner.data.contains_key(*k)).count()
    }

    pub fn del(&self, keys: &[String]) -> usize {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let mut count = 0;
        for key in keys {
            if inner.data.remove(key).is_some() {
                inner.ttls.remove(key);
                count += 1;
            }
        }
        count
    }

    // --- Sets ---

    /// Retorna quantos membros entraram de fato no conjunto.
    pub fn sadd(&self, key: &str, members: &[Bytes]) -> Result<usize, StorageError> {
        let mut guard = self.inner.write();
        match guard.data.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let set: HashSet<Bytes> = members.iter().cloned().collect();
                let added = set.len();
                slot.insert(Object::Set(set));
                Ok(added)
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Object::Set(set) => {
                    let mut added = 0;
                    for member in members {
                        if set.insert(member.clone()) {
                            added += 1;
                        }
                    }
                    Ok(added)
                }
                _ => Err(StorageError::WrongType),
            },
        }
    }

    pub fn srem(&self, key: &str, members: &[Bytes]) -> Result<usize, StorageError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let Some(obj) = inner.data.get_mut(key) else {
            return Ok(0);
        };
        let Object::Set(set) = obj else {
            return Err(StorageError::WrongType);
        };
        let mut removed = 0;
        for member in members {
            if set.remove(member) {
                removed += 1;
            }
        }
        // Conjunto esvaziado sai do keyspace
        if set.is_empty() {
            inner.data.remove(key);
            inner.ttls.remove(key);
        }
        Ok(removed)
    }

    pub fn smembers(&self, key: &str) -> Result<Vec<Bytes>, StorageError> {
        let inner = self.inner.read();
        match set_ref(&inner, key)? {
            Some(set) => Ok(set.iter().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn sismember(&self, key: &str, member: &[u8]) -> Result<bool, StorageError> {
        let inner = self.inner.read();
        Ok(set_ref(&inner, key)?.is_some_and(|set| set.contains(member)))
    }

    pub fn scard(&self, key: &str) -> Result<usize, StorageError> {
        let inner = self.inner.read();
        Ok(set_ref(&inner, key)?.map_or(0, HashSet::len))
    }

    /// Remove e devolve até `count` membros aleatórios.
    pub fn spop(&self, key: &str, count: usize) -> Result<Vec<Bytes>, StorageError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let Some(obj) = inner.data.get_mut(key) else {
            return Ok(Vec::new());
        };
        let Object::Set(set) = obj else {
            return Err(StorageError::WrongType);
        };

        let mut rng = rand::thread_rng();
        let picked: Vec<Bytes> = set.iter().cloned().choose_multiple(&mut rng, count);
        for member in &picked {
            set.remove(member);
        }
        if set.is_empty() {
            inner.data.remove(key);
            inner.ttls.remove(key);
        }
        Ok(picked)
    }

    /// Como spop, mas sem remover.
    pub fn srandmember(&self, key: &str, count: usize) -> Result<Vec<Bytes>, StorageError> {
        let inner = self.inner.read();
        let Some(set) = set_ref(&inner, key)? else {
            return Ok(Vec::new());
        };
        let mut rng = rand::thread_rng();
        Ok(set.iter().cloned().choose_multiple(&mut rng, count))
    }

    pub fn smove(&self, source: &str, destination: &str, member: &[u8]) -> Result<bool, StorageError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        // Valida o destino antes de mexer na origem
        match inner.data.get(destination) {
            None | Some(Object::Set(_)) => {}
            Some(_) => return Err(StorageError::WrongType),
        }

        let removed = match inner.data.get_mut(source) {
            None => false,
            Some(Object::Set(set)) => set.remove(member),
            Some(_) => return Err(StorageError::WrongType),
        };
        if !removed {
            return Ok(false);
        }

        let source_empty =
            matches!(inner.data.get(source), Some(Object::Set(set)) if set.is_empty());
        if source_empty {
            inner.data.remove(source);
            inner.ttls.remove(source);
        }

        let member = Bytes::copy_from_slice(member);
        match inner.data.entry(destination.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Object::Set(HashSet::from([member])));
            }
            Entry::Occupied(mut slot) => {
                if let Object::Set(set) = slot.get_mut() {
                    set.insert(member);
                }
            }
        }
        Ok(true)
    }

    pub fn sdiff(&self, keys: &[String]) -> Result<Vec<Bytes>, StorageError> {
        let inner = self.inner.read();
        Ok(diff_of(&inner, keys)?.into_iter().collect())
    }

    pub fn sunion(&self, keys: &[String]) -> Result<Vec<Bytes>, StorageError> {
        let inner = self.inner.read();
        Ok(union_of(&inner, keys)?.into_iter().collect())
    }

    /// Guarda a diferença em `destination`; resultado vazio apaga o destino.
    pub fn sdiffstore(&self, destination: &str, keys: &[String]) -> Result<usize, StorageError> {
        let mut guard = self.inner.write();
        let result = diff_of(&guard, keys)?;
        Ok(store_set_result(&mut guard, destination, result))
    }

    pub fn sunionstore(&self, destination: &str, keys: &[String]) -> Result<usize, StorageError> {
        let mut guard = self.inner.write();
        let result = union_of(&guard, keys)?;
        Ok(store_set_result(&mut guard, destination, result))
    }

    // --- Hashes ---

    /// Retorna o número de campos criados (não o de atualizados).
    pub fn hset(&self, key: &str, pairs: &[(String, Bytes)]) -> Result<usize, StorageError> {
        let mut guard = self.inner.write();
        match guard.data.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let fields: HashMap<String, Bytes> = pairs.iter().cloned().collect();
                let created = fields.len();
                slot.insert(Object::Hash(fields));
                Ok(created)
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Object::Hash(fields) => {
                    let mut created = 0;
                    for (field, value) in pairs {
                        if fields.insert(field.clone(), value.clone()).is_none() {
                            created += 1;
                        }
                    }
                    Ok(created)
                }
                _ => Err(StorageError::WrongType),
            },
        }
    }

    pub fn hget(&self, key: &str, field: &str) -> Result<Option<Bytes>, StorageError> {
        let inner = self.inner.read();
        Ok(hash_ref(&inner, key)?.and_then(|fields| fields.get(field).cloned()))
    }

    pub fn hdel(&self, key: &str, fields: &[String]) -> Result<usize, StorageError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let Some(obj) = inner.data.get_mut(key) else {
            return Ok(0);
        };
        let Object::Hash(map) = obj else {
            return Err(StorageError::WrongType);
        };
        let mut deleted = 0;
        for field in fields {
            if map.remove(field).is_some() {
                deleted += 1;
            }
        }
        if map.is_empty() {
            inner.data.remove(key);
            inner.ttls.remove(key);
        }
        Ok(deleted)
    }

    pub fn hexists(&self, key: &str, field: &str) -> Result<bool, StorageError> {
        let inner = self.inner.read();
        Ok(hash_ref(&inner, key)?.is_some_and(|fields| fields.contains_key(field)))
    }

    pub fn hlen(&self, key: &str) -> Result<usize, StorageError> {
        let inner = self.inner.read();
        Ok(hash_ref(&inner, key)?.map_or(0, HashMap::len))
    }

    /// Todos os campos de um hash; view usada pela superfície administrativa.
    pub fn hgetall(&self, key: &str) -> Result<Vec<(String, Bytes)>, StorageError> {
        let inner = self.inner.read();
        match hash_ref(&inner, key)? {
            Some(fields) => Ok(fields.iter().map(|(f, v)| (f.clone(), v.clone())).collect()),
            None => Ok(Vec::new()),
        }
    }

    // --- Admin / views ---

    /// Chaves distintas somadas nos três keyspaces.
    pub fn dbsize(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn flushall(&self) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.data.clear();
        inner.ttls.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().data.keys().cloned().collect()
    }

    pub fn key_type(&self, key: &str) -> Option<&'static str> {
        self.inner.read().data.get(key).map(Object::kind)
    }

    /// Relatório multi-seção no formato do INFO.
    pub fn info(&self) -> String {
        let inner = self.inner.read();
        let uptime = self.started_at.elapsed().as_secs();
        let used_memory: usize = inner
            .data
            .iter()
            .map(|(key, obj)| key.len() + obj.approximate_size())
            .sum::<usize>()
            + inner.ttls.len() * (std::mem::size_of::<String>() + std::mem::size_of::<i64>());

        format!(
            "# Server\nuptime_in_seconds:{uptime}\nuptime_in_days:{days}\n\n\
             # Memory\nused_memory:{used_memory}\n\n\
             # Keyspace\ndb0:keys={keys}",
            days = uptime / 86_400,
            keys = inner.data.len(),
        )
    }

    /// Script mínimo que reconstrói o estado atual: um comando por entidade
    /// viva, com SETEX para chaves com TTL. Nunca emite FLUSHALL.
    pub fn snapshot_commands(&self) -> Vec<Command> {
        let inner = self.inner.read();
        let mut commands = Vec::with_capacity(inner.data.len());
        for (key, obj) in &inner.data {
            let cmd = match obj {
                Object::String(data) => match inner.ttls.get(key) {
                    Some(&seconds) if seconds > 0 => Command::SetEx {
                        key: key.clone(),
                        seconds,
                        value: data.clone(),
                    },
                    _ => Command::Set {
                        key: key.clone(),
                        value: data.clone(),
                        options: SetOptions::default(),
                    },
                },
                Object::Set(members) => Command::SAdd {
                    key: key.clone(),
                    members: members.iter().cloned().collect(),
                },
                Object::Hash(fields) => Command::HSet {
                    key: key.clone(),
                    pairs: fields.iter().map(|(f, v)| (f.clone(), v.clone())).collect(),
                },
            };
            commands.push(cmd);
        }
        commands
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn set_ref<'a>(
    inner: &'a StoreInner,
    key: &str,
) -> Result<Option<&'a HashSet<Bytes>>, StorageError> {
    match inner.data.get(key) {
        Some(Object::Set(set)) => Ok(Some(set)),
        Some(_) => Err(StorageError::WrongType),
        None => Ok(None),
    }
}

fn hash_ref<'a>(
    inner: &'a StoreInner,
    key: &str,
) -> Result<Option<&'a HashMap<String, Bytes>>, StorageError> {
    match inner.data.get(key) {
        Some(Object::Hash(fields)) => Ok(Some(fields)),
        Some(_) => Err(StorageError::WrongType),
        None => Ok(None),
    }
}

/// Primeiro conjunto menos os demais; chaves ausentes contam como vazias.
fn diff_of(inner: &StoreInner, keys: &[String]) -> Result<HashSet<Bytes>, StorageError> {
    let Some((first, rest)) = keys.split_first() else {
        return Ok(HashSet::new());
    };
    let mut result = set_ref(inner, first)?.cloned().unwrap_or_default();
    for key in rest {
        if let Some(set) = set_ref(inner, key)? {
            for member in set {
                result.remove(member);
            }
        }
    }
    Ok(result)
}

fn union_of(inner: &StoreInner, keys: &[String]) -> Result<HashSet<Bytes>, StorageError> {
    let mut result = HashSet::new();
    for key in keys {
        if let Some(set) = set_ref(inner, key)? {
            result.extend(set.iter().cloned());
        }
    }
    Ok(result)
}

/// Substitui o destino pelo resultado; vazio remove a chave.
fn store_set_result(inner: &mut StoreInner, destination: &str, result: HashSet<Bytes>) -> usize {
    if result.is_empty() {
        inner.data.remove(destination);
        inner.ttls.remove(destination);
        return 0;
    }
    let len = result.len();
    inner.data.insert(destination.to_string(), Object::Set(result));
    len
}

/// Task de fundo: a cada segundo decrementa todos os contadores e apaga as
/// chaves cujo contador chegou a zero ou abaixo.
async fn expire_keys(inner: Arc<RwLock<StoreInner>>) {
    let mut tick = interval(Duration::from_secs(1));
    tick.tick().await; // o primeiro tick resolve imediatamente

    loop {
        tick.tick().await;
        let mut guard = inner.write();
        let inner = &mut *guard;

        let mut expired = Vec::new();
        for (key, ttl) in inner.ttls.iter_mut() {
            *ttl -= 1;
            if *ttl <= 0 {
                expired.push(key.clone());
            }
        }
        for key in &expired {
            inner.ttls.remove(key);
            inner.data.remove(key);
            debug!("chave expirada removida: {key}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_protocol::Expiry;

    fn plain_set(store: &Store, key: &str, value: &str) {
        assert!(store.set(key, Bytes::copy_from_slice(value.as_bytes()), &SetOptions::default()));
    }

    #[tokio::test]
    async fn set_get_exists() {
        let store = Store::new();
        plain_set(&store, "foo", "bar");
        assert_eq!(store.get("foo").unwrap(), Some(Bytes::from("bar")));
        assert_eq!(store.exists(&["foo".into()]), 1);
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[tokio::test]
    async fn set_del_get_null() {
        let store = Store::new();
        plain_set(&store, "k", "v");
        assert_eq!(store.del(&["k".into()]), 1);
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.exists(&["k".into()]), 0);
    }

    #[tokio::test]
    async fn set_nx_xx_conditions() {
        let store = Store::new();
        let nx = SetOptions {
            condition: Some(SetCondition::Nx),
            ..Default::default()
        };
        let xx = SetOptions {
            condition: Some(SetCondition::Xx),
            ..Default::default()
        };

        assert!(!store.set("k", Bytes::from("v"), &xx)); // ausente, XX falha
        assert!(store.set("k", Bytes::from("v1"), &nx));
        assert!(!store.set("k", Bytes::from("v2"), &nx)); // presente, NX falha
        assert_eq!(store.get("k").unwrap(), Some(Bytes::from("v1")));
        assert!(store.set("k", Bytes::from("v3"), &xx));
        assert_eq!(store.get("k").unwrap(), Some(Bytes::from("v3")));
    }

    #[tokio::test]
    async fn append_empty_creates_key() {
        let store = Store::new();
        assert_eq!(store.append("k", b"").unwrap(), 0);
        assert_eq!(store.get("k").unwrap(), Some(Bytes::new()));
        assert_eq!(store.append("k", b"abc").unwrap(), 3);
        assert_eq!(store.append("k", b"").unwrap(), 3);
        assert_eq!(store.get("k").unwrap(), Some(Bytes::from("abc")));
    }

    #[tokio::test]
    async fn incr_laws() {
        let store = Store::new();
        assert_eq!(store.incr("c").unwrap(), 1);
        assert_eq!(store.incr_by("c", 0).unwrap(), 1);
        assert_eq!(store.incr_by("c", 14).unwrap(), 15);
        assert_eq!(store.decr("c").unwrap(), 14);
        assert_eq!(store.decr_by("c", 4).unwrap(), 10);
    }

    #[tokio::test]
    async fn incr_rejects_non_integer() {
        let store = Store::new();
        plain_set(&store, "k", "not-a-number");
        assert_eq!(
            store.incr("k").unwrap_err(),
            StorageError::NotInteger("k".into())
        );
        // valor original preservado
        assert_eq!(store.get("k").unwrap(), Some(Bytes::from("not-a-number")));
    }

    #[tokio::test]
    async fn incr_overflow_is_error() {
        let store = Store::new();
        plain_set(&store, "k", &i64::MAX.to_string());
        assert_eq!(store.incr("k").unwrap_err(), StorageError::Overflow);
    }

    #[tokio::test]
    async fn incr_by_float_formats_shortest() {
        let store = Store::new();
        plain_set(&store, "a", "10");
        assert_eq!(store.incr_by("a", 5).unwrap(), 15);
        assert_eq!(store.incr_by_float("a", 0.5).unwrap(), "15.5");
        assert_eq!(
            store.incr("a").unwrap_err(),
            StorageError::NotInteger("a".into())
        );
    }

    #[tokio::test]
    async fn getset_getdel() {
        let store = Store::new();
        assert_eq!(store.getset("k", Bytes::from("v1")).unwrap(), None);
        assert_eq!(
            store.getset("k", Bytes::from("v2")).unwrap(),
            Some(Bytes::from("v1"))
        );
        assert_eq!(store.getdel("k").unwrap(), Some(Bytes::from("v2")));
        assert_eq!(store.getdel("k").unwrap(), None);
        assert_eq!(store.exists(&["k".into()]), 0);
    }

    #[tokio::test]
    async fn getrange_indices() {
        let store = Store::new();
        plain_set(&store, "k", "Hello World");
        assert_eq!(store.getrange("k", 0, 4).unwrap(), Bytes::from("Hello"));
        assert_eq!(store.getrange("k", -5, -1).unwrap(), Bytes::from("World"));
        assert_eq!(store.getrange("k", 0, -1).unwrap(), Bytes::from("Hello World"));
        assert_eq!(store.getrange("k", 0, 100).unwrap(), Bytes::from("Hello World"));
        assert_eq!(store.getrange("k", 4, 2).unwrap(), Bytes::new());
        assert_eq!(store.getrange("missing", 0, -1).unwrap(), Bytes::new());
    }

    #[tokio::test]
    async fn ttl_reporting() {
        let store = Store::new();
        assert_eq!(store.ttl("missing"), -2);
        plain_set(&store, "k", "v");
        assert_eq!(store.ttl("k"), -1);
        store.setex("t", 30, Bytes::from("v"));
        let ttl = store.ttl("t");
        assert!((0..=30).contains(&ttl), "ttl fora do intervalo: {ttl}");
    }

    #[tokio::test]
    async fn expirer_removes_key() {
        let store = Store::new();
        store.setex("gone", 1, Bytes::from("v"));
        assert_eq!(store.get("gone").unwrap(), Some(Bytes::from("v")));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(store.get("gone").unwrap(), None);
        assert_eq!(store.ttl("gone"), -2);
    }

    #[tokio::test]
    async fn set_with_expiry_option() {
        let store = Store::new();
        let opts = SetOptions {
            expiry: Some(Expiry::Px(1_500)),
            condition: None,
        };
        assert!(store.set("k", Bytes::from("v"), &opts));
        // PX 1500 arredonda para 2 segundos
        assert_eq!(store.ttl("k"), 2);
    }

    #[tokio::test]
    async fn sadd_scard_sismember() {
        let store = Store::new();
        let added = store
            .sadd("s", &[Bytes::from("a"), Bytes::from("b"), Bytes::from("a")])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.scard("s").unwrap(), 2);
        assert!(store.sismember("s", b"a").unwrap());
        assert!(!store.sismember("s", b"c").unwrap());
        assert_eq!(store.sadd("s", &[Bytes::from("a")]).unwrap(), 0);
    }

    #[tokio::test]
    async fn srem_removes_empty_set() {
        let store = Store::new();
        store.sadd("s", &[Bytes::from("a"), Bytes::from("b")]).unwrap();
        assert_eq!(
            store.srem("s", &[Bytes::from("a"), Bytes::from("x")]).unwrap(),
            1
        );
        assert_eq!(store.srem("s", &[Bytes::from("b")]).unwrap(), 1);
        assert_eq!(store.exists(&["s".into()]), 0);
        assert_eq!(store.dbsize(), 0);
    }

    #[tokio::test]
    async fn spop_drains_set() {
        let store = Store::new();
        store
            .sadd("s", &[Bytes::from("x"), Bytes::from("y"), Bytes::from("z")])
            .unwrap();
        let first = store.spop("s", 1).unwrap();
        assert_eq!(first.len(), 1);
        let rest = store.spop("s", 10).unwrap();
        assert_eq!(rest.len(), 2);
        assert!(!rest.contains(&first[0]));
        // conjunto esvaziado sai do keyspace
        assert_eq!(store.exists(&["s".into()]), 0);
        assert_eq!(store.spop("s", 1).unwrap(), Vec::<Bytes>::new());
    }

    #[tokio::test]
    async fn srandmember_does_not_remove() {
        let store = Store::new();
        store.sadd("s", &[Bytes::from("a"), Bytes::from("b")]).unwrap();
        let picked = store.srandmember("s", 5).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(store.scard("s").unwrap(), 2);
    }

    #[tokio::test]
    async fn smove_between_sets() {
        let store = Store::new();
        store.sadd("src", &[Bytes::from("m")]).unwrap();
        store.sadd("dst", &[Bytes::from("other")]).unwrap();

        assert!(store.smove("src", "dst", b"m").unwrap());
        assert!(!store.smove("src", "dst", b"m").unwrap());
        assert!(store.sismember("dst", b"m").unwrap());
        // origem esvaziada foi removida
        assert_eq!(store.exists(&["src".into()]), 0);
    }

    #[tokio::test]
    async fn smove_creates_destination() {
        let store = Store::new();
        store.sadd("src", &[Bytes::from("a"), Bytes::from("b")]).unwrap();
        assert!(store.smove("src", "new", b"a").unwrap());
        assert_eq!(store.smembers("new").unwrap(), vec![Bytes::from("a")]);
    }

    #[tokio::test]
    async fn sdiff_sunion() {
        let store = Store::new();
        store
            .sadd("a", &[Bytes::from("1"), Bytes::from("2"), Bytes::from("3")])
            .unwrap();
        store.sadd("b", &[Bytes::from("2"), Bytes::from("4")]).unwrap();

        let mut diff = store.sdiff(&["a".into(), "b".into()]).unwrap();
        diff.sort();
        assert_eq!(diff, vec![Bytes::from("1"), Bytes::from("3")]);

        let mut union = store.sunion(&["a".into(), "b".into(), "absent".into()]).unwrap();
        union.sort();
        assert_eq!(
            union,
            vec![Bytes::from("1"), Bytes::from("2"), Bytes::from("3"), Bytes::from("4")]
        );
    }

    #[tokio::test]
    async fn sdiffstore_replaces_destination() {
        let store = Store::new();
        store.sadd("a", &[Bytes::from("1"), Bytes::from("2")]).unwrap();
        store.sadd("b", &[Bytes::from("2")]).unwrap();
        plain_set(&store, "ignored", "x");

        assert_eq!(store.sdiffstore("dst", &["a".into(), "b".into()]).unwrap(), 1);
        assert_eq!(store.smembers("dst").unwrap(), vec![Bytes::from("1")]);

        // resultado vazio apaga o destino
        assert_eq!(store.sdiffstore("dst", &["b".into(), "b".into()]).unwrap(), 0);
        assert_eq!(store.exists(&["dst".into()]), 0);
    }

    #[tokio::test]
    async fn sunionstore_counts() {
        let store = Store::new();
        store.sadd("a", &[Bytes::from("1")]).unwrap();
        store.sadd("b", &[Bytes::from("1"), Bytes::from("2")]).unwrap();
        assert_eq!(
            store.sunionstore("dst", &["a".into(), "b".into()]).unwrap(),
            2
        );
        assert_eq!(store.scard("dst").unwrap(), 2);
    }

    #[tokio::test]
    async fn hset_hget_hdel_laws() {
        let store = Store::new();
        let created = store
            .hset(
                "h",
                &[
                    ("f1".into(), Bytes::from("v1")),
                    ("f2".into(), Bytes::from("v2")),
                ],
            )
            .unwrap();
        assert_eq!(created, 2);
        assert_eq!(store.hlen("h").unwrap(), 2);
        assert_eq!(store.hget("h", "f1").unwrap(), Some(Bytes::from("v1")));

        // atualização não conta como criação
        assert_eq!(
            store.hset("h", &[("f1".into(), Bytes::from("v9"))]).unwrap(),
            0
        );

        assert_eq!(store.hdel("h", &["f1".into(), "fx".into()]).unwrap(), 1);
        assert!(!store.hexists("h", "f1").unwrap());
        assert!(store.hexists("h", "f2").unwrap());

        // hash esvaziado sai do keyspace
        assert_eq!(store.hdel("h", &["f2".into()]).unwrap(), 1);
        assert_eq!(store.exists(&["h".into()]), 0);
    }

    #[tokio::test]
    async fn hgetall_view() {
        let store = Store::new();
        store
            .hset("h", &[("f".into(), Bytes::from("v"))])
            .unwrap();
        assert_eq!(
            store.hgetall("h").unwrap(),
            vec![("f".to_string(), Bytes::from("v"))]
        );
        assert_eq!(store.hgetall("none").unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn wrong_type_surfaces() {
        let store = Store::new();
        plain_set(&store, "str", "v");
        store.sadd("set", &[Bytes::from("m")]).unwrap();
        store.hset("hash", &[("f".into(), Bytes::from("v"))]).unwrap();

        assert_eq!(store.get("set").unwrap_err(), StorageError::WrongType);
        assert_eq!(store.incr("set").unwrap_err(), StorageError::WrongType);
        assert_eq!(
            store.sadd("str", &[Bytes::from("m")]).unwrap_err(),
            StorageError::WrongType
        );
        assert_eq!(store.smembers("hash").unwrap_err(), StorageError::WrongType);
        assert_eq!(store.hlen("set").unwrap_err(), StorageError::WrongType);
        assert_eq!(
            store.hset("str", &[("f".into(), Bytes::from("v"))]).unwrap_err(),
            StorageError::WrongType
        );
    }

    #[tokio::test]
    async fn one_key_one_kind() {
        let store = Store::new();
        store.sadd("k", &[Bytes::from("m")]).unwrap();
        // SET sobrescreve qualquer tipo; a chave muda de keyspace
        plain_set(&store, "k", "v");
        assert_eq!(store.key_type("k"), Some("string"));
        assert_eq!(store.dbsize(), 1);
    }

    #[tokio::test]
    async fn flushall_empties_everything() {
        let store = Store::new();
        plain_set(&store, "a", "1");
        store.sadd("s", &[Bytes::from("m")]).unwrap();
        store.hset("h", &[("f".into(), Bytes::from("v"))]).unwrap();
        store.setex("t", 100, Bytes::from("v"));
        assert_eq!(store.dbsize(), 4);

        store.flushall();
        assert_eq!(store.dbsize(), 0);
        assert_eq!(store.exists(&["a".into(), "s".into(), "h".into(), "t".into()]), 0);
        assert_eq!(store.ttl("t"), -2);
    }

    #[tokio::test]
    async fn dbsize_counts_all_kinds() {
        let store = Store::new();
        plain_set(&store, "a", "1");
        store.sadd("s", &[Bytes::from("m")]).unwrap();
        store.hset("h", &[("f".into(), Bytes::from("v"))]).unwrap();
        assert_eq!(store.dbsize(), 3);
    }

    #[tokio::test]
    async fn info_sections() {
        let store = Store::new();
        plain_set(&store, "a", "1");
        let info = store.info();
        assert!(info.contains("# Server"));
        assert!(info.contains("uptime_in_seconds:"));
        assert!(info.contains("# Memory"));
        assert!(info.contains("used_memory:"));
        assert!(info.contains("db0:keys=1"));
    }

    #[tokio::test]
    async fn snapshot_reconstructs_state() {
        let store = Store::new();
        plain_set(&store, "str", "v");
        store.setex("ttl", 60, Bytes::from("t"));
        store.sadd("set", &[Bytes::from("a"), Bytes::from("b")]).unwrap();
        store.hset("hash", &[("f".into(), Bytes::from("v"))]).unwrap();

        let commands = store.snapshot_commands();
        assert_eq!(commands.len(), 4);
        assert!(!commands.iter().any(|c| matches!(c, Command::FlushAll)));
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::SetEx { key, seconds, .. } if key == "ttl" && *seconds > 0
        )));

        let restored = Store::new();
        for cmd in &commands {
            match cmd {
                Command::Set { key, value, options } => {
                    restored.set(key, value.clone(), options);
                }
                Command::SetEx { key, seconds, value } => {
                    restored.setex(key, *seconds, value.clone());
                }
                Command::SAdd { key, members } => {
                    restored.sadd(key, members).unwrap();
                }
                Command::HSet { key, pairs } => {
                    restored.hset(key, pairs).unwrap();
                }
                other => panic!("snapshot emitiu comando inesperado: {other:?}"),
            }
        }
        assert_eq!(restored.dbsize(), 4);
        assert_eq!(restored.get("str").unwrap(), Some(Bytes::from("v")));
        assert_eq!(restored.scard("set").unwrap(), 2);
        assert_eq!(restored.hget("hash", "f").unwrap(), Some(Bytes::from("v")));
        assert!(restored.ttl("ttl") > 0);
    }

    #[tokio::test]
    async fn key_views_for_admin_surface() {
        let store = Store::new();
        plain_set(&store, "a", "1");
        store.sadd("s", &[Bytes::from("m")]).unwrap();

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "s".to_string()]);
        assert_eq!(store.key_type("a"), Some("string"));
        assert_eq!(store.key_type("s"), Some("set"));
        assert_eq!(store.key_type("missing"), None);
    }
}
