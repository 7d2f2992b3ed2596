use bytes::Bytes;
use orion_common::CommandError;

use crate::{Parse, Value};

/// Condição para SET (NX ou XX).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Só seta se a chave não existir.
    Nx,
    /// Só seta se a chave já existir.
    Xx,
}

/// Expiração pedida em SET, preservando a grafia original para o journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Ex(i64),
    Px(i64),
}

impl Expiry {
    /// TTL em segundos; PX arredonda para cima.
    pub fn as_seconds(&self) -> i64 {
        match *self {
            Expiry::Ex(secs) => secs,
            Expiry::Px(ms) => {
                let d = ms / 1000;
                let r = ms % 1000;
                if r > 0 { d + 1 } else { d }
            }
        }
    }
}

/// Opções do comando SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetOptions {
    pub expiry: Option<Expiry>,
    pub condition: Option<SetCondition>,
}

/// Enum com todos os comandos suportados.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Strings
    Get(String),
    Set {
        key: String,
        value: Bytes,
        options: SetOptions,
    },
    Append {
        key: String,
        value: Bytes,
    },
    GetDel(String),
    GetEx {
        key: String,
        seconds: i64,
    },
    GetSet {
        key: String,
        value: Bytes,
    },
    GetRange {
        key: String,
        start: i64,
        end: i64,
    },
    Incr(String),
    IncrBy {
        key: String,
        delta: i64,
    },
    IncrByFloat {
        key: String,
        delta: f64,
    },
    Decr(String),
    DecrBy {
        key: String,
        delta: i64,
    },
    SetEx {
        key: String,
        seconds: i64,
        value: Bytes,
    },
    Ttl(String),
    Exists(Vec<String>),
    Del(Vec<String>),
    Lcs {
        key: String,
        other: String,
    },
    // Sets
    SAdd {
        key: String,
        members: Vec<Bytes>,
    },
    SRem {
        key: String,
        members: Vec<Bytes>,
    },
    SMembers(String),
    SIsMember {
        key: String,
        member: Bytes,
    },
    SCard(String),
    SPop {
        key: String,
        count: Option<i64>,
    },
    SRandMember {
        key: String,
        count: Option<i64>,
    },
    SMove {
        source: String,
        destination: String,
        member: Bytes,
    },
    SDiff(Vec<String>),
    SDiffStore {
        destination: String,
        keys: Vec<String>,
    },
    SUnion(Vec<String>),
    SUnionStore {
        destination: String,
        keys: Vec<String>,
    },
    // Hashes
    HSet {
        key: String,
        pairs: Vec<(String, Bytes)>,
    },
    HGet {
        key: String,
        field: String,
    },
    HDel {
        key: String,
        fields: Vec<String>,
    },
    HExists {
        key: String,
        field: String,
    },
    HLen(String),
    // Admin
    Ping(Option<Bytes>),
    Time,
    DbSize,
    Info,
    FlushAll,
    BgSave,
    BgRewriteAof,
    Unknown(String),
}

fn wrong_arity(name: &str) -> CommandError {
    CommandError::WrongArity(name.into())
}

impl Command {
    /// Faz o parse de um Value (Array de bulk strings) em um Command.
    pub fn from_frame(value: Value) -> Result<Command, CommandError> {
        let mut parse = Parse::new(value)?;
        let cmd_name = parse.command_name()?;

        let cmd = match cmd_name.as_str() {
            "PING" => {
                let msg = if parse.has_remaining() {
                    Some(parse.next_bytes()?)
                } else {
                    None
                };
                parse.finish()?;
                Command::Ping(msg)
            }
            "GET" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("get"));
                }
                Command::Get(parse.next_string()?)
            }
            "SET" => parse_set(&mut parse)?,
            "APPEND" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("append"));
                }
                Command::Append {
                    key: parse.next_string()?,
                    value: parse.next_bytes()?,
                }
            }
            "GETDEL" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("getdel"));
                }
                Command::GetDel(parse.next_string()?)
            }
            "GETEX" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("getex"));
                }
                Command::GetEx {
                    key: parse.next_string()?,
                    seconds: parse.next_int()?,
                }
            }
            "GETSET" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("getset"));
                }
                Command::GetSet {
                    key: parse.next_string()?,
                    value: parse.next_bytes()?,
                }
            }
            "GETRANGE" => {
                if parse.remaining() != 3 {
                    return Err(wrong_arity("getrange"));
                }
                Command::GetRange {
                    key: parse.next_string()?,
                    start: parse.next_int()?,
                    end: parse.next_int()?,
                }
            }
            "INCR" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("incr"));
                }
                Command::Incr(parse.next_string()?)
            }
            "INCRBY" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("incrby"));
                }
                Command::IncrBy {
                    key: parse.next_string()?,
                    delta: parse.next_int()?,
                }
            }
            "INCRBYFLOAT" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("incrbyfloat"));
                }
                Command::IncrByFloat {
                    key: parse.next_string()?,
                    delta: parse.next_float()?,
                }
            }
            "DECR" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("decr"));
                }
                Command::Decr(parse.next_string()?)
            }
            "DECRBY" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("decrby"));
                }
                Command::DecrBy {
                    key: parse.next_string()?,
                    delta: parse.next_int()?,
                }
            }
            "SETEX" => {
                if parse.remaining() != 3 {
                    return Err(wrong_arity("setex"));
                }
                let key = parse.next_string()?;
                let seconds = parse.next_int()?;
                if seconds <= 0 {
                    return Err(CommandError::InvalidArgument(
                        "seconds must be a positive integer".into(),
                    ));
                }
                Command::SetEx {
                    key,
                    seconds,
                    value: parse.next_bytes()?,
                }
            }
            "TTL" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("ttl"));
                }
                Command::Ttl(parse.next_string()?)
            }
            "EXISTS" => Command::Exists(parse_keys(&mut parse, "exists")?),
            "DEL" => Command::Del(parse_keys(&mut parse, "del")?),
            "LCS" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("lcs"));
                }
                Command::Lcs {
                    key: parse.next_string()?,
                    other: parse.next_string()?,
                }
            }
            "SADD" => {
                let (key, members) = parse_key_members(&mut parse, "sadd")?;
                Command::SAdd { key, members }
            }
            "SREM" => {
                let (key, members) = parse_key_members(&mut parse, "srem")?;
                Command::SRem { key, members }
            }
            "SMEMBERS" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("smembers"));
                }
                Command::SMembers(parse.next_string()?)
            }
            "SISMEMBER" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("sismember"));
                }
                Command::SIsMember {
                    key: parse.next_string()?,
                    member: parse.next_bytes()?,
                }
            }
            "SCARD" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("scard"));
                }
                Command::SCard(parse.next_string()?)
            }
            "SPOP" => {
                let (key, count) = parse_key_count(&mut parse, "spop")?;
                Command::SPop { key, count }
            }
            "SRANDMEMBER" => {
                let (key, count) = parse_key_count(&mut parse, "srandmember")?;
                Command::SRandMember { key, count }
            }
            "SMOVE" => {
                if parse.remaining() != 3 {
                    return Err(wrong_arity("smove"));
                }
                Command::SMove {
                    source: parse.next_string()?,
                    destination: parse.next_string()?,
                    member: parse.next_bytes()?,
                }
            }
            "SDIFF" => Command::SDiff(parse_keys(&mut parse, "sdiff")?),
            "SUNION" => Command::SUnion(parse_keys(&mut parse, "sunion")?),
            "SDIFFSTORE" => {
                if parse.remaining() < 2 {
                    return Err(wrong_arity("sdiffstore"));
                }
                Command::SDiffStore {
                    destination: parse.next_string()?,
                    keys: parse_keys(&mut parse, "sdiffstore")?,
                }
            }
            "SUNIONSTORE" => {
                if parse.remaining() < 2 {
                    return Err(wrong_arity("sunionstore"));
                }
                Command::SUnionStore {
                    destination: parse.next_string()?,
                    keys: parse_keys(&mut parse, "sunionstore")?,
                }
            }
            "HSET" => {
                // Arity ímpar ≥ 3: chave seguida de pares campo-valor.
                if parse.remaining() < 3 || parse.remaining() % 2 == 0 {
                    return Err(wrong_arity("hset"));
                }
                let key = parse.next_string()?;
                let mut pairs = Vec::with_capacity(parse.remaining() / 2);
                while parse.has_remaining() {
                    pairs.push((parse.next_string()?, parse.next_bytes()?));
                }
                Command::HSet { key, pairs }
            }
            "HGET" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("hget"));
                }
                Command::HGet {
                    key: parse.next_string()?,
                    field: parse.next_string()?,
                }
            }
            "HDEL" => {
                if parse.remaining() < 2 {
                    return Err(wrong_arity("hdel"));
                }
                let key = parse.next_string()?;
                let mut fields = Vec::with_capacity(parse.remaining());
                while parse.has_remaining() {
                    fields.push(parse.next_string()?);
                }
                Command::HDel { key, fields }
            }
            "HEXISTS" => {
                if parse.remaining() != 2 {
                    return Err(wrong_arity("hexists"));
                }
                Command::HExists {
                    key: parse.next_string()?,
                    field: parse.next_string()?,
                }
            }
            "HLEN" => {
                if parse.remaining() != 1 {
                    return Err(wrong_arity("hlen"));
                }
                Command::HLen(parse.next_string()?)
            }
            "TIME" => zero_arity(&parse, "time", Command::Time)?,
            "DBSIZE" => zero_arity(&parse, "dbsize", Command::DbSize)?,
            "INFO" => zero_arity(&parse, "info", Command::Info)?,
            "FLUSHALL" => zero_arity(&parse, "flushall", Command::FlushAll)?,
            "BGSAVE" => zero_arity(&parse, "bgsave", Command::BgSave)?,
            "BGREWRITEAOF" => zero_arity(&parse, "bgrewriteaof", Command::BgRewriteAof)?,
            _ => Command::Unknown(cmd_name),
        };

        Ok(cmd)
    }

    /// Nome do comando em caixa baixa (mensagens de erro e log).
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get(_) => "get",
            Command::Set { .. } => "set",
            Command::Append { .. } => "append",
            Command::GetDel(_) => "getdel",
            Command::GetEx { .. } => "getex",
            Command::GetSet { .. } => "getset",
            Command::GetRange { .. } => "getrange",
            Command::Incr(_) => "incr",
            Command::IncrBy { .. } => "incrby",
            Command::IncrByFloat { .. } => "incrbyfloat",
            Command::Decr(_) => "decr",
            Command::DecrBy { .. } => "decrby",
            Command::SetEx { .. } => "setex",
            Command::Ttl(_) => "ttl",
            Command::Exists(_) => "exists",
            Command::Del(_) => "del",
            Command::Lcs { .. } => "lcs",
            Command::SAdd { .. } => "sadd",
            Command::SRem { .. } => "srem",
            Command::SMembers(_) => "smembers",
            Command::SIsMember { .. } => "sismember",
            Command::SCard(_) => "scard",
            Command::SPop { .. } => "spop",
            Command::SRandMember { .. } => "srandmember",
            Command::SMove { .. } => "smove",
            Command::SDiff(_) => "sdiff",
            Command::SDiffStore { .. } => "sdiffstore",
            Command::SUnion(_) => "sunion",
            Command::SUnionStore { .. } => "sunionstore",
            Command::HSet { .. } => "hset",
            Command::HGet { .. } => "hget",
            Command::HDel { .. } => "hdel",
            Command::HExists { .. } => "hexists",
            Command::HLen(_) => "hlen",
            Command::Ping(_) => "ping",
            Command::Time => "time",
            Command::DbSize => "dbsize",
            Command::Info => "info",
            Command::FlushAll => "flushall",
            Command::BgSave => "bgsave",
            Command::BgRewriteAof => "bgrewriteaof",
            Command::Unknown(_) => "unknown",
        }
    }

    /// Comandos que mutam o store e portanto entram no journal.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::Append { .. }
                | Command::GetDel(_)
                | Command::GetEx { .. }
                | Command::GetSet { .. }
                | Command::Incr(_)
                | Command::IncrBy { .. }
                | Command::IncrByFloat { .. }
                | Command::Decr(_)
                | Command::DecrBy { .. }
                | Command::SetEx { .. }
                | Command::Del(_)
                | Command::FlushAll
                | Command::SAdd { .. }
                | Command::SRem { .. }
                | Command::SPop { .. }
                | Command::SMove { .. }
                | Command::SDiffStore { .. }
                | Command::SUnionStore { .. }
                | Command::HSet { .. }
                | Command::HDel { .. }
        )
    }

    /// Encoda o comando como array de bulk strings, a forma canônica que o
    /// journal grava e reproduz.
    pub fn to_frame(&self) -> Value {
        let parts: Vec<Value> = match self {
            Command::Ping(None) => vec![Value::bulk("PING")],
            Command::Ping(Some(msg)) => vec![Value::bulk("PING"), Value::Bulk(msg.clone())],
            Command::Get(key) => vec![Value::bulk("GET"), Value::bulk(key)],
            Command::Set {
                key,
                value,
                options,
            } => {
                let mut parts = vec![
                    Value::bulk("SET"),
                    Value::bulk(key),
                    Value::Bulk(value.clone()),
                ];
                match options.expiry {
                    Some(Expiry::Ex(secs)) => {
                        parts.push(Value::bulk("EX"));
                        parts.push(Value::bulk(&secs.to_string()));
                    }
                    Some(Expiry::Px(ms)) => {
                        parts.push(Value::bulk("PX"));
                        parts.push(Value::bulk(&ms.to_string()));
                    }
                    None => {}
                }
                match options.condition {
                    Some(SetCondition::Nx) => parts.push(Value::bulk("NX")),
                    Some(SetCondition::Xx) => parts.push(Value::bulk("XX")),
                    None => {}
                }
                parts
            }
            Command::Append { key, value } => vec![
                Value::bulk("APPEND"),
                Value::bulk(key),
                Value::Bulk(value.clone()),
            ],
            Command::GetDel(key) => vec![Value::bulk("GETDEL"), Value::bulk(key)],
            Command::GetEx { key, seconds } => vec![
                Value::bulk("GETEX"),
                Value::bulk(key),
                Value::bulk(&seconds.to_string()),
            ],
            Command::GetSet { key, value } => vec![
                Value::bulk("GETSET"),
                Value::bulk(key),
                Value::Bulk(value.clone()),
            ],
            Command::GetRange { key, start, end } => vec![
                Value::bulk("GETRANGE"),
                Value::bulk(key),
                Value::bulk(&start.to_string()),
                Value::bulk(&end.to_string()),
            ],
            Command::Incr(key) => vec![Value::bulk("INCR"), Value::bulk(key)],
            Command::IncrBy { key, delta } => vec![
                Value::bulk("INCRBY"),
                Value::bulk(key),
                Value::bulk(&delta.to_string()),
            ],
            Command::IncrByFloat { key, delta } => vec![
                Value::bulk("INCRBYFLOAT"),
                Value::bulk(key),
                Value::bulk(&delta.to_string()),
            ],
            Command::Decr(key) => vec![Value::bulk("DECR"), Value::bulk(key)],
            Command::DecrBy { key, delta } => vec![
                Value::bulk("DECRBY"),
                Value::bulk(key),
                Value::bulk(&delta.to_string()),
            ],
            Command::SetEx {
                key,
                seconds,
                value,
            } => vec![
                Value::bulk("SETEX"),
                Value::bulk(key),
                Value::bulk(&seconds.to_string()),
                Value::Bulk(value.clone()),
            ],
            Command::Ttl(key) => vec![Value::bulk("TTL"), Value::bulk(key)],
            Command::Exists(keys) => keys_frame("EXISTS", keys),
            Command::Del(keys) => keys_frame("DEL", keys),
            Command::Lcs { key, other } => vec![
                Value::bulk("LCS"),
                Value::bulk(key),
                Value::bulk(other),
            ],
            Command::SAdd { key, members } => members_frame("SADD", key, members),
            Command::SRem { key, members } => members_frame("SREM", key, members),
            Command::SMembers(key) => vec![Value::bulk("SMEMBERS"), Value::bulk(key)],
            Command::SIsMember { key, member } => vec![
                Value::bulk("SISMEMBER"),
                Value::bulk(key),
                Value::Bulk(member.clone()),
            ],
            Command::SCard(key) => vec![Value::bulk("SCARD"), Value::bulk(key)],
            Command::SPop { key, count } => count_frame("SPOP", key, *count),
            Command::SRandMember { key, count } => count_frame("SRANDMEMBER", key, *count),
            Command::SMove {
                source,
                destination,
                member,
            } => vec![
                Value::bulk("SMOVE"),
                Value::bulk(source),
                Value::bulk(destination),
                Value::Bulk(member.clone()),
            ],
            Command::SDiff(keys) => keys_frame("SDIFF", keys),
            Command::SUnion(keys) => keys_frame("SUNION", keys),
            Command::SDiffStore { destination, keys } => {
                let mut parts = vec![Value::bulk("SDIFFSTORE"), Value::bulk(destination)];
                parts.extend(keys.iter().map(|k| Value::bulk(k)));
                parts
            }
            Command::SUnionStore { destination, keys } => {
                let mut parts = vec![Value::bulk("SUNIONSTORE"), Value::bulk(destination)];
                parts.extend(keys.iter().map(|k| Value::bulk(k)));
                parts
            }
            Command::HSet { key, pairs } => {
                let mut parts = vec![Value::bulk("HSET"), Value::bulk(key)];
                for (field, value) in pairs {
                    parts.push(Value::bulk(field));
                    parts.push(Value::Bulk(value.clone()));
                }
                parts
            }
            Command::HGet { key, field } => vec![
                Value::bulk("HGET"),
                Value::bulk(key),
                Value::bulk(field),
            ],
            Command::HDel { key, fields } => {
                let mut parts = vec![Value::bulk("HDEL"), Value::bulk(key)];
                parts.extend(fields.iter().map(|f| Value::bulk(f)));
                parts
            }
            Command::HExists { key, field } => vec![
                Value::bulk("HEXISTS"),
                Value::bulk(key),
                Value::bulk(field),
            ],
            Command::HLen(key) => vec![Value::bulk("HLEN"), Value::bulk(key)],
            Command::Time => vec![Value::bulk("TIME")],
            Command::DbSize => vec![Value::bulk("DBSIZE")],
            Command::Info => vec![Value::bulk("INFO")],
            Command::FlushAll => vec![Value::bulk("FLUSHALL")],
            Command::BgSave => vec![Value::bulk("BGSAVE")],
            Command::BgRewriteAof => vec![Value::bulk("BGREWRITEAOF")],
            Command::Unknown(name) => vec![Value::bulk(name)],
        };

        Value::Array(parts)
    }
}

fn keys_frame(name: &str, keys: &[String]) -> Vec<Value> {
    let mut parts = vec![Value::bulk(name)];
    parts.extend(keys.iter().map(|k| Value::bulk(k)));
    parts
}

fn members_frame(name: &str, key: &str, members: &[Bytes]) -> Vec<Value> {
    let mut parts = vec![Value::bulk(name), Value::bulk(key)];
    parts.extend(members.iter().map(|m| Value::Bulk(m.clone())));
    parts
}

fn count_frame(name: &str, key: &str, count: Option<i64>) -> Vec<Value> {
    let mut parts = vec![Value::bulk(name), Value::bulk(key)];
    if let Some(c) = count {
        parts.push(Value::bulk(&c.to_string()));
    }
    parts
}

fn zero_arity(parse: &Parse, name: &str, cmd: Command) -> Result<Command, CommandError> {
    if parse.has_remaining() {
        return Err(wrong_arity(name));
    }
    Ok(cmd)
}

fn parse_keys(parse: &mut Parse, name: &str) -> Result<Vec<String>, CommandError> {
    if !parse.has_remaining() {
        return Err(wrong_arity(name));
    }
    let mut keys = Vec::with_capacity(parse.remaining());
    while parse.has_remaining() {
        keys.push(parse.next_string()?);
    }
    Ok(keys)
}

fn parse_key_members(parse: &mut Parse, name: &str) -> Result<(String, Vec<Bytes>), CommandError> {
    if parse.remaining() < 2 {
        return Err(wrong_arity(name));
    }
    let key = parse.next_string()?;
    let mut members = Vec::with_capacity(parse.remaining());
    while parse.has_remaining() {
        members.push(parse.next_bytes()?);
    }
    Ok((key, members))
}

fn parse_key_count(parse: &mut Parse, name: &str) -> Result<(String, Option<i64>), CommandError> {
    if parse.remaining() < 1 || parse.remaining() > 2 {
        return Err(wrong_arity(name));
    }
    let key = parse.next_string()?;
    let count = if parse.has_remaining() {
        let count = parse.next_int()?;
        if count < 0 {
            return Err(CommandError::InvalidArgument(
                "count must be non-negative".into(),
            ));
        }
        Some(count)
    } else {
        None
    };
    Ok((key, count))
}

fn parse_set(parse: &mut Parse) -> Result<Command, CommandError> {
    if parse.remaining() < 2 {
        return Err(wrong_arity("set"));
    }
    let key = parse.next_string()?;
    let value = parse.next_bytes()?;

    let mut options = SetOptions::default();

    while parse.has_remaining() {
        let opt = parse.next_string()?.to_uppercase();
        match opt.as_str() {
            "EX" => {
                let secs = parse.next_int()?;
                if secs <= 0 {
                    return Err(CommandError::InvalidSetOption("EX must be positive".into()));
                }
                options.expiry = Some(Expiry::Ex(secs));
            }
            "PX" => {
                let ms = parse.next_int()?;
                if ms <= 0 {
                    return Err(CommandError::InvalidSetOption("PX must be positive".into()));
                }
                options.expiry = Some(Expiry::Px(ms));
            }
            "NX" => {
                options.condition = Some(SetCondition::Nx);
            }
            "XX" => {
                options.condition = Some(SetCondition::Xx);
            }
            other => {
                return Err(CommandError::InvalidSetOption(other.to_string()));
            }
        }
    }

    Ok(Command::Set {
        key,
        value,
        options,
    })
}
