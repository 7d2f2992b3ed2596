use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use orion_common::{CommandError, ConnectionError, StorageError};
use orion_protocol::{Command, Value};
use orion_storage::{Aof, Store, save_snapshot, snapshot_filename};

use crate::Connection;

/// Flags dos trabalhos de manutenção; no máximo um de cada por vez.
#[derive(Default)]
pub struct Maintenance {
    bgsave_running: AtomicBool,
    rewrite_running: AtomicBool,
}

/// Loop principal de tratamento de uma conexão.
pub async fn handle_connection(
    mut conn: Connection,
    store: Store,
    aof: Arc<Aof>,
    maintenance: Arc<Maintenance>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    loop {
        let value = tokio::select! {
            result = conn.read_value() => result,
            _ = shutdown.recv() => {
                return Ok(());
            }
        };

        let value = match value {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(()), // EOF
            Err(ConnectionError::Protocol(e)) => {
                conn.write_value(&Value::Error(format!("protocol: {e}")))
                    .await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let cmd = match Command::from_frame(value) {
            Ok(cmd) => cmd,
            Err(e) => {
                conn.write_value(&Value::Error(format!("ERR {e}"))).await?;
                continue;
            }
        };

        debug!("comando recebido: {cmd:?}");
        info!(target: "commands", "{}", cmd.name());

        let response = execute_command(&cmd, &store, &aof, &maintenance);

        // Escrita bem-sucedida entra no journal antes da resposta ao
        // cliente; falha de I/O aqui é logada, nunca exposta.
        if cmd.is_write() && !matches!(response, Value::Error(_)) {
            if let Err(e) = aof.append(&cmd.to_frame()).await {
                error!("falha no append do AOF: {e}");
            }
        }

        conn.write_value(&response).await?;
    }
}

/// Executa um comando contra o store e retorna o valor de resposta.
pub fn execute_command(
    cmd: &Command,
    store: &Store,
    aof: &Arc<Aof>,
    maintenance: &Arc<Maintenance>,
) -> Value {
    match cmd {
        Command::Ping(msg) => match msg {
            Some(m) => Value::Bulk(m.clone()),
            None => Value::Simple("PONG".into()),
        },
        Command::Get(key) => match store.get(key) {
            Ok(Some(value)) => Value::Bulk(value),
            Ok(None) => Value::Null,
            Err(e) => storage_error(e),
        },
        Command::Set {
            key,
            value,
            options,
        } => {
            if store.set(key, value.clone(), options) {
                Value::Simple("OK".into())
            } else {
                Value::Null // condição NX/XX não satisfeita
            }
        }
        Command::Append { key, value } => match store.append(key, value) {
            Ok(len) => Value::Integer(len as i64),
            Err(e) => storage_error(e),
        },
        Command::GetDel(key) => match store.getdel(key) {
            Ok(Some(value)) => Value::Bulk(value),
            Ok(None) => Value::Null,
            Err(e) => storage_error(e),
        },
        Command::GetEx { key, seconds } => match store.getex(key, *seconds) {
            Ok(Some(value)) => Value::Bulk(value),
            Ok(None) => Value::Null,
            Err(e) => storage_error(e),
        },
        Command::GetSet { key, value } => match store.getset(key, value.clone()) {
            Ok(Some(old)) => Value::Bulk(old),
            Ok(None) => Value::Null,
            Err(e) => storage_error(e),
        },
        Command::GetRange { key, start, end } => match store.getrange(key, *start, *end) {
            Ok(slice) => Value::Bulk(slice),
            Err(e) => storage_error(e),
        },
        Command::Incr(key) => integer_reply(store.incr(key)),
        Command::IncrBy { key, delta } => integer_reply(store.incr_by(key, *delta)),
        Command::IncrByFloat { key, delta } => match store.incr_by_float(key, *delta) {
            Ok(formatted) => Value::bulk(&formatted),
            Err(e) => storage_error(e),
        },
        Command::Decr(key) => integer_reply(store.decr(key)),
        Command::DecrBy { key, delta } => integer_reply(store.decr_by(key, *delta)),
        Command::SetEx {
            key,
            seconds,
            value,
        } => {
            store.setex(key, *seconds, value.clone());
            Value::Simple("OK".into())
        }
        Command::Ttl(key) => Value::Integer(store.ttl(key)),
        Command::Exists(keys) => Value::Integer(store.exists(keys) as i64),
        Command::Del(keys) => Value::Integer(store.del(keys) as i64),
        Command::Lcs { key, other } => match store.get(key) {
            Ok(Some(value)) => {
                let lcs = longest_common_subsequence(&value, other.as_bytes());
                Value::Bulk(lcs.into())
            }
            Ok(None) => Value::Null,
            Err(e) => storage_error(e),
        },
        Command::SAdd { key, members } => usize_reply(store.sadd(key, members)),
        Command::SRem { key, members } => usize_reply(store.srem(key, members)),
        Command::SMembers(key) => match store.smembers(key) {
            Ok(members) => bulk_array(members),
            Err(e) => storage_error(e),
        },
        Command::SIsMember { key, member } => match store.sismember(key, member) {
            Ok(found) => Value::Integer(found as i64),
            Err(e) => storage_error(e),
        },
        Command::SCard(key) => usize_reply(store.scard(key)),
        Command::SPop { key, count } => match count {
            None => match store.spop(key, 1) {
                Ok(mut popped) => match popped.pop() {
                    Some(member) => Value::Bulk(member),
                    None => Value::Null,
                },
                Err(e) => storage_error(e),
            },
            Some(n) => match store.spop(key, *n as usize) {
                Ok(popped) => bulk_array(popped),
                Err(e) => storage_error(e),
            },
        },
        Command::SRandMember { key, count } => match count {
            None => match store.srandmember(key, 1) {
                Ok(mut picked) => match picked.pop() {
                    Some(member) => Value::Bulk(member),
                    None => Value::Null,
                },
                Err(e) => storage_error(e),
            },
            Some(n) => match store.srandmember(key, *n as usize) {
                Ok(picked) => bulk_array(picked),
                Err(e) => storage_error(e),
            },
        },
        Command::SMove {
            source,
            destination,
            member,
        } => match store.smove(source, destination, member) {
            Ok(moved) => Value::Integer(moved as i64),
            Err(e) => storage_error(e),
        },
        Command::SDiff(keys) => match store.sdiff(keys) {
            Ok(members) => bulk_array(members),
            Err(e) => storage_error(e),
        },
        Command::SDiffStore { destination, keys } => {
            usize_reply(store.sdiffstore(destination, keys))
        }
        Command::SUnion(keys) => match store.sunion(keys) {
            Ok(members) => bulk_array(members),
            Err(e) => storage_error(e),
        },
        Command::SUnionStore { destination, keys } => {
            usize_reply(store.sunionstore(destination, keys))
        }
        Command::HSet { key, pairs } => usize_reply(store.hset(key, pairs)),
        Command::HGet { key, field } => match store.hget(key, field) {
            Ok(Some(value)) => Value::Bulk(value),
            Ok(None) => Value::Null,
            Err(e) => storage_error(e),
        },
        Command::HDel { key, fields } => usize_reply(store.hdel(key, fields)),
        Command::HExists { key, field } => match store.hexists(key, field) {
            Ok(found) => Value::Integer(found as i64),
            Err(e) => storage_error(e),
        },
        Command::HLen(key) => usize_reply(store.hlen(key)),
        Command::Time => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            Value::Array(vec![
                Value::Integer(now.as_secs() as i64),
                Value::Integer(now.subsec_micros() as i64),
            ])
        }
        Command::DbSize => Value::Integer(store.dbsize() as i64),
        Command::Info => {
            let info = store.info();
            Value::Array(
                info.split('\n')
                    .filter(|line| !line.trim().is_empty())
                    .map(Value::bulk)
                    .collect(),
            )
        }
        Command::FlushAll => {
            store.flushall();
            Value::Simple("OK".into())
        }
        Command::BgSave => {
            if maintenance.bgsave_running.swap(true, Ordering::SeqCst) {
                return Value::Error("BGSAVE already in progress".into());
            }
            let store = store.clone();
            let maintenance = maintenance.clone();
            tokio::spawn(async move {
                let unix = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                let path = PathBuf::from(snapshot_filename(unix));
                if let Err(e) = save_snapshot(&path, &store.snapshot_commands()).await {
                    error!("erro no BGSAVE: {e}");
                }
                maintenance.bgsave_running.store(false, Ordering::SeqCst);
            });
            Value::Simple("Background saving started".into())
        }
        Command::BgRewriteAof => {
            if maintenance.rewrite_running.swap(true, Ordering::SeqCst) {
                return Value::Error("BGREWRITEAOF already in progress".into());
            }
            let store = store.clone();
            let aof = aof.clone();
            let maintenance = maintenance.clone();
            tokio::spawn(async move {
                if let Err(e) = aof.rewrite(&store.snapshot_commands()).await {
                    error!("erro no BGREWRITEAOF: {e}");
                }
                maintenance.rewrite_running.store(false, Ordering::SeqCst);
            });
            Value::Simple("Background AOF rewrite started".into())
        }
        // Sem prefixo ERR: a mensagem é o Display de CommandError::Unknown
        Command::Unknown(name) => Value::Error(CommandError::Unknown(name.clone()).to_string()),
    }
}

fn storage_error(e: StorageError) -> Value {
    match e {
        // WRONGTYPE já carrega o prefixo da convenção Redis
        StorageError::WrongType => Value::Error(e.to_string()),
        other => Value::Error(format!("ERR {other}")),
    }
}

fn integer_reply(result: Result<i64, StorageError>) -> Value {
    match result {
        Ok(n) => Value::Integer(n),
        Err(e) => storage_error(e),
    }
}

fn usize_reply(result: Result<usize, StorageError>) -> Value {
    match result {
        Ok(n) => Value::Integer(n as i64),
        Err(e) => storage_error(e),
    }
}

fn bulk_array(items: Vec<bytes::Bytes>) -> Value {
    Value::Array(items.into_iter().map(Value::Bulk).collect())
}

/// LCS byte a byte por programação dinâmica, reconstruído de trás pra
/// frente.
fn longest_common_subsequence(a: &[u8], b: &[u8]) -> Vec<u8> {
    let (m, n) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; n + 1]; m + 1];

    for i in 1..=m {
        for j in 1..=n {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }

    let mut lcs = Vec::with_capacity(dp[m][n]);
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            lcs.push(a[i - 1]);
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] > dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    lcs.reverse();
    lcs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcs_basic() {
        assert_eq!(longest_common_subsequence(b"ohmytext", b"mynewtext"), b"mytext");
        assert_eq!(longest_common_subsequence(b"abc", b"xyz"), b"");
        assert_eq!(longest_common_subsequence(b"", b"abc"), b"");
        assert_eq!(longest_common_subsequence(b"abc", b"abc"), b"abc");
    }
}
