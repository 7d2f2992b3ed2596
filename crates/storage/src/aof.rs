use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use orion_common::ProtocolError;
use orion_protocol::{Command, Value};

use crate::Store;

/// Journal append-only: um array ORSP por comando mutador executado.
///
/// Um único mutex serializa os appends. O conjunto `seen` deduplica pelo
/// byte exato serializado; ele é local ao processo e nunca persiste.
pub struct Aof {
    path: PathBuf,
    inner: Mutex<AofInner>,
}

struct AofInner {
    file: File,
    seen: HashSet<Bytes>,
}

impl Aof {
    /// Abre (ou cria) o journal para append. Falha aqui é fatal no startup.
    pub async fn open(path: impl Into<PathBuf>) -> std::io::Result<Aof> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Aof {
            path,
            inner: Mutex::new(AofInner {
                file,
                seen: HashSet::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Grava um registro com fsync. Bytes já gravados nesta vida do
    /// processo viram no-op.
    pub async fn append(&self, frame: &Value) -> std::io::Result<()> {
        let bytes = frame.to_bytes();
        let mut inner = self.inner.lock().await;
        if inner.seen.contains(&bytes) {
            return Ok(());
        }
        inner.file.write_all(&bytes).await?;
        inner.file.sync_data().await?;
        inner.seen.insert(bytes);
        Ok(())
    }

    /// Substitui o journal pelo script de snapshot: escreve um arquivo
    /// temporário com fsync, e só então, com o mutex em mãos para não
    /// perder appends concorrentes, renomeia por cima e reabre para append.
    pub async fn rewrite(&self, commands: &[Command]) -> std::io::Result<()> {
        let tmp_path = self.path.with_extension("rewrite");
        let mut buf = BytesMut::new();
        for cmd in commands {
            cmd.to_frame().encode(&mut buf);
        }

        let mut tmp = File::create(&tmp_path).await?;
        tmp.write_all(&buf).await?;
        tmp.sync_all().await?;
        drop(tmp);

        let mut inner = self.inner.lock().await;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        inner.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        inner.seen.clear();
        info!("journal reescrito: {} comandos", commands.len());
        Ok(())
    }
}

/// Reaplica o journal no store para reconstruir o estado. Roda uma vez no
/// startup, antes do listener. Arquivo ausente não é erro.
pub async fn replay_aof(path: &Path, store: &Store) -> std::io::Result<usize> {
    if !path.exists() {
        info!("arquivo AOF não encontrado, iniciando sem dados");
        return Ok(0);
    }

    let mut file = File::open(path).await?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).await?;

    let mut cursor = Cursor::new(&data[..]);
    let mut count = 0;

    loop {
        skip_whitespace(&mut cursor, &data);
        let start = cursor.position() as usize;
        if start >= data.len() {
            break;
        }

        match Value::parse(&mut cursor) {
            Ok(frame @ Value::Array(_)) => match Command::from_frame(frame) {
                Ok(cmd) => {
                    apply_command(&cmd, store);
                    count += 1;
                }
                Err(e) => {
                    warn!("AOF: comando inválido ignorado: {e}");
                }
            },
            Ok(other) => {
                warn!("AOF: registro não-array ignorado: {other:?}");
            }
            Err(ProtocolError::Eof) => break,
            Err(ProtocolError::Truncated) => {
                warn!("AOF: frame incompleto no final do arquivo, parando replay");
                break;
            }
            Err(e) => {
                // Ressincroniza varrendo até o próximo '*' (início de array)
                warn!("AOF: frame corrompido, ressincronizando: {e}");
                let from = start + 1;
                match data[from.min(data.len())..].iter().position(|&b| b == b'*') {
                    Some(offset) => cursor.set_position((from + offset) as u64),
                    None => break,
                }
            }
        }
    }

    info!("AOF replay completo: {count} comandos restaurados");
    Ok(count)
}

fn skip_whitespace(cursor: &mut Cursor<&[u8]>, data: &[u8]) {
    let mut pos = cursor.position() as usize;
    while pos < data.len() && data[pos].is_ascii_whitespace() {
        pos += 1;
    }
    cursor.set_position(pos as u64);
}

/// Aplica um comando mutador ao store (replay). Erros individuais são
/// logados e nunca interrompem o replay.
fn apply_command(cmd: &Command, store: &Store) {
    let result: Result<(), orion_common::StorageError> = match cmd {
        Command::Set {
            key,
            value,
            options,
        } => {
            store.set(key, value.clone(), options);
            Ok(())
        }
        Command::SetEx {
            key,
            seconds,
            value,
        } => {
            store.setex(key, *seconds, value.clone());
            Ok(())
        }
        Command::Append { key, value } => store.append(key, value).map(|_| ()),
        Command::GetDel(key) => store.getdel(key).map(|_| ()),
        Command::GetEx { key, seconds } => store.getex(key, *seconds).map(|_| ()),
        Command::GetSet { key, value } => store.getset(key, value.clone()).map(|_| ()),
        Command::Incr(key) => store.incr(key).map(|_| ()),
        Command::IncrBy { key, delta } => store.incr_by(key, *delta).map(|_| ()),
        Command::IncrByFloat { key, delta } => store.incr_by_float(key, *delta).map(|_| ()),
        Command::Decr(key) => store.decr(key).map(|_| ()),
        Command::DecrBy { key, delta } => store.decr_by(key, *delta).map(|_| ()),
        Command::Del(keys) => {
            store.del(keys);
            Ok(())
        }
        Command::FlushAll => {
            store.flushall();
            Ok(())
        }
        Command::SAdd { key, members } => store.sadd(key, members).map(|_| ()),
        Command::SRem { key, members } => store.srem(key, members).map(|_| ()),
        Command::SPop { key, count } => {
            store.spop(key, count.unwrap_or(1).max(0) as usize).map(|_| ())
        }
        Command::SMove {
            source,
            destination,
            member,
        } => store.smove(source, destination, member).map(|_| ()),
        Command::SDiffStore { destination, keys } => {
            store.sdiffstore(destination, keys).map(|_| ())
        }
        Command::SUnionStore { destination, keys } => {
            store.sunionstore(destination, keys).map(|_| ())
        }
        Command::HSet { key, pairs } => store.hset(key, pairs).map(|_| ()),
        Command::HDel { key, fields } => store.hdel(key, fields).map(|_| ()),
        other => {
            debug!("AOF: comando {} ignorado no replay (read-only)", other.name());
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("AOF: erro ao reaplicar {}: {e}", cmd.name());
    }
}
