use std::path::Path;

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use orion_protocol::Command;

/// Nome do arquivo de dump produzido pelo BGSAVE.
pub fn snapshot_filename(unix_secs: u64) -> String {
    format!("dump_{unix_secs}.orion")
}

/// Grava o script de snapshot (arrays ORSP) em um arquivo de dump.
/// O formato é o mesmo do journal, então um dump também é reaplicável.
pub async fn save_snapshot(path: &Path, commands: &[Command]) -> std::io::Result<()> {
    let mut buf = BytesMut::new();
    for cmd in commands {
        cmd.to_frame().encode(&mut buf);
    }

    let mut file = File::create(path).await?;
    file.write_all(&buf).await?;
    file.sync_all().await?;
    info!("snapshot gravado: {:?} ({} comandos)", path, commands.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Store, replay_aof};
    use bytes::Bytes;
    use orion_protocol::{SetOptions, Value};
    use tempfile::tempdir;

    #[tokio::test]
    async fn snapshot_file_is_replayable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(snapshot_filename(1_722_470_400));

        let store = Store::new();
        store.set("k", Bytes::from("v"), &SetOptions::default());
        store.sadd("s", &[Bytes::from("m")]).unwrap();

        save_snapshot(&path, &store.snapshot_commands()).await.unwrap();

        let restored = Store::new();
        let count = replay_aof(&path, &restored).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(restored.get("k").unwrap(), Some(Bytes::from("v")));
        assert!(restored.sismember("s", b"m").unwrap());
    }

    #[tokio::test]
    async fn empty_snapshot_writes_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump_0.orion");
        save_snapshot(&path, &[]).await.unwrap();
        let data = tokio::fs::read(&path).await.unwrap();
        assert!(data.is_empty());

        // e decodificar o vazio é Eof limpo
        let mut cursor = std::io::Cursor::new(&data[..]);
        assert!(matches!(
            Value::parse(&mut cursor),
            Err(orion_common::ProtocolError::Eof)
        ));
    }
}
