use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use orion_common::{
    DEFAULT_AOF_PATH, DEFAULT_HOST, DEFAULT_HTTP_PORT, DEFAULT_PORT, LOG_DIR, MAX_CONNECTIONS,
};
use orion_server::{Connection, Maintenance, handle_connection, logging};
use orion_storage::{Aof, Store, replay_aof};

#[derive(Parser, Debug)]
#[command(name = "orion-server", about = "Orion — in-memory key-value store")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Porta reservada para o colaborador administrativo HTTP/WebSocket
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    http_port: u16,
    #[arg(long, value_name = "FILE", default_value = DEFAULT_AOF_PATH)]
    aof: PathBuf,
    #[arg(long, default_value_t = MAX_CONNECTIONS)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guards = logging::init_logging(Path::new(LOG_DIR))?;

    let store = Store::new();

    // Replay do journal, antes do listener: respostas são descartadas
    let count = replay_aof(&args.aof, &store).await?;
    if count > 0 {
        info!("{count} comandos restaurados do AOF");
    }
    let aof = Arc::new(Aof::open(&args.aof).await?);
    let maintenance = Arc::new(Maintenance::default());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "Orion escutando em {addr} (porta http reservada: {})",
        args.http_port
    );

    let semaphore = Arc::new(tokio::sync::Semaphore::new(args.max_connections));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => permit?,
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT recebido, encerrando");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM recebido, encerrando");
                break;
            }
        };

        let (socket, peer) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(v) => v,
                    Err(e) => {
                        error!("erro ao aceitar conexão: {e}");
                        continue;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT recebido, encerrando");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM recebido, encerrando");
                break;
            }
        };

        info!("nova conexão: {peer}");
        let store = store.clone();
        let aof = aof.clone();
        let maintenance = maintenance.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let conn = Connection::new(socket);
            if let Err(e) =
                handle_connection(conn, store, aof, maintenance, &mut shutdown_rx).await
            {
                error!("erro na conexão {peer}: {e}");
            }
            info!("conexão encerrada: {peer}");
            drop(permit);
        });
    }

    // Sinaliza o shutdown e espera as conexões em voo por um período de
    // graça limitado
    drop(shutdown_tx);
    let drained = tokio::time::timeout(
        Duration::from_secs(5),
        semaphore.acquire_many(args.max_connections as u32),
    )
    .await;
    if drained.is_err() {
        warn!("período de graça esgotado, saindo com conexões ativas");
    }

    Ok(())
}
