use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Inicializa o logging: stdout com EnvFilter mais três arquivos em `logs/`
/// rotacionados por dia (sufixo de data): info.log, error.log e
/// commands.log, este último com um registro por comando executado
/// (eventos com target `commands`).
///
/// Os guards retornados mantêm os writers vivos; segure-os até o fim do
/// processo.
pub fn init_logging(dir: &Path) -> anyhow::Result<Vec<WorkerGuard>> {
    std::fs::create_dir_all(dir)?;

    let (info_writer, info_guard) =
        tracing_appender::non_blocking(rolling::daily(dir, "info.log"));
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(rolling::daily(dir, "error.log"));
    let (cmd_writer, cmd_guard) =
        tracing_appender::non_blocking(rolling::daily(dir, "commands.log"));

    let stdout_layer = fmt::layer().with_filter(
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "orion_server=info,orion_storage=info".into()),
    );
    let info_layer = fmt::layer()
        .with_writer(info_writer)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|meta| {
            *meta.level() <= Level::INFO && meta.target() != "commands"
        }));
    let error_layer = fmt::layer()
        .with_writer(error_writer)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|meta| *meta.level() == Level::ERROR));
    let commands_layer = fmt::layer()
        .with_writer(cmd_writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter::filter_fn(|meta| meta.target() == "commands"));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(info_layer)
        .with(error_layer)
        .with(commands_layer)
        .init();

    Ok(vec![info_guard, error_guard, cmd_guard])
}
