//! Logging initialization. Grounded on
//! `drift-core::tracing::setup::init_tracing`'s `EnvFilter` + idempotent
//! `Once`-guarded registry, and `network-proxy::logging::init_tracing`'s
//! `fmt().json()` builder, adapted to honour `MemoryConfig`'s
//! `log_level`/`log_format`/`log_file` instead of a fixed filter string.

use std::fs::OpenOptions;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

use memory_core::config::{LogFormat, MemoryConfig};

static INIT: Once = Once::new();

/// Initialize the global `tracing` subscriber from `config`. Idempotent —
/// later calls are no-ops — a process only gets one subscriber; a second
/// `initialize` call on an already-running service must not panic on
/// "set global default twice".
pub fn init_tracing(config: &MemoryConfig) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
        let json = matches!(config.log_format, LogFormat::Json);

        let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

        let result = match (json, config.log_file.as_deref().and_then(open_log_file)) {
            (true, Some(file)) => builder.json().with_writer(move || file.clone()).try_init(),
            (true, None) => builder.json().try_init(),
            (false, Some(file)) => builder.with_writer(move || file.clone()).try_init(),
            (false, None) => builder.try_init(),
        };

        if let Err(e) = result {
            eprintln!("memory-service: tracing subscriber already set: {e}");
        }
    });
}

/// A file handle whose `Write` impl delegates through a clone, so the
/// same open file can serve as the per-event `MakeWriter` output without
/// needing `tracing-appender`'s rolling-file machinery (overkill for a
/// single static `log_file` path).
#[derive(Clone)]
struct SharedFile(std::sync::Arc<std::sync::Mutex<std::fs::File>>);

impl std::io::Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log file mutex poisoned").write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().expect("log file mutex poisoned").flush()
    }
}

fn open_log_file(path: &str) -> Option<SharedFile> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|f| SharedFile(std::sync::Arc::new(std::sync::Mutex::new(f))))
        .map_err(|e| eprintln!("memory-service: failed to open log file {path}: {e}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn open_log_file_creates_parent_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.log");

        let mut file = open_log_file(path.to_str().unwrap()).unwrap();
        file.write_all(b"line one\n").unwrap();
        drop(file);

        let mut contents = String::new();
        std::fs::File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "line one\n");
    }

    #[test]
    fn missing_log_file_path_falls_back_to_none() {
        assert!(open_log_file("/nonexistent/deep/path/service.log").is_none());
    }
}
