use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

fn report_init_error(e: impl std::fmt::Display) {
    // A subscriber already installed (tests, embedding hosts) is not an error.
    let msg = e.to_string();
    if !msg.contains("already been set") {
        eprintln!("lex-backend: failed to initialize tracing: {msg}");
    }
}

pub fn init_tracing(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = fmt::layer().with_target(true).with_thread_ids(false);

    let registry = Registry::default().with(env_filter).with(stdout_layer);

    if !config.enable_file_logs {
        if let Err(e) = registry.try_init() {
            report_init_error(e);
        }
        return;
    }

    let file_appender = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("lex-backend")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&config.log_dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!(
                "lex-backend: cannot write logs to {}: {e}; logging to stdout only",
                config.log_dir
            );
            if let Err(e) = registry.try_init() {
                report_init_error(e);
            }
            return;
        }
    };
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();
    if let Err(e) = registry.with(file_layer).try_init() {
        report_init_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let cfg = LogConfig::default();
        init_tracing(&cfg);
        init_tracing(&cfg);
    }

    #[test]
    fn file_logging_into_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        init_tracing(&LogConfig {
            log_level: "debug".to_string(),
            enable_file_logs: true,
            log_dir: dir.path().to_string_lossy().into_owned(),
        });
    }
}
