//! Tracing subscriber setup.

use std::io;

use anyhow::{Context, Result};
use shared::config::client::{Config, LogFormat};
use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, fmt::MakeWriter};

/// Install the global subscriber. Logs go to stderr so command output stays clean.
///
/// Returns the configured level.
pub fn initialize_tracing(config: &Config) -> Result<String> {
    tracing::subscriber::set_global_default(build_subscriber(config, io::stderr))
        .context("failed to install tracing subscriber")?;
    Ok(config.logging.level.clone())
}

fn build_subscriber<W>(config: &Config, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let builder = fmt::fmt()
        .with_env_filter(build_env_filter(config))
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer);

    if matches!(config.logging.format, LogFormat::Json) {
        Box::new(builder.json().with_ansi(false).finish())
    } else {
        Box::new(builder.with_ansi(false).finish())
    }
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };
    use tracing::info;

    #[derive(Clone)]
    struct BufferMakeWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    struct BufferWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl<'a> MakeWriter<'a> for BufferMakeWriter {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            BufferWriter {
                buffer: Arc::clone(&self.buffer),
            }
        }
    }

    impl Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(config: &Config) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = build_subscriber(
            config,
            BufferMakeWriter {
                buffer: buffer.clone(),
            },
        );
        let dispatch = tracing::dispatcher::Dispatch::new(subscriber);

        tracing::dispatcher::with_default(&dispatch, || {
            info!(event = "session_test", "log entry");
        });

        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn json_log_format_produces_json_output() {
        let mut config = Config::with_defaults();
        config.logging.format = LogFormat::Json;

        let contents = capture(&config);
        let line = contents
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap();
        let value: Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["message"], "log entry");
        assert_eq!(value["fields"]["event"], "session_test");
    }

    #[test]
    fn text_log_format_emits_plain_events() {
        let config = Config::with_defaults();

        let contents = capture(&config);
        assert!(contents.contains("log entry"));
        assert!(contents.contains("session_test"));
    }
}
