use std::io;
use std::sync::Once;
use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub enum OutputType {
    Stdout,
    /// Stdout plus a daily-rolling file under `log_dir`.
    File,
}

#[derive(Debug, Clone)]
pub struct TracingFactoryOptions {
    pub debug: bool,
    pub output_type: OutputType,
    pub log_dir: String,
}

impl Default for TracingFactoryOptions {
    fn default() -> Self {
        TracingFactoryOptions {
            debug: false,
            output_type: OutputType::Stdout,
            log_dir: "/tmp/cdc-avro/logs".to_string(),
        }
    }
}

/// Bootstraps the global `tracing` subscriber exactly once per process.
/// Calling this more than once (e.g. from tests) is a no-op after the first call.
pub fn init_log(opts: TracingFactoryOptions) {
    INIT.call_once(|| {
        let level = if opts.debug { Level::DEBUG } else { Level::INFO };

        let format = tracing_subscriber::fmt::format()
            .with_file(true)
            .with_line_number(false)
            .with_target(false)
            .with_thread_ids(true)
            .compact();

        match opts.output_type {
            OutputType::Stdout => {
                let _ = tracing_subscriber::fmt()
                    .with_max_level(level)
                    .event_format(format)
                    .try_init();
            }
            OutputType::File => {
                let file_appender = rolling::daily(&opts.log_dir, "cdc-avro.log");
                let writer = file_appender.and(io::stdout);

                let _ = tracing_subscriber::fmt()
                    .with_max_level(level)
                    .event_format(format)
                    .with_writer(writer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing::info;

    #[test]
    fn init_is_idempotent() {
        init_log(TracingFactoryOptions::default());
        init_log(TracingFactoryOptions::default());
        info!("tracing_factory test");
    }
}
