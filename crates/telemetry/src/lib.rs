//! Tracing subscriber bootstrap shared by the server and the CLI.

use preorder_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

/// Install the global subscriber, logging to stdout.
///
/// `RUST_LOG` wins over the configured filter. Calling this twice is harmless;
/// the second install is reported and ignored.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    install(settings, BoxMakeWriter::new(std::io::stdout))
}

/// Same as [`init`] but logs to stderr, leaving stdout to command output.
pub fn init_stderr(settings: &TelemetrySettings) -> anyhow::Result<()> {
    install(settings, BoxMakeWriter::new(std::io::stderr))
}

fn install(settings: &TelemetrySettings, writer: BoxMakeWriter) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(writer))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true).with_writer(writer))
            .try_init(),
    };

    match installed {
        Ok(()) => tracing::info!(
            target: "preorder-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        ),
        Err(err) => tracing::debug!(
            target: "preorder-telemetry",
            error = %err,
            "subscriber already installed"
        ),
    }

    Ok(())
}
