use clustermeta::{Transience, cli, config, telemetry};

fn main() {
    let cli = cli::parse_from(std::env::args_os());

    // Logging follows the same config layers as the command itself.
    let dir = cli.file.as_deref().and_then(std::path::Path::parent);
    let logging = config::load_or_default(dir).logging;
    let _telemetry_guard = telemetry::init(telemetry::TelemetryConfig::new(cli.verbose, logging));

    if let Err(e) = cli::run(cli) {
        tracing::error!(transience = ?e.transience(), effect = ?e.effect(), "error: {e}");
        let code = match e.transience() {
            Transience::Retryable => 75,
            _ => 1,
        };
        std::process::exit(code);
    }
}
