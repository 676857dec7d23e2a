use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init(verbosity: u8) {
    let default = match verbosity {
        0 => "testmirror=info",
        1 => "testmirror=debug",
        _ => "testmirror=trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
