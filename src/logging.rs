//! Logging setup for the `cmisx` binary.

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `warn`, or to
/// `cmis_explorer=debug,info` with `--verbose`. Output goes to stderr so
/// stdout carries only command output.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("cmis_explorer=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
