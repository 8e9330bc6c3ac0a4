/// Entry point for the Creo CRI adapter.
///
/// Detects the node's cgroup v2 setup and reports the capabilities the stats and
/// resource update paths will run with.
///
/// # Errors
///
/// Returns an error if initialization fails (e.g., invalid environment variables
/// or no cgroup v2 mount).
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug CREO_CGROUP_MANAGER=cgroupfs cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    if let Err(err) = creo_cri::run().await {
        log::error!("{err}");
        return Err(err);
    }
    Ok(())
}
