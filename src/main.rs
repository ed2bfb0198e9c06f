use registry_sweeper::cli::{Args, Runner};
use registry_sweeper::logging::init_tracing;
use std::process;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    init_tracing(args.verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let runner = Runner::new(args);
    if let Err(e) = runner.run(&cancel).await {
        runner.output().error(&e.to_string());
        process::exit(1);
    }
}
