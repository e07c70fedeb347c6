use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use dnsdash::logging::setup_logging;
use dnsdash::models::dto::DashboardView;
use dnsdash::{feed, render, server, Args, Config, DashboardSession, SnapshotReducer, TracingReporter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = Config::from_args(&args)?;
    info!(
        action = "start",
        component = "main",
        mode = ?config.feed_mode,
        base_url = %config.base_url,
        window_capacity = config.window_capacity,
        threshold = config.suspicious_threshold,
        "Starting dashboard"
    );

    let feed = feed::build(&config)?;
    let reducer = SnapshotReducer::new(config.suspicious_threshold);
    let (session, updates) = DashboardSession::new(feed, Arc::new(TracingReporter), config.window_capacity);

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    if let Some(addr) = config.serve_addr {
        let updates = updates.clone();
        tokio::spawn(async move {
            if let Err(e) = server::serve(addr, updates, reducer).await {
                error!(action = "serve", component = "server", error = %e, "Dashboard server stopped");
            }
        });
    }

    if !args.quiet {
        let mut updates = updates.clone();
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let view = DashboardView::build(&updates.borrow_and_update(), &reducer);
                println!("{}", render::render(&view));
            }
        });
    }

    let final_state = session
        .run(async move {
            stop_rx.recv().await;
        })
        .await;

    info!(
        action = "stop",
        component = "main",
        samples = final_state.window().len(),
        "Dashboard stopped"
    );
    Ok(())
}
