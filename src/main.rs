use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use stayawake::{
    cli::Args,
    console::Console,
    platform::GenericActivityDriver,
    service::KeepAliveService,
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{LOG_PREFIX, enable_logging},
        runtime::single_thread_runtime,
    },
};

fn main() -> Result<()> {
    let args = Args::parse();
    single_thread_runtime()?.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    println!("=== Stay-Awake Utility ===");
    println!();

    setup_logging();

    let resolved = args.resolve();
    for complaint in &resolved.complaints {
        println!("{complaint}");
    }

    let driver = GenericActivityDriver::new()?;
    let service = Arc::new(KeepAliveService::new(
        Box::new(driver),
        Arc::new(DefaultClock),
    ));
    let console = Console::new(service.clone());

    service.start(resolved.method, resolved.interval).await;
    console.start();

    tokio::select! {
        _ = console.wait_for_exit() => {
            service.stop().await;
            console.stop().await;
            println!("Program terminated.");
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Shutting down gracefully...");
            console.stop().await;
            service.stop().await;
            // Nothing left to save, skip unwinding the runtime.
            std::process::exit(0);
        }
    }
    Ok(())
}

/// Diagnostics go to a rolling file in the state directory. A failure to set
/// that up is reported but never blocks the actual service.
fn setup_logging() {
    let result =
        create_application_default_path().and_then(|dir| enable_logging(LOG_PREFIX, &dir));
    if let Err(e) = result {
        eprintln!("Could not enable file logging: {e:?}");
    }
}
