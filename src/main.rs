use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use log::{info, warn, LevelFilter};

use sweepscan::capture::CaptureLoop;
use sweepscan::config::{Cli, Config};
use sweepscan::radio::{Radio, SimulatedRadio};
use sweepscan::sink::{SharedSink, Sink};
use sweepscan::worker::{new_registry, run_worker};
use sweepscan::queue::CaptureQueue;

fn main() {
    if let Err(err) = run() {
        eprintln!("sweepscan: {err}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    pretty_env_logger::formatted_builder().filter_level(filter).init();

    let config = cli.into_config()?;
    let plan = config.plan(0)?;
    let started_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());
    info!(
        "sweep starting at {started_at}: {} frequencies, fft_len={}, bin_width={:.1}",
        plan.freqs.len(),
        config.fft_len,
        config.bin_width
    );

    let sink = match &config.out_path {
        Some(path) => Sink::open_file(path)?,
        None => Sink::stdout(),
    };
    let sink = Arc::new(SharedSink::new(sink));

    let queue = Arc::new(CaptureQueue::new());
    let registry = new_registry();
    let keep_running = Arc::new(AtomicBool::new(true));

    static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);
    {
        let keep_running = keep_running.clone();
        ctrlc::set_handler(move || {
            if SHUTDOWN_REQUESTED.swap(true, Ordering::Relaxed) {
                warn!("second interrupt received, exiting immediately");
                process::exit(1);
            }
            info!("gracefully shutting down...");
            keep_running.store(false, Ordering::Relaxed);
        })?;
    }

    let radio: Box<dyn Radio> = Box::new(SimulatedRadio::new());
    let mut capture_loop = CaptureLoop::new(&config, &plan, radio, queue.clone(), keep_running.clone())?;

    thread::scope(|scope| {
        let worker_handles: Vec<_> = (0..config.num_threads)
            .map(|_| {
                let config = &config;
                let plan = &plan;
                let queue = queue.clone();
                let registry = registry.clone();
                let sink = sink.clone();
                let keep_running = keep_running.clone();
                scope.spawn(move || run_worker(config, plan, queue, registry, sink, keep_running))
            })
            .collect();

        if let Err(err) = capture_loop.run() {
            warn!("capture loop exited with error: {err}");
        }

        info!("waiting for {} queued buffers to drain...", queue.len());
        while !queue.is_empty() {
            thread::sleep(std::time::Duration::from_millis(1));
        }
        keep_running.store(false, Ordering::Relaxed);

        for handle in worker_handles {
            let _ = handle.join();
        }
    });

    info!("shutdown complete");
    Ok(())
}
