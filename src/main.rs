use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;

use framebot_core::buttons::ButtonClassifier;
use framebot_core::coordinator::{CoordinatorConfig, SessionCoordinator};
use framebot_core::executor::{ActionExecutor, ExecutorConfig};
use framebot_core::frames::FrameDb;
use framebot_core::geometry::{run_refresh_loop, CacheConfig, GeometryCache};
use framebot_core::logger;
use framebot_core::monitor::EmergencyStopMonitor;
use framebot_core::platform::{create_platform, Platform};
use framebot_core::settings::Settings;
use framebot_core::types::UiEvent;

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    logger::init(&cwd.join("logs"));

    let settings = Settings::load(&cwd.join("settings.json"));
    let platform: Arc<dyn Platform> = Arc::from(create_platform(force_stub));

    let db = match FrameDb::load(&settings.frame_db) {
        Ok(db) => db,
        Err(err) => {
            logger::warn(&format!(
                "frame database {} not usable ({}); starting without frames",
                settings.frame_db.display(),
                err
            ));
            FrameDb::empty()
        }
    };

    let cache = Arc::new(GeometryCache::new(
        Arc::clone(&platform),
        CacheConfig::from_settings(&settings),
    ));
    let cache_stop = Arc::new(AtomicBool::new(false));
    let cache_thread = {
        let cache = Arc::clone(&cache);
        let stop = Arc::clone(&cache_stop);
        thread::Builder::new()
            .name("geometry-cache".into())
            .spawn(move || run_refresh_loop(cache, stop))?
    };

    let executor = Arc::new(ActionExecutor::new(
        Arc::clone(&platform),
        ButtonClassifier::new(Arc::clone(&platform)),
        ExecutorConfig::from_settings(&settings),
    ));
    let coordinator = Arc::new(SessionCoordinator::new(
        Arc::clone(&executor),
        CoordinatorConfig::from_settings(&settings),
    ));
    coordinator.set_ui_callback(Arc::new(|event| match event {
        UiEvent::FailsafeStop { frame_id, reason } => {
            logger::warn(&format!("frame {} hit the failsafe: {}", frame_id, reason));
        }
        UiEvent::Completion { frame_id } => {
            logger::info(&format!("frame {} finished", frame_id));
        }
    }));

    let monitor = EmergencyStopMonitor::new(Arc::clone(&platform), Arc::clone(&coordinator));
    monitor.start();

    logger::info("framebot started");
    println!("framebot ready; type 'help' for commands");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("start"), Some(id)) => {
                let Some(geo) = cache.geometry() else {
                    println!("target window not found yet");
                    continue;
                };
                match db.resolve(id, &geo) {
                    Ok(frame) => {
                        if coordinator.start_automation(frame) {
                            println!("started {}", id);
                        } else {
                            println!("no routine for {}", id);
                        }
                    }
                    Err(err) => println!("cannot resolve {}: {}", id, err),
                }
            }
            (Some("stop"), Some(id)) => {
                if coordinator.stop_automation(id) {
                    println!("stopped {}", id);
                } else {
                    println!("no active session for {}", id);
                }
            }
            (Some("stop-all"), None) => {
                coordinator.stop_all();
                println!("all sessions stopped");
            }
            (Some("status"), None) => print_status(&cache, &coordinator),
            (Some("help"), _) => print_help(),
            (Some("quit" | "exit"), _) => break,
            (None, _) => {}
            _ => println!("unrecognized command; type 'help'"),
        }
    }

    monitor.stop();
    coordinator.stop_all();
    cache_stop.store(true, Ordering::Release);
    let _ = cache_thread.join();
    logger::info("framebot stopped");
    Ok(())
}

fn print_status(cache: &GeometryCache, coordinator: &SessionCoordinator) {
    match cache.geometry() {
        Some(geo) => println!(
            "window \"{}\": frame {}x{} at ({}, {}), pixel size {}",
            geo.title, geo.frame.w, geo.frame.h, geo.frame.x, geo.frame.y, geo.pixel_size
        ),
        None => println!("target window not found"),
    }
    let status = coordinator.status();
    if status.frames.is_empty() {
        println!("no sessions");
        return;
    }
    for frame in status.frames {
        println!(
            "  {} {} [{:?}]{}",
            frame.frame_id,
            frame.name.unwrap_or("?"),
            frame.state,
            frame.reason.map(|r| format!(" ({})", r)).unwrap_or_default()
        );
    }
}

fn print_help() {
    println!("commands:");
    println!("  start <frame-id>   start automation for a frame, e.g. start 1.1");
    println!("  stop <frame-id>    stop one frame's automation");
    println!("  stop-all           stop every session");
    println!("  status             window geometry and active sessions");
    println!("  quit               stop everything and exit");
}
