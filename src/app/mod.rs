use crate::api::{ApiServer, ApiState};
use crate::bridge::BrowserBridge;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::detect::window::{NullWindowSource, WmctrlWindowSource};
use crate::detect::{AppMonitor, CompositeDetector, Sensors, WindowScanner, WindowSource};
use crate::global;
use crate::logs::{DetectionLogger, ObservabilitySink};
use crate::platform::Platform;
use crate::recorder::{DryRunRecorder, RecorderBackend, ShellCommandRecorder};
use crate::status::StatusHandle;
use crate::suspend::SuspendWatcher;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn run_service(config_path: Option<PathBuf>) -> Result<()> {
    info!("Starting meetrec service");

    let config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.log_warnings();

    let logs_dir = global::logs_dir()?;
    let sink = build_sink(&config, &logs_dir);
    sink.lifecycle(&format!("meetrec {} starting", env!("CARGO_PKG_VERSION")));

    let status = StatusHandle::new();
    let mut coordinator = Coordinator::new(
        config.timing.machine_timings(),
        build_recorder(&config),
        status.clone(),
        sink.clone(),
    );
    let handle = coordinator.handle();

    let scanner = WindowScanner::new(window_source(), config.timing.window_poll());
    let sensors = Sensors::system(config.timing.sensor_poll());

    let mut composites = Vec::new();
    for platform in Platform::native() {
        let Some(profile) = config.detectors.profile(platform) else {
            continue;
        };
        if !profile.enabled {
            info!("{} detection disabled", platform.display_name());
            continue;
        }
        let detector = CompositeDetector::new(
            platform,
            profile.clone(),
            sensors.clone(),
            handle.signal_sink(),
            config.timing.sensor_poll(),
        );
        if detector.profile().window.is_some() {
            scanner.register(&detector);
        }
        coordinator.register_detector(detector.clone());
        composites.push(detector);
    }

    let bridge = BrowserBridge::new(
        handle.signal_sink(),
        config.bridge.grace(),
        config.bridge.enabled,
    );
    coordinator.register_detector(bridge.clone());
    coordinator.set_window_scanner(scanner.clone());

    let coordinator_task = coordinator.spawn();

    let app_monitor = AppMonitor::new(config.timing.app_scan());
    scanner.follow_app_presence(app_monitor.subscribe());
    app_monitor.start();
    scanner.start();

    if config.bridge.enabled {
        let state = ApiState::new(handle.clone(), status.clone(), bridge.clone(), logs_dir);
        let server = ApiServer::new(&config.bridge, state);
        match server.bind().await {
            Ok(listener) => {
                tokio::spawn(async move {
                    if let Err(e) = server.serve(listener).await {
                        error!("Bridge server failed: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Browser bridge unavailable: {:#}", e);
                status.add_activity(format!("Browser bridge unavailable: {e}"), None);
            }
        }
    } else {
        info!("Browser bridge disabled");
    }

    let suspend = config.suspend.enabled.then(|| {
        let watcher = SuspendWatcher::new(handle.clone(), &config.suspend);
        watcher.start();
        watcher
    });

    handle.start();
    info!(
        "meetrec is ready ({} native detectors, bridge {})",
        composites.len(),
        if config.bridge.enabled { "on" } else { "off" }
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    if let Some(watcher) = suspend {
        watcher.stop();
    }
    scanner.stop();
    app_monitor.stop();
    sink.lifecycle("meetrec stopping");
    handle.shutdown();
    if let Err(e) = coordinator_task.await {
        warn!("Coordinator task ended abnormally: {}", e);
    }

    Ok(())
}

fn build_sink(config: &Config, logs_dir: &Path) -> Arc<dyn ObservabilitySink> {
    if config.logging.file {
        info!("Detection log at {}", logs_dir.display());
        Arc::new(DetectionLogger::with_file(logs_dir, config.logging.max_bytes))
    } else {
        Arc::new(DetectionLogger::console())
    }
}

fn build_recorder(config: &Config) -> Arc<dyn RecorderBackend> {
    if config.automation.is_dry_run() {
        warn!("No recorder commands configured; recordings will only be logged");
        Arc::new(DryRunRecorder)
    } else {
        Arc::new(ShellCommandRecorder::new(
            config.automation.start_command.clone(),
            config.automation.stop_command.clone(),
            config.automation.timeout_secs,
        ))
    }
}

fn window_source() -> Arc<dyn WindowSource> {
    match which::which("wmctrl") {
        Ok(path) => {
            info!("Window list via {}", path.display());
            Arc::new(WmctrlWindowSource::new(path))
        }
        Err(_) => {
            warn!("wmctrl not found; window detection disabled");
            Arc::new(NullWindowSource)
        }
    }
}
