mod filters;
mod host;
mod producers;
mod snapshot;

use std::time::Duration;

use anyhow::{Context, Result};
use tandem_engine::logging::{LoggingConfig, init_logging};
use winit::dpi::LogicalSize;
use winit::event_loop::EventLoop;

use crate::host::{Studio, StudioConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut config = StudioConfig::default();
    if let Ok(raw) = std::env::var("TANDEM_FRAME_MS") {
        match parse_frame_ms(&raw) {
            Some(interval) => config.frame_interval = interval,
            None => log::warn!("ignoring TANDEM_FRAME_MS={raw:?}; expected a positive integer"),
        }
    }
    config.initial_size = LogicalSize::new(1280.0, 720.0);

    log::info!("tandem studio: {:?} tick interval", config.frame_interval);
    log::info!("keys: S split, C crop/fit, R rotate, F output filter, P snapshot, Esc quit");

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut studio = Studio::new(config);
    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;

    Ok(())
}

fn parse_frame_ms(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_ms_parsing() {
        assert_eq!(parse_frame_ms("33"), Some(Duration::from_millis(33)));
        assert_eq!(parse_frame_ms(" 8 "), Some(Duration::from_millis(8)));
        assert_eq!(parse_frame_ms("0"), None);
        assert_eq!(parse_frame_ms("fast"), None);
    }
}
