//! Mouse actuation.
//! Plays a move by clicking the origin square, waiting, then clicking the destination.
//! Uses `rdev` to synthesize OS-level mouse events.
//! macOS: the terminal needs Accessibility permission to move the cursor.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info};
use rdev::{simulate, Button, EventType};

use crate::config::ClickerConfig;
use crate::coords::{ClickPair, Point};

/// OS needs a short gap between synthesized events or it drops some of them.
const EVENT_GAP: Duration = Duration::from_millis(20);

pub struct MouseClicker {
    move_time: Duration,
}

impl MouseClicker {
    pub fn new(config: &ClickerConfig) -> Self {
        Self {
            move_time: Duration::from_millis(config.move_time_ms),
        }
    }

    /// Clicks both points of a move, in screen coordinates.
    pub fn make_move(&self, (from, to): ClickPair) -> Result<()> {
        click(from)?;
        thread::sleep(self.move_time);
        click(to)?;
        info!("Clicked {:?} -> {:?}", from, to);
        Ok(())
    }
}

fn click((x, y): Point) -> Result<()> {
    debug!("click at ({}, {})", x, y);
    for event in click_events((x, y)) {
        simulate(&event).map_err(|e| anyhow!("Failed to send mouse event {:?}: {:?}", event, e))?;
        thread::sleep(EVENT_GAP);
    }
    Ok(())
}

fn click_events((x, y): Point) -> [EventType; 3] {
    [
        EventType::MouseMove { x: x as f64, y: y as f64 },
        EventType::ButtonPress(Button::Left),
        EventType::ButtonRelease(Button::Left),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_events_move_then_press() {
        let events = click_events((450, 650));
        assert!(matches!(events[0], EventType::MouseMove { x, y } if x == 450.0 && y == 650.0));
        assert!(matches!(events[1], EventType::ButtonPress(Button::Left)));
        assert!(matches!(events[2], EventType::ButtonRelease(Button::Left)));
    }

    #[test]
    fn test_move_time_from_config() {
        let clicker = MouseClicker::new(&ClickerConfig { move_time_ms: 300 });
        assert_eq!(clicker.move_time, Duration::from_millis(300));
    }

    #[test]
    #[ignore = "moves the real mouse cursor"]
    fn test_real_click() {
        let clicker = MouseClicker::new(&ClickerConfig::default());
        clicker.make_move(((10, 10), (20, 20))).unwrap();
    }
}
