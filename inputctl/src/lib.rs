//! Virtual keyboard and absolute pointer over Linux uinput.
//!
//! Requires access to /dev/uinput (typically root or input group membership).

mod device;
pub mod error;
pub mod keyboard;
pub mod mouse;

use evdev::uinput::VirtualDevice;
use evdev::{AbsoluteAxisType, EventType, InputEvent};
use std::collections::HashSet;
use std::fmt;
use std::thread;
use std::time::Duration;

pub use device::ABS_MAX;
pub use error::{Error, Result};
pub use evdev::Key;
pub use keyboard::{parse_chord, parse_key_name};
pub use mouse::MouseButton;

/// Bounding box of every connected output, in the compositor's coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Desktop {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Desktop {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }

    /// Scale a desktop position onto the pointer's absolute axes
    pub fn to_abs(&self, x: i32, y: i32) -> Result<(i32, i32)> {
        if !self.contains(x, y) {
            return Err(Error::OutOfBounds {
                x,
                y,
                desktop: self.to_string(),
            });
        }
        Ok((
            scale_axis(x - self.x, self.width),
            scale_axis(y - self.y, self.height),
        ))
    }
}

impl fmt::Display for Desktop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

fn scale_axis(offset: i32, extent: u32) -> i32 {
    let span = (extent as i64 - 1).max(1);
    (offset as i64 * ABS_MAX as i64 / span) as i32
}

/// Virtual input devices for clicking and key chords
pub struct InputCtl {
    keyboard: VirtualDevice,
    pointer: VirtualDevice,
    desktop: Desktop,
    held_keys: HashSet<Key>,
    held_buttons: HashSet<MouseButton>,
}

impl InputCtl {
    /// Create the virtual keyboard and pointer
    ///
    /// Note: This takes ~1 second as the kernel needs time to recognize the devices.
    pub fn new(desktop: Desktop) -> Result<Self> {
        let keyboard = device::create_keyboard()?;
        let pointer = device::create_pointer()?;
        device::settle();

        tracing::debug!(%desktop, "virtual input devices ready");

        Ok(Self {
            keyboard,
            pointer,
            desktop,
            held_keys: HashSet::new(),
            held_buttons: HashSet::new(),
        })
    }

    pub fn desktop(&self) -> Desktop {
        self.desktop
    }

    /// Warp the pointer to an absolute desktop position
    pub fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        let (ax, ay) = self.desktop.to_abs(x, y)?;
        let events = [
            InputEvent::new_now(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, ax),
            InputEvent::new_now(EventType::ABSOLUTE, AbsoluteAxisType::ABS_Y.0, ay),
            InputEvent::new_now(EventType::SYNCHRONIZATION, 0, 0), // SYN_REPORT
        ];
        self.pointer.emit(&events)?;
        Ok(())
    }

    /// Click a mouse button (press and release)
    pub fn click(&mut self, button: MouseButton) -> Result<()> {
        self.mouse_down(button)?;
        self.mouse_up(button)
    }

    /// Move to a desktop position and click there
    pub fn click_at(&mut self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        self.move_to(x, y)?;
        // Let the compositor deliver the motion before the press
        thread::sleep(Duration::from_millis(50));
        self.click(button)
    }

    pub fn mouse_down(&mut self, button: MouseButton) -> Result<()> {
        self.held_buttons.insert(button);
        emit_key(&mut self.pointer, button.to_key(), 1)
    }

    pub fn mouse_up(&mut self, button: MouseButton) -> Result<()> {
        self.held_buttons.remove(&button);
        emit_key(&mut self.pointer, button.to_key(), 0)
    }

    pub fn key_down(&mut self, key: Key) -> Result<()> {
        self.held_keys.insert(key);
        emit_key(&mut self.keyboard, key, 1)
    }

    pub fn key_up(&mut self, key: Key) -> Result<()> {
        self.held_keys.remove(&key);
        emit_key(&mut self.keyboard, key, 0)
    }

    /// Press and release a key
    pub fn key_click(&mut self, key: Key) -> Result<()> {
        self.key_down(key)?;
        self.key_up(key)
    }

    /// Press keys in order, then release them in reverse (e.g. ctrl+v)
    pub fn press_chord(&mut self, keys: &[Key]) -> Result<()> {
        if keys.is_empty() {
            return Err(Error::EmptyChord);
        }
        for key in keys {
            self.key_down(*key)?;
        }
        thread::sleep(Duration::from_millis(20));
        for key in keys.iter().rev() {
            self.key_up(*key)?;
        }
        Ok(())
    }

    /// Release all currently held keys and mouse buttons
    pub fn release_all(&mut self) -> Result<()> {
        let keys: Vec<Key> = self.held_keys.iter().copied().collect();
        let buttons: Vec<MouseButton> = self.held_buttons.iter().copied().collect();

        for key in keys {
            self.key_up(key)?;
        }
        for button in buttons {
            self.mouse_up(button)?;
        }
        Ok(())
    }
}

impl Drop for InputCtl {
    fn drop(&mut self) {
        // Drop can't return Result
        let _ = self.release_all();
    }
}

fn emit_key(device: &mut VirtualDevice, key: Key, value: i32) -> Result<()> {
    let events = [
        InputEvent::new_now(EventType::KEY, key.code(), value),
        InputEvent::new_now(EventType::SYNCHRONIZATION, 0, 0), // SYN_REPORT
    ];
    device.emit(&events)?;
    Ok(())
}
