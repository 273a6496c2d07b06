use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, Key, UinputAbsSetup};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::keyboard;
use crate::mouse::MouseButton;

/// Upper bound of both absolute axes. Positions are scaled into 0..=ABS_MAX
/// across the whole desktop.
pub const ABS_MAX: i32 = 32767;

/// Creates the virtual keyboard
pub fn create_keyboard() -> Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    for key in keyboard::supported_keys() {
        keys.insert(key);
    }

    let device = VirtualDeviceBuilder::new()?
        .name("inputctl virtual keyboard")
        .with_keys(&keys)?
        .build()?;

    Ok(device)
}

/// Creates an absolute pointer (tablet-style) device spanning the desktop
pub fn create_pointer() -> Result<VirtualDevice> {
    let mut buttons = AttributeSet::<Key>::new();
    for button in [MouseButton::Left, MouseButton::Right, MouseButton::Middle] {
        buttons.insert(button.to_key());
    }

    let abs_x = UinputAbsSetup::new(AbsoluteAxisType::ABS_X, AbsInfo::new(0, 0, ABS_MAX, 0, 0, 0));
    let abs_y = UinputAbsSetup::new(AbsoluteAxisType::ABS_Y, AbsInfo::new(0, 0, ABS_MAX, 0, 0, 0));

    let device = VirtualDeviceBuilder::new()?
        .name("inputctl virtual pointer")
        .with_keys(&buttons)?
        .with_absolute_axis(&abs_x)?
        .with_absolute_axis(&abs_y)?
        .build()?;

    Ok(device)
}

/// Wait for the kernel and compositor to pick up freshly created devices.
/// Without this delay, initial events may be lost.
pub fn settle() {
    thread::sleep(Duration::from_secs(1));
}
