//! Integration tests for inputctl
//!
//! These tests require access to /dev/uinput and are marked #[ignore].
//! Run with: sudo cargo test -- --ignored

use inputctl::{parse_chord, Desktop, InputCtl, Key, MouseButton};

fn desktop() -> Desktop {
    Desktop {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    }
}

#[test]
#[ignore = "requires /dev/uinput access (run with sudo)"]
fn create_devices() {
    let ctl = InputCtl::new(desktop());
    assert!(ctl.is_ok(), "should create devices: {:?}", ctl.err());
}

#[test]
#[ignore = "requires /dev/uinput access (run with sudo)"]
fn click_at_center() {
    let mut ctl = InputCtl::new(desktop()).expect("failed to create devices");
    let result = ctl.click_at(960, 540, MouseButton::Left);
    assert!(result.is_ok(), "should click: {:?}", result.err());
}

#[test]
#[ignore = "requires /dev/uinput access (run with sudo)"]
fn paste_chord_releases_every_key() {
    let mut ctl = InputCtl::new(desktop()).expect("failed to create devices");
    let chord = parse_chord("ctrl+v").unwrap();
    ctl.press_chord(&chord).expect("chord failed");
    ctl.key_down(Key::KEY_LEFTSHIFT).unwrap();
    assert!(ctl.release_all().is_ok());
}

#[test]
#[ignore = "requires /dev/uinput access (run with sudo)"]
fn move_outside_desktop_fails() {
    let mut ctl = InputCtl::new(desktop()).expect("failed to create devices");
    assert!(ctl.move_to(5000, 5000).is_err());
}
