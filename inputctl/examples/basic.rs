use inputctl::{parse_chord, Desktop, InputCtl, MouseButton};

fn main() -> inputctl::Result<()> {
    let desktop = Desktop {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    };

    // Create devices (takes ~1 second for kernel initialization)
    println!("Creating virtual input devices for {}...", desktop);
    let mut ctl = InputCtl::new(desktop)?;
    println!("Devices ready!");

    // Focus whatever sits in the middle of the screen
    ctl.click_at(960, 540, MouseButton::Left)?;

    // Paste the clipboard there
    ctl.press_chord(&parse_chord("ctrl+v")?)?;

    Ok(())
}
