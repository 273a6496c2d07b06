//! Replays one planned step against the live screen.

use crate::config::RunConfig;
use crate::detection::{best_match, Detection, TemplateStore};
use crate::error::{Error, Result};
use crate::plan::Action;
use crate::screen::{self, DisplayId};
use arboard::Clipboard;
use image::DynamicImage;
use inputctl::{InputCtl, Key, MouseButton};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Performs a step's action on the element shown by `template`
pub trait ActionExecutor {
    /// `text` is required for [`Action::PasteText`] and ignored otherwise
    fn execute(&mut self, template: &str, action: Action, text: Option<&str>) -> Result<()>;
}

/// A template located on screen
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Match centre in desktop coordinates
    pub x: i32,
    pub y: i32,
    /// Match in capture pixels
    pub detection: Detection,
}

/// Capture `display` and find `name` on it
pub fn locate(templates: &TemplateStore, display: DisplayId, name: &str, threshold: f32) -> Result<Target> {
    let template = templates.load(name)?;
    let capture = screen::capture_display(display)?;
    let (width, height) = capture.image.dimensions();
    let gray = DynamicImage::ImageRgba8(capture.image).to_luma8();

    let detection = best_match(&gray, &template, threshold).ok_or_else(|| Error::ElementNotFound {
        template: name.to_string(),
        threshold,
    })?;
    let (x, y) = capture
        .display
        .to_desktop(detection.x, detection.y, width, height);

    debug!(
        template = name,
        x,
        y,
        confidence = detection.confidence,
        "Template located"
    );
    Ok(Target { x, y, detection })
}

fn require_text<'a>(template: &str, text: Option<&'a str>) -> Result<&'a str> {
    match text {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(Error::MissingText {
            template: template.to_string(),
        }),
    }
}

/// Executor driving uinput devices and the system clipboard
pub struct ScreenExecutor {
    display: DisplayId,
    templates: TemplateStore,
    threshold: f32,
    input: InputCtl,
    clipboard: Clipboard,
    paste_chord: Vec<Key>,
    focus_delay: Duration,
}

impl ScreenExecutor {
    /// Create virtual devices spanning every connected display
    pub fn new(config: &RunConfig) -> Result<Self> {
        let paste_chord = inputctl::parse_chord(&config.paste_chord)
            .map_err(|e| Error::Configuration(format!("paste chord: {}", e)))?;

        let displays = screen::list_displays()?;
        let desktop = screen::desktop_bounds(&displays)?;
        let input = InputCtl::new(desktop)?;
        let clipboard = Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;

        info!(%desktop, display = %config.display, "Executor ready");

        Ok(Self {
            display: config.display,
            templates: TemplateStore::new(&config.template_dir),
            threshold: config.threshold,
            input,
            clipboard,
            paste_chord,
            focus_delay: config.focus_delay,
        })
    }

    pub fn locate(&self, template: &str) -> Result<Target> {
        locate(&self.templates, self.display, template, self.threshold)
    }
}

impl ActionExecutor for ScreenExecutor {
    fn execute(&mut self, template: &str, action: Action, text: Option<&str>) -> Result<()> {
        let text = match action {
            Action::PasteText => Some(require_text(template, text)?),
            Action::Click => None,
        };

        let target = self.locate(template)?;
        self.input.click_at(target.x, target.y, MouseButton::Left)?;

        if let Some(text) = text {
            thread::sleep(self.focus_delay);
            self.clipboard
                .set_text(text)
                .map_err(|e| Error::Clipboard(e.to_string()))?;
            self.input.press_chord(&self.paste_chord)?;
            info!(template, chars = text.chars().count(), "Pasted text");
        } else {
            info!(template, x = target.x, y = target.y, "Clicked");
        }
        Ok(())
    }
}
