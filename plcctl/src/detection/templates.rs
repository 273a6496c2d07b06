use crate::error::{Error, Result};
use image::GrayImage;
use std::path::{Component, Path, PathBuf};

/// Directory of reference screen crops, addressed by file name ("i1.png")
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List all available template file names
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut templates = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_image = matches!(
                path.extension().and_then(|s| s.to_str()).map(str::to_lowercase).as_deref(),
                Some("png" | "jpg" | "jpeg" | "bmp")
            );
            if is_image {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    templates.push(name.to_string());
                }
            }
        }

        templates.sort();
        Ok(templates)
    }

    /// Find template file path by name. A name without extension gets ".png".
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.trim().is_empty() || !plain {
            return Err(Error::Template(format!(
                "'{}' is not a plain template file name",
                name
            )));
        }

        let mut path = self.dir.join(relative);
        if path.extension().is_none() {
            path.set_extension("png");
        }

        if !path.exists() {
            let available = self.list()?;
            let available_str = if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            };
            return Err(Error::Template(format!(
                "Template '{}' not found in {}. Available: {}",
                name,
                self.dir.display(),
                available_str
            )));
        }

        Ok(path)
    }

    /// Load a template as grayscale
    pub fn load(&self, name: &str) -> Result<GrayImage> {
        let path = self.resolve(name)?;
        let image = image::open(&path).map_err(|e| {
            Error::Template(format!("Failed to load template {}: {}", path.display(), e))
        })?;
        Ok(image.to_luma8())
    }
}
