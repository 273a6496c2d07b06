use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("uinput device error: {0}")]
    Device(#[from] std::io::Error),

    #[error("unknown key name '{0}'")]
    UnknownKey(String),

    #[error("empty key chord")]
    EmptyChord,

    #[error("position ({x}, {y}) is outside the desktop {desktop}")]
    OutOfBounds { x: i32, y: i32, desktop: String },
}

pub type Result<T> = std::result::Result<T, Error>;
