//! Error types with actionable suggestions.
//!
//! Errors fall into four classes:
//!
//! | Class | Variants | Retried by the core? |
//! |-------|----------|----------------------|
//! | Programming error | `NoActiveScope`, `NoFrameAvailable` | never |
//! | Expectation violated | `TemplateNotFound`, `TextNotFound` | never (caller decides) |
//! | Cancellation | `Interrupted` | never, always propagated |
//! | Timeout | `Timeout` | never |
//!
//! Collaborator failures (`Device`, `Ocr`) and input problems round out the
//! taxonomy. Every variant maps to an [`ErrorCode`] and carries a hint.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ScreenshotMode;
use crate::frame::Frame;
use crate::vision::ocr::OcrLanguage;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed source error from an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error codes for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoActiveScope,
    NoFrameAvailable,
    Interrupted,
    NotFound,
    Timeout,
    DeviceError,
    OcrError,
    InvalidInput,
    ConfigError,
    IoError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::NoActiveScope => write!(f, "NO_ACTIVE_SCOPE"),
            ErrorCode::NoFrameAvailable => write!(f, "NO_FRAME_AVAILABLE"),
            ErrorCode::Interrupted => write!(f, "INTERRUPTED"),
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::Timeout => write!(f, "TIMEOUT"),
            ErrorCode::DeviceError => write!(f, "DEVICE_ERROR"),
            ErrorCode::OcrError => write!(f, "OCR_ERROR"),
            ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
            ErrorCode::IoError => write!(f, "IO_ERROR"),
        }
    }
}

/// Errors raised by the perception and dispatch core.
#[derive(Debug, Error)]
pub enum Error {
    /// A recognition call or `pop` happened with an empty scope stack.
    #[error("no active execution scope")]
    NoActiveScope,

    /// A manual scope was read before any frame was supplied.
    #[error("no frame available in {mode} scope")]
    NoFrameAvailable { mode: ScreenshotMode },

    /// The interrupt flag was set.
    #[error("interrupted by user request")]
    Interrupted,

    /// A required template was not visible.
    #[error("template not found: {template}")]
    TemplateNotFound { template: String, frame: Frame },

    /// A required text was not visible.
    #[error("expected text not found: {pattern}")]
    TextNotFound { pattern: String, frame: Frame },

    /// A bounded wait ran out of time.
    #[error("timed out after {}ms waiting for {what}", elapsed.as_millis())]
    Timeout { what: String, elapsed: Duration },

    /// The device capability failed.
    #[error("device error: {message}")]
    Device {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The OCR engine failed.
    #[error("OCR engine error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// No OCR engine was registered for the requested language.
    #[error("no OCR engine registered for language '{language}'")]
    NoOcrEngine { language: OcrLanguage },

    /// Malformed arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn device(message: impl Into<String>) -> Self {
        Error::Device {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a transport error reported by a device implementation.
    pub fn device_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Device {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn ocr(message: impl Into<String>) -> Self {
        Error::Ocr {
            message: message.into(),
            source: None,
        }
    }

    pub fn ocr_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Ocr {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    pub fn timeout(what: impl Into<String>, elapsed: Duration) -> Self {
        Error::Timeout {
            what: what.into(),
            elapsed,
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NoActiveScope => ErrorCode::NoActiveScope,
            Error::NoFrameAvailable { .. } => ErrorCode::NoFrameAvailable,
            Error::Interrupted => ErrorCode::Interrupted,
            Error::TemplateNotFound { .. } | Error::TextNotFound { .. } => ErrorCode::NotFound,
            Error::Timeout { .. } => ErrorCode::Timeout,
            Error::Device { .. } => ErrorCode::DeviceError,
            Error::Ocr { .. } | Error::NoOcrEngine { .. } => ErrorCode::OcrError,
            Error::InvalidInput(_) => ErrorCode::InvalidInput,
            Error::Config(_) => ErrorCode::ConfigError,
            Error::Image(_) | Error::Io(_) => ErrorCode::IoError,
        }
    }

    /// A hint on how to recover from this error.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        let hint = match self {
            Error::NoActiveScope => {
                "Wrap the call in `Context::manual_context` or run it inside a dispatcher"
            }
            Error::NoFrameAvailable { .. } => {
                "Call `Context::screenshot()` or `Context::use_frame()` before reading a manual scope"
            }
            Error::Interrupted => {
                "The run was stopped on request. Clear the interrupt flag before starting another task"
            }
            Error::TemplateNotFound { .. } => {
                "Check that the expected screen is showing, or lower the match threshold"
            }
            Error::TextNotFound { .. } => {
                "Check the OCR region and pattern; a hint box or fuzzy predicate may help"
            }
            Error::Timeout { .. } => {
                "The element never appeared. Increase the timeout or check the preceding action"
            }
            Error::Device { .. } => "Check that the device is connected and responsive",
            Error::Ocr { .. } => "Check that the OCR engine models are installed and loadable",
            Error::NoOcrEngine { .. } => {
                "Register an engine with `ContextBuilder::ocr_engine` for this language"
            }
            Error::InvalidInput(_) => "Check the arguments and try again",
            Error::Config(_) => "Fix the configuration file; unknown keys and bad values are rejected",
            Error::Image(_) => "Check that the image file exists and is a supported format",
            Error::Io(_) => "Check file permissions and paths",
        };
        Some(hint)
    }

    /// True for the cooperative cancellation signal.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Interrupted)
    }

    /// True for scope-stack misuse, which indicates a bug in the caller.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Error::NoActiveScope | Error::NoFrameAvailable { .. })
    }

    /// The frame an expectation failed against, for diagnostic capture.
    #[must_use]
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Error::TemplateNotFound { frame, .. } | Error::TextNotFound { frame, .. } => Some(frame),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::solid_frame;

    fn all_errors() -> Vec<Error> {
        let frame = solid_frame(4, 4, [0, 0, 0]);
        vec![
            Error::NoActiveScope,
            Error::NoFrameAvailable {
                mode: ScreenshotMode::Manual,
            },
            Error::Interrupted,
            Error::TemplateNotFound {
                template: "ok_button".into(),
                frame: frame.clone(),
            },
            Error::TextNotFound {
                pattern: "contains('OK')".into(),
                frame,
            },
            Error::timeout("ok_button", Duration::from_millis(1500)),
            Error::device("adb disconnected"),
            Error::ocr("model missing"),
            Error::NoOcrEngine {
                language: OcrLanguage::English,
            },
            Error::invalid_input("bad color"),
            Error::Config("unknown field".into()),
        ]
    }

    /// Every error must carry a hint for the caller.
    #[test]
    fn all_errors_have_suggestions() {
        for err in all_errors() {
            assert!(
                err.suggestion().is_some(),
                "{:?} should have a suggestion",
                err.code()
            );
        }
    }

    #[test]
    fn not_found_errors_carry_frame() {
        let frame = solid_frame(3, 2, [1, 2, 3]);
        let err = Error::TemplateNotFound {
            template: "icon".into(),
            frame: frame.clone(),
        };
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.frame().unwrap().same_as(&frame));
        assert!(err.to_string().contains("icon"));
    }

    #[test]
    fn classification_helpers() {
        assert!(Error::Interrupted.is_cancellation());
        assert!(!Error::Interrupted.is_programming_error());
        assert!(Error::NoActiveScope.is_programming_error());
        assert!(Error::NoFrameAvailable {
            mode: ScreenshotMode::ManualInherit
        }
        .is_programming_error());
        assert!(!Error::device("x").is_cancellation());
    }

    #[test]
    fn timeout_display_includes_millis() {
        let err = Error::timeout("contains('OK')", Duration::from_millis(2500));
        let display = err.to_string();
        assert!(display.contains("2500ms"));
        assert!(display.contains("contains('OK')"));
    }

    #[test]
    fn device_error_keeps_source() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::device_with("screenshot failed", io);
        assert_eq!(err.code(), ErrorCode::DeviceError);
        assert!(err.source().unwrap().to_string().contains("pipe closed"));
    }

    #[test]
    fn config_errors_have_their_own_code() {
        let err = Error::Config("unknown field `treshold`".into());
        assert_eq!(err.code(), ErrorCode::ConfigError);
        assert_ne!(err.code(), Error::invalid_input("x").code());
        assert_eq!(
            serde_json::to_string(&err.code()).unwrap(),
            "\"CONFIG_ERROR\""
        );
    }

    #[test]
    fn error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::NoFrameAvailable).unwrap();
        assert_eq!(json, "\"NO_FRAME_AVAILABLE\"");
        assert_eq!(ErrorCode::NotFound.to_string(), "NOT_FOUND");
    }
}
