//! Structured exception data carried in a record's context.
//!
//! The host attaches an [`ExceptionPayload`] to a record when the log call
//! reports a failure. The formatter renders it as an exception report and
//! the topic resolver walks its frames to find the command or job that was
//! running when it was raised.
//!
//! # Example
//!
//! ```rust
//! use tglog::exception::{ExceptionPayload, StackFrame};
//!
//! let payload = ExceptionPayload::new("App\\Exceptions\\SyncFailed", "remote timed out")
//!     .with_location("/srv/app/Jobs/SyncUsers.php", 42)
//!     .with_frames(vec![StackFrame::method("App\\Jobs\\SyncUsers", "handle")]);
//!
//! assert!(payload.trace_as_string().contains("App\\Jobs\\SyncUsers::handle()"));
//! ```

use std::any::type_name;
use std::error::Error;
use std::fmt::Write as _;

use serde::Deserialize;
use serde_json::Value;

/// A single frame of an exception's call trace.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct StackFrame {
    /// Source file of the frame, when known.
    #[serde(default)]
    pub file: Option<String>,
    /// Line number in `file`.
    #[serde(default)]
    pub line: Option<u32>,
    /// Function or method name.
    pub function: String,
    /// Namespaced class path for method frames.
    #[serde(default)]
    pub class: Option<String>,
    /// Arguments captured for the call, if the host records them.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl StackFrame {
    /// Create a free-function frame.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            ..Default::default()
        }
    }

    /// Create a method frame on `class`.
    pub fn method(class: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            class: Some(class.into()),
            ..Default::default()
        }
    }

    /// Attach a source location.
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Attach captured call arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// Exception attached to a record.
///
/// Hosts that hand over exceptions as JSON can deserialise them directly;
/// every field except `type_name` and `message` is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ExceptionPayload {
    /// Fully qualified exception type name.
    pub type_name: String,
    /// Exception message.
    pub message: String,
    /// Raw error code.
    #[serde(default)]
    pub code: i64,
    /// Framework status code (e.g. HTTP status), preferred over `code` when set.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Numeric severity for runtime errors, see [`severity_name`].
    #[serde(default)]
    pub severity: Option<u32>,
    /// File the exception was raised in.
    #[serde(default)]
    pub file: String,
    /// Line the exception was raised on.
    #[serde(default)]
    pub line: u32,
    /// Call trace, innermost frame first.
    #[serde(default)]
    pub frames: Vec<StackFrame>,
}

impl ExceptionPayload {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Build a payload from any error value.
    ///
    /// The type name comes from the static type of `err`; the error's source
    /// chain is appended to the message.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = write!(message, ": {cause}");
            source = cause.source();
        }
        Self::new(type_name::<E>(), message)
    }

    /// Decode a host-supplied JSON exception.
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    #[must_use]
    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: u32) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    #[must_use]
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Error code shown in reports: the status code when present, else `code`.
    pub fn display_code(&self) -> i64 {
        self.status_code.map_or(self.code, i64::from)
    }

    /// Render the call trace as numbered lines, innermost first.
    ///
    /// Lines look like `#0 /srv/app/Foo.php(12): App\Foo::bar()` and the
    /// trace ends with a `{main}` entry.
    pub fn trace_as_string(&self) -> String {
        let mut out = String::new();
        for (index, frame) in self.frames.iter().enumerate() {
            let _ = write!(out, "#{index} ");
            match (&frame.file, frame.line) {
                (Some(file), Some(line)) => {
                    let _ = write!(out, "{file}({line}): ");
                }
                (Some(file), None) => {
                    let _ = write!(out, "{file}: ");
                }
                _ => out.push_str("[internal function]: "),
            }
            if let Some(class) = &frame.class {
                let _ = write!(out, "{class}::");
            }
            let _ = writeln!(out, "{}()", frame.function);
        }
        let _ = write!(out, "#{} {{main}}", self.frames.len());
        out
    }
}

/// Name of a runtime error severity code, or `""` when unrecognised.
pub fn severity_name(code: u32) -> &'static str {
    match code {
        1 => "ERROR",
        2 => "WARNING",
        4 => "PARSE",
        8 => "NOTICE",
        16 => "CORE_ERROR",
        32 => "CORE_WARNING",
        64 => "COMPILE_ERROR",
        128 => "COMPILE_WARNING",
        256 => "USER_ERROR",
        512 => "USER_WARNING",
        1024 => "USER_NOTICE",
        2048 => "STRICT",
        4096 => "RECOVERABLE_ERROR",
        8192 => "DEPRECATED",
        16384 => "USER_DEPRECATED",
        _ => "",
    }
}
