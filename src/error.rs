use crate::backend::{Access, Usage};

/// Error types of this library.
#[derive(thiserror::Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum GPUError {
    /// A call into the native runtime returned a non-success status, e.g. a failed memory
    /// allocation.
    #[error("{call} failed with status {code}")]
    Native {
        /// Name of the failing runtime call, e.g. `clCreateBuffer`.
        call: &'static str,
        /// The raw status code.
        code: i32,
    },

    /// The generated kernel source did not compile. The log is the compiler output as-is.
    #[error("Building kernel {kernel} failed with status {code}:\n{log}")]
    Build {
        /// Name of the kernel, e.g. `add_int32`.
        kernel: String,
        /// The raw status code of the build call.
        code: i32,
        /// The build log of the device compiler.
        log: String,
    },

    /// A buffer's access mode does not allow the way a dispatch uses it.
    #[error("Buffer `{operand}` is {access} but the kernel needs to {required} it")]
    InvalidAccess {
        /// Kernel parameter the buffer was bound to (`a`, `b` or `c`).
        operand: &'static str,
        /// The declared access mode of the buffer.
        access: Access,
        /// How the kernel uses the buffer.
        required: Usage,
    },

    /// Element counts that need to match don't.
    #[error("Size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch {
        /// The reference element count.
        expected: usize,
        /// The offending element count.
        actual: usize,
    },

    /// The runtime does not expose any platform.
    #[error("No platforms found!")]
    NoPlatforms,

    /// The platform does not expose any device.
    #[error("No devices found!")]
    NoDevices,

    /// There is no device with the requested index.
    #[error("Device {0} not found!")]
    DeviceNotFound(usize),

    /// A buffer that belongs to a different context was passed to a dispatch.
    #[error("Buffer belongs to a different context")]
    ForeignBuffer,
}

/// Convenience type alias for [`GPUError`] based [`Result`]s.
#[allow(clippy::upper_case_acronyms)]
pub type GPUResult<T> = std::result::Result<T, GPUError>;
