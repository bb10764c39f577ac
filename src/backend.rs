use std::fmt;

use crate::error::GPUResult;
use crate::kernel::KernelKey;

/// How the device may access a buffer.
///
/// This is about the compute device only, the host can always upload and read back.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Access {
    /// Kernels may read and write the buffer.
    ReadWrite,
    /// Kernels may only read the buffer.
    ReadOnly,
    /// Kernels may only write the buffer.
    WriteOnly,
}

impl Access {
    /// Returns whether a kernel is allowed to use the buffer in the given way.
    pub fn allows(&self, usage: Usage) -> bool {
        matches!(
            (self, usage),
            (Self::ReadWrite, _) | (Self::ReadOnly, Usage::Read) | (Self::WriteOnly, Usage::Write)
        )
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self {
            Self::ReadWrite => "read-write",
            Self::ReadOnly => "read-only",
            Self::WriteOnly => "write-only",
        };
        write!(f, "{}", access)
    }
}

/// How a kernel uses one of its buffer arguments.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Usage {
    /// The kernel reads the buffer.
    Read,
    /// The kernel writes the buffer.
    Write,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// The primitives of a compute runtime that [`crate::Context`] is built on.
///
/// A backend owns the native context and command queue of a single device. All calls are
/// synchronous: when they return, the runtime has accepted the work and blocking transfers are
/// complete. Resources are released when the associated types are dropped.
pub trait Backend {
    /// A device memory allocation.
    type Memory;
    /// A compiled program together with the kernel created from it.
    type Kernel;

    /// Returns the name of the device, e.g. "GeForce RTX 3090".
    fn device_name(&self) -> String;

    /// Allocates device memory with the given access mode, initialized with `data`.
    fn allocate(&self, access: Access, data: &[u8]) -> GPUResult<Self::Memory>;

    /// Copies the whole allocation into `data`, blocking until the copy is done.
    fn read(&self, memory: &Self::Memory, data: &mut [u8]) -> GPUResult<()>;

    /// Compiles `source` for the device and creates the kernel named after `key`.
    fn compile(&self, key: KernelKey, source: &str) -> GPUResult<Self::Kernel>;

    /// Binds `a`, `b`, `c` and `length` to the kernel and enqueues it over `length` work items.
    fn launch(
        &self,
        kernel: &Self::Kernel,
        a: &Self::Memory,
        b: &Self::Memory,
        c: &mut Self::Memory,
        length: usize,
    ) -> GPUResult<()>;
}

#[cfg(test)]
mod tests {
    use super::{Access, Usage};

    #[test]
    fn test_access_permissions() {
        assert!(Access::ReadWrite.allows(Usage::Read));
        assert!(Access::ReadWrite.allows(Usage::Write));
        assert!(Access::ReadOnly.allows(Usage::Read));
        assert!(!Access::ReadOnly.allows(Usage::Write));
        assert!(Access::WriteOnly.allows(Usage::Write));
        assert!(!Access::WriteOnly.allows(Usage::Read));
    }
}
