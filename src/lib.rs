//! Elementwise arithmetic on OpenCL devices.
//!
//! A [`Context`] owns a device's native context and command queue. [`Buffer`]s are created from
//! host slices and live on that device. [`Context::add`], [`Context::sub`], [`Context::mul`] and
//! [`Context::div`] compute `c[i] = a[i] <op> b[i]` for every element. The kernel for each
//! operation and element type is generated and compiled on first use, see [`KernelKey`].
//!
//! ```no_run
//! use gpu_arith::{opencl, Access, Context};
//!
//! # fn main() -> gpu_arith::GPUResult<()> {
//! let platforms = opencl::list_platforms()?;
//! let device = platforms[0].device(0)?;
//! let context = Context::from_device(&platforms[0], device)?;
//!
//! let a = context.create_buffer(Access::ReadOnly, &[1, 2, 3])?;
//! let b = context.create_buffer(Access::ReadOnly, &[4, 5, 6])?;
//! let mut c = context.create_buffer(Access::WriteOnly, &[0; 3])?;
//! context.add(&a, &b, &mut c)?;
//! assert_eq!(c.to_vec()?, [5, 7, 9]);
//! # Ok(())
//! # }
//! ```
//!
//! Feature flags
//! -------------
//!
//! `opencl` (enabled by default) enables the [`opencl`] backend. `no-kernel-cache` makes every
//! context compile kernels for each dispatch instead of keeping them. Without it, the
//! `GPU_ARITH_KERNEL_CACHE` environment variable selects the mode, see [`KernelCache`].
//!
//! The [`host`] backend runs the same kernels on the CPU and is always available.

#![warn(missing_docs)]

mod backend;
mod buffer;
mod context;
mod device;
mod element;
mod error;
mod kernel;

pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;

pub use backend::{Access, Backend, Usage};
pub use buffer::Buffer;
pub use context::{Context, KernelCache, KERNEL_CACHE_ENV};
pub use device::DeviceKind;
pub use element::{Element, ElementType};
pub use error::{GPUError, GPUResult};
pub use kernel::{KernelKey, Operation};
