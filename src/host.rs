//! A backend that keeps buffers in host memory and runs kernels on the CPU.
//!
//! It follows the semantics of the generated OpenCL kernels (see [`Element::apply`]) and mirrors
//! the status codes the OpenCL runtime returns for the same failures. It counts what it is asked
//! to do, which makes it a test double for code written against [`crate::Context`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::backend::{Access, Backend};
use crate::element::{Element, ElementType};
use crate::error::{GPUError, GPUResult};
use crate::kernel::{KernelKey, Operation};

const CL_INVALID_VALUE: i32 = -30;
const CL_INVALID_BUFFER_SIZE: i32 = -61;
const CL_INVALID_KERNEL_NAME: i32 = -46;
const CL_BUILD_PROGRAM_FAILURE: i32 = -11;

#[derive(Debug, Default)]
struct Counters {
    compilations: Cell<usize>,
    launches: Cell<usize>,
    reads: Cell<usize>,
    live_allocations: Cell<usize>,
    released_kernels: Cell<usize>,
}

fn increment(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

/// Host memory standing in for a device allocation.
pub struct HostMemory {
    bytes: Vec<u8>,
    counters: Rc<Counters>,
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        let live = &self.counters.live_allocations;
        live.set(live.get() - 1);
    }
}

impl fmt::Debug for HostMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMemory")
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

type ElementwiseFn = fn(Operation, &[u8], &[u8], &mut [u8], usize);

/// A "compiled" kernel, the typed elementwise loop for its key.
pub struct HostKernel {
    key: KernelKey,
    run: ElementwiseFn,
    counters: Rc<Counters>,
}

impl Drop for HostKernel {
    fn drop(&mut self) {
        increment(&self.counters.released_kernels);
    }
}

impl fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostKernel({})", self.key)
    }
}

/// Runs the kernels on the CPU.
#[derive(Debug, Default)]
pub struct HostBackend {
    counters: Rc<Counters>,
    rejected_builds: RefCell<Option<String>>,
}

impl HostBackend {
    /// Returns a new backend with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of kernels compiled so far, including failed builds.
    pub fn compilations(&self) -> usize {
        self.counters.compilations.get()
    }

    /// Number of kernel launches so far.
    pub fn launches(&self) -> usize {
        self.counters.launches.get()
    }

    /// Number of buffer reads so far.
    pub fn reads(&self) -> usize {
        self.counters.reads.get()
    }

    /// Number of allocations that were not released yet.
    pub fn live_allocations(&self) -> usize {
        self.counters.live_allocations.get()
    }

    /// Number of compiled kernels that were released.
    pub fn released_kernels(&self) -> usize {
        self.counters.released_kernels.get()
    }

    /// Makes every following build fail with the given build log.
    pub fn reject_builds(&self, log: impl Into<String>) {
        *self.rejected_builds.borrow_mut() = Some(log.into());
    }

    /// Undoes [`HostBackend::reject_builds`].
    pub fn accept_builds(&self) {
        *self.rejected_builds.borrow_mut() = None;
    }
}

impl Backend for HostBackend {
    type Memory = HostMemory;
    type Kernel = HostKernel;

    fn device_name(&self) -> String {
        "Host".to_string()
    }

    fn allocate(&self, access: Access, data: &[u8]) -> GPUResult<HostMemory> {
        if data.is_empty() {
            return Err(GPUError::Native {
                call: "clCreateBuffer",
                code: CL_INVALID_BUFFER_SIZE,
            });
        }
        debug!("Allocating {} bytes of {} host memory.", data.len(), access);
        increment(&self.counters.live_allocations);
        Ok(HostMemory {
            bytes: data.to_vec(),
            counters: Rc::clone(&self.counters),
        })
    }

    fn read(&self, memory: &HostMemory, data: &mut [u8]) -> GPUResult<()> {
        if data.len() != memory.bytes.len() {
            return Err(GPUError::Native {
                call: "clEnqueueReadBuffer",
                code: CL_INVALID_VALUE,
            });
        }
        increment(&self.counters.reads);
        data.copy_from_slice(&memory.bytes);
        Ok(())
    }

    fn compile(&self, key: KernelKey, source: &str) -> GPUResult<HostKernel> {
        increment(&self.counters.compilations);
        if let Some(log) = self.rejected_builds.borrow().as_ref() {
            return Err(GPUError::Build {
                kernel: key.name(),
                code: CL_BUILD_PROGRAM_FAILURE,
                log: log.clone(),
            });
        }
        if !source.contains(&format!("__kernel void {}(", key)) {
            return Err(GPUError::Native {
                call: "clCreateKernel",
                code: CL_INVALID_KERNEL_NAME,
            });
        }
        Ok(HostKernel {
            key,
            run: elementwise_fn(key.ty),
            counters: Rc::clone(&self.counters),
        })
    }

    fn launch(
        &self,
        kernel: &HostKernel,
        a: &HostMemory,
        b: &HostMemory,
        c: &mut HostMemory,
        length: usize,
    ) -> GPUResult<()> {
        increment(&self.counters.launches);
        (kernel.run)(kernel.key.op, &a.bytes, &b.bytes, &mut c.bytes, length);
        Ok(())
    }
}

fn elementwise_fn(ty: ElementType) -> ElementwiseFn {
    match ty {
        ElementType::Int8 => elementwise::<i8>,
        ElementType::Int16 => elementwise::<i16>,
        ElementType::Int32 => elementwise::<i32>,
        ElementType::Int64 => elementwise::<i64>,
        ElementType::Uint8 => elementwise::<u8>,
        ElementType::Uint16 => elementwise::<u16>,
        ElementType::Uint32 => elementwise::<u32>,
        ElementType::Uint64 => elementwise::<u64>,
        ElementType::Float32 => elementwise::<f32>,
        ElementType::Float64 => elementwise::<f64>,
    }
}

/// The body of the generated kernel, `if (gid < s) c[gid] = a[gid] <op> b[gid]`.
fn elementwise<T: Element>(op: Operation, a: &[u8], b: &[u8], c: &mut [u8], length: usize) {
    let width = T::TYPE.size();
    a.chunks_exact(width)
        .zip(b.chunks_exact(width))
        .zip(c.chunks_exact_mut(width))
        .take(length)
        .for_each(|((lhs, rhs), out)| {
            T::apply(op, T::from_ne_slice(lhs), T::from_ne_slice(rhs)).write_ne_slice(out)
        });
}

#[cfg(test)]
mod tests {
    use super::{elementwise, HostBackend};
    use crate::backend::{Access, Backend};
    use crate::element::{self, ElementType};
    use crate::error::GPUError;
    use crate::kernel::{KernelKey, Operation};

    #[test]
    fn test_length_guard() {
        let a = [1u32, 2, 3, 4];
        let b = [10u32, 20, 30, 40];
        let mut c = [0u32; 4];
        elementwise::<u32>(
            Operation::Add,
            element::as_bytes(&a),
            element::as_bytes(&b),
            element::as_bytes_mut(&mut c),
            2,
        );
        assert_eq!(c, [11, 22, 0, 0]);
    }

    #[test]
    fn test_empty_allocation_fails() {
        let backend = HostBackend::new();
        assert!(matches!(
            backend.allocate(Access::ReadWrite, &[]),
            Err(GPUError::Native {
                call: "clCreateBuffer",
                ..
            })
        ));
        assert_eq!(backend.live_allocations(), 0);
    }

    #[test]
    fn test_kernel_name_must_match_source() {
        let backend = HostBackend::new();
        let key = KernelKey::new(Operation::Add, ElementType::Int32);
        let other = KernelKey::new(Operation::Subtract, ElementType::Int32);
        assert!(matches!(
            backend.compile(key, &other.source()),
            Err(GPUError::Native {
                call: "clCreateKernel",
                ..
            })
        ));
        assert!(backend.compile(key, &key.source()).is_ok());
        assert_eq!(backend.compilations(), 2);
        assert_eq!(backend.released_kernels(), 1);
    }

    #[test]
    fn test_launch_writes_result() {
        let backend = HostBackend::new();
        let key = KernelKey::new(Operation::Subtract, ElementType::Int16);
        let kernel = backend.compile(key, &key.source()).unwrap();
        let a = backend
            .allocate(Access::ReadOnly, element::as_bytes(&[5i16, -5]))
            .unwrap();
        let b = backend
            .allocate(Access::ReadOnly, element::as_bytes(&[7i16, 7]))
            .unwrap();
        let mut c = backend
            .allocate(Access::WriteOnly, element::as_bytes(&[0i16; 2]))
            .unwrap();
        backend.launch(&kernel, &a, &b, &mut c, 2).unwrap();

        let mut result = [0i16; 2];
        backend
            .read(&c, element::as_bytes_mut(&mut result))
            .unwrap();
        assert_eq!(result, [-2, -12]);
        assert_eq!(backend.launches(), 1);
        assert_eq!(backend.reads(), 1);
        assert_eq!(backend.live_allocations(), 3);
    }
}
