use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::env;
use std::ptr;

use log::{debug, info, trace, warn};

use crate::backend::{Access, Backend, Usage};
use crate::buffer::Buffer;
use crate::element::Element;
use crate::error::{GPUError, GPUResult};
use crate::kernel::{KernelKey, Operation};

/// Environment variable that selects whether compiled kernels are cached.
///
/// Accepted values are `1`, `true`, `on`, `enabled` and `0`, `false`, `off`, `disabled`. It has
/// no effect on builds with the `no-kernel-cache` feature.
pub const KERNEL_CACHE_ENV: &str = "GPU_ARITH_KERNEL_CACHE";

/// Whether a [`Context`] keeps compiled kernels around.
///
/// With the `no-kernel-cache` feature the cache is always disabled.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KernelCache {
    /// Every kernel is compiled once and kept until the context is dropped.
    Enabled,
    /// Kernels are compiled for every dispatch and released right after it.
    Disabled,
}

impl Default for KernelCache {
    /// Enabled, unless the crate is built with the `no-kernel-cache` feature.
    fn default() -> Self {
        if cfg!(feature = "no-kernel-cache") {
            Self::Disabled
        } else {
            Self::Enabled
        }
    }
}

impl KernelCache {
    /// Returns the setting from [`KERNEL_CACHE_ENV`], falling back to the default.
    pub fn from_env() -> Self {
        let default = Self::default();
        let kernel_cache = match env::var(KERNEL_CACHE_ENV) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "enabled" => Self::Enabled,
                "0" | "false" | "off" | "disabled" => Self::Disabled,
                _ => {
                    warn!(
                        "Ignoring invalid {}={:?}, using {:?}.",
                        KERNEL_CACHE_ENV, value, default
                    );
                    default
                }
            },
            Err(_) => default,
        };
        kernel_cache.effective()
    }

    /// Returns the setting a context actually runs with.
    ///
    /// Builds with the `no-kernel-cache` feature never cache, a request for `Enabled` is ignored.
    pub fn effective(self) -> Self {
        if cfg!(feature = "no-kernel-cache") && self == Self::Enabled {
            warn!("Ignoring kernel cache request, the crate is built with `no-kernel-cache`.");
            return Self::Disabled;
        }
        self
    }
}

/// Everything needed to run elementwise arithmetic on a single device.
///
/// A context owns the backend (the native context and command queue) and a cache of the
/// kernels it compiled, keyed by [`KernelKey`]. There are at most 40 distinct kernels, hence the
/// cache is never evicted; [`Context::clear_kernel_cache`] releases all of them at once.
///
/// A context is meant to be used from a single thread. Dispatches are executed in submission
/// order.
pub struct Context<B: Backend> {
    // Declared before `backend` so that kernels are released before the native context.
    kernels: RefCell<HashMap<KernelKey, B::Kernel>>,
    kernel_cache: KernelCache,
    backend: B,
}

impl<B: Backend> Context<B> {
    /// Creates a context, the kernel cache setting is taken from the environment.
    pub fn new(backend: B) -> Self {
        Self::with_kernel_cache(backend, KernelCache::from_env())
    }

    /// Creates a context with an explicit kernel cache setting, see [`KernelCache::effective`].
    pub fn with_kernel_cache(backend: B, kernel_cache: KernelCache) -> Self {
        let kernel_cache = kernel_cache.effective();
        info!(
            "Created context for {} (kernel cache {:?}).",
            backend.device_name(),
            kernel_cache
        );
        Self {
            kernels: RefCell::new(HashMap::new()),
            kernel_cache,
            backend,
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the name of the device, e.g. "GeForce RTX 3090".
    pub fn device_name(&self) -> String {
        self.backend.device_name()
    }

    /// Returns whether compiled kernels are cached.
    pub fn kernel_cache(&self) -> KernelCache {
        self.kernel_cache
    }

    /// Returns the number of kernels currently in the cache.
    pub fn cached_kernels(&self) -> usize {
        self.kernels.borrow().len()
    }

    /// Releases all cached kernels. They are compiled again on their next use.
    pub fn clear_kernel_cache(&self) {
        let mut kernels = self.kernels.borrow_mut();
        debug!("Releasing {} cached kernels.", kernels.len());
        kernels.clear();
    }

    /// Creates a new buffer on the device and initializes it with the given slice.
    pub fn create_buffer<T: Element>(
        &self,
        access: Access,
        data: &[T],
    ) -> GPUResult<Buffer<'_, T, B>> {
        Buffer::from_slice(self, access, data)
    }

    /// `c = a + b`, element by element.
    pub fn add<T: Element>(
        &self,
        a: &Buffer<'_, T, B>,
        b: &Buffer<'_, T, B>,
        c: &mut Buffer<'_, T, B>,
    ) -> GPUResult<()> {
        self.dispatch(Operation::Add, a, b, c)
    }

    /// `c = a - b`, element by element.
    pub fn sub<T: Element>(
        &self,
        a: &Buffer<'_, T, B>,
        b: &Buffer<'_, T, B>,
        c: &mut Buffer<'_, T, B>,
    ) -> GPUResult<()> {
        self.dispatch(Operation::Subtract, a, b, c)
    }

    /// `c = a * b`, element by element.
    pub fn mul<T: Element>(
        &self,
        a: &Buffer<'_, T, B>,
        b: &Buffer<'_, T, B>,
        c: &mut Buffer<'_, T, B>,
    ) -> GPUResult<()> {
        self.dispatch(Operation::Multiply, a, b, c)
    }

    /// `c = a / b`, element by element. Integer division truncates towards zero.
    pub fn div<T: Element>(
        &self,
        a: &Buffer<'_, T, B>,
        b: &Buffer<'_, T, B>,
        c: &mut Buffer<'_, T, B>,
    ) -> GPUResult<()> {
        self.dispatch(Operation::Divide, a, b, c)
    }

    /// Runs `c = a <op> b` element by element.
    ///
    /// `a` and `b` need to be readable by the device, `c` writable, and all three need to have
    /// the same length. The kernel for `op` and `T` is compiled on first use.
    pub fn dispatch<T: Element>(
        &self,
        op: Operation,
        a: &Buffer<'_, T, B>,
        b: &Buffer<'_, T, B>,
        c: &mut Buffer<'_, T, B>,
    ) -> GPUResult<()> {
        if !self.owns(a.context) || !self.owns(b.context) || !self.owns(c.context) {
            return Err(GPUError::ForeignBuffer);
        }
        check_access("a", a.access(), Usage::Read)?;
        check_access("b", b.access(), Usage::Read)?;
        check_access("c", c.access(), Usage::Write)?;
        let length = c.len();
        for operand in [a, b] {
            if operand.len() != length {
                return Err(GPUError::SizeMismatch {
                    expected: length,
                    actual: operand.len(),
                });
            }
        }

        let key = KernelKey::new(op, T::TYPE);
        // A zero global work size is rejected by the runtime, there is nothing to compute anyway.
        if length == 0 {
            debug!("Skipping {} on empty buffers.", key);
            return Ok(());
        }
        let (Some(a), Some(b), Some(c)) = (a.memory(), b.memory(), c.memory_mut()) else {
            debug!("Skipping {} on empty buffers.", key);
            return Ok(());
        };

        match self.kernel_cache {
            KernelCache::Enabled => {
                let mut kernels = self.kernels.borrow_mut();
                let kernel = match kernels.entry(key) {
                    Entry::Occupied(entry) => {
                        trace!("Using cached kernel {}.", key);
                        entry.into_mut()
                    }
                    Entry::Vacant(entry) => entry.insert(self.compile(key)?),
                };
                self.backend.launch(kernel, a, b, c, length)
            }
            KernelCache::Disabled => {
                let kernel = self.compile(key)?;
                self.backend.launch(&kernel, a, b, c, length)?;
                debug!("Releasing kernel {}.", key);
                drop(kernel);
                Ok(())
            }
        }
    }

    fn compile(&self, key: KernelKey) -> GPUResult<B::Kernel> {
        debug!("Building kernel {} for {}…", key, self.backend.device_name());
        let kernel = self.backend.compile(key, &key.source())?;
        debug!("Building kernel {}: done.", key);
        Ok(kernel)
    }

    fn owns(&self, context: &Context<B>) -> bool {
        ptr::eq(self, context)
    }
}

impl<B: Backend> Drop for Context<B> {
    fn drop(&mut self) {
        debug!(
            "Releasing context for {} with {} cached kernels.",
            self.backend.device_name(),
            self.kernels.get_mut().len()
        );
    }
}

fn check_access(operand: &'static str, access: Access, required: Usage) -> GPUResult<()> {
    if access.allows(required) {
        Ok(())
    } else {
        Err(GPUError::InvalidAccess {
            operand,
            access,
            required,
        })
    }
}
