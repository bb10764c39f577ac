use std::fmt;
use std::marker::PhantomData;

use log::debug;

use crate::backend::{Access, Backend};
use crate::context::Context;
use crate::element::{self, Element};
use crate::error::{GPUError, GPUResult};

/// A typed allocation in device memory.
///
/// A buffer borrows the [`Context`] it was created with, hence it cannot outlive it or be used
/// with any other context. The device memory is released when the buffer is dropped.
///
/// Buffers can't be cloned. [`Buffer::take`] moves the allocation into a new buffer and leaves
/// an empty one behind.
pub struct Buffer<'a, T: Element, B: Backend> {
    pub(crate) context: &'a Context<B>,
    memory: Option<B::Memory>,
    access: Access,
    /// The number of T-sized elements.
    length: usize,
    _phantom: PhantomData<T>,
}

impl<'a, T: Element, B: Backend> Buffer<'a, T, B> {
    /// Allocates a buffer on the device of `context` and uploads `data` into it.
    pub fn from_slice(context: &'a Context<B>, access: Access, data: &[T]) -> GPUResult<Self> {
        debug!(
            "Allocating {} buffer of {} {} elements.",
            access,
            data.len(),
            T::TYPE
        );
        let memory = context
            .backend()
            .allocate(access, element::as_bytes(data))?;
        Ok(Self {
            context,
            memory: Some(memory),
            access,
            length: data.len(),
            _phantom: PhantomData,
        })
    }

    /// Returns the access mode the buffer was created with.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns whether the buffer holds no elements, e.g. after it was taken.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Moves the allocation into a new buffer.
    ///
    /// `self` is left without an allocation and a length of zero. Reading or dropping it doesn't
    /// touch the device anymore.
    pub fn take(&mut self) -> Self {
        Self {
            context: self.context,
            memory: self.memory.take(),
            access: self.access,
            length: std::mem::replace(&mut self.length, 0),
            _phantom: PhantomData,
        }
    }

    /// Reads the buffer from the device into `data`.
    ///
    /// `data` needs to have exactly as many elements as the buffer.
    pub fn read(&self, data: &mut [T]) -> GPUResult<()> {
        if data.len() != self.length {
            return Err(GPUError::SizeMismatch {
                expected: self.length,
                actual: data.len(),
            });
        }
        match &self.memory {
            Some(memory) if self.length > 0 => self
                .context
                .backend()
                .read(memory, element::as_bytes_mut(data)),
            _ => Ok(()),
        }
    }

    /// Reads the buffer from the device into `data`, which is resized to the buffer's length.
    pub fn read_into_vec(&self, data: &mut Vec<T>) -> GPUResult<()> {
        data.clear();
        data.resize(self.length, T::default());
        self.read(data)
    }

    /// Reads the buffer from the device into a new vector.
    pub fn to_vec(&self) -> GPUResult<Vec<T>> {
        let mut data = vec![T::default(); self.length];
        self.read(&mut data)?;
        Ok(data)
    }

    pub(crate) fn memory(&self) -> Option<&B::Memory> {
        self.memory.as_ref()
    }

    pub(crate) fn memory_mut(&mut self) -> Option<&mut B::Memory> {
        self.memory.as_mut()
    }
}

impl<T: Element, B: Backend> fmt::Debug for Buffer<'_, T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("type", &T::TYPE)
            .field("access", &self.access)
            .field("length", &self.length)
            .field("allocated", &self.memory.is_some())
            .finish()
    }
}
