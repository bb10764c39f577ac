//! The OpenCL specific implementation of a [`Platform`], [`Device`] and the
//! [`OpenclBackend`] that runs the kernels.

pub(crate) mod utils;

use std::ffi::c_void;
use std::ptr;

use log::{debug, info, warn};
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context as ClContext;
use opencl3::device::CL_DEVICE_TYPE_ALL;
use opencl3::error_codes::ClError;
use opencl3::kernel::Kernel as ClKernel;
use opencl3::memory::{
    Buffer as ClBuffer, ClMem, CL_MEM_COPY_HOST_PTR, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE,
    CL_MEM_WRITE_ONLY,
};
use opencl3::program::Program as ClProgram;
use opencl3::types::{cl_ulong, CL_BLOCKING};

use crate::backend::{Access, Backend};
use crate::context::Context;
use crate::device::DeviceKind;
use crate::error::GPUResult;
use crate::kernel::KernelKey;

use utils::native;

/// The lowest level identifier of an OpenCL device.
#[allow(non_camel_case_types)]
pub type cl_device_id = opencl3::types::cl_device_id;

/// Returns all OpenCL platforms, in the order the runtime reports them.
///
/// Fails with [`crate::GPUError::NoPlatforms`] if there are none.
pub fn list_platforms() -> GPUResult<Vec<Platform>> {
    utils::build_platform_list()
}

/// An OpenCL platform, a vendor runtime installation.
///
/// The devices are listed once, when the platform is loaded.
#[derive(Debug, Clone)]
pub struct Platform {
    platform: opencl3::platform::Platform,
    devices: Vec<Device>,
}

impl Platform {
    pub(crate) fn new(platform: opencl3::platform::Platform) -> Self {
        let devices = match platform.get_devices(CL_DEVICE_TYPE_ALL) {
            Ok(ids) => ids
                .into_iter()
                .map(|id| Device {
                    device: opencl3::device::Device::new(id),
                })
                .collect(),
            Err(error) => {
                warn!("Cannot list devices of OpenCL platform: {}", error);
                Vec::new()
            }
        };
        Self { platform, devices }
    }

    /// Returns the name of the platform, e.g. "NVIDIA CUDA".
    pub fn name(&self) -> GPUResult<String> {
        self.platform.name().map_err(native("clGetPlatformInfo"))
    }

    /// Returns the vendor of the platform.
    pub fn vendor(&self) -> GPUResult<String> {
        self.platform.vendor().map_err(native("clGetPlatformInfo"))
    }

    /// Returns the OpenCL version string of the platform, e.g. "OpenCL 3.0 CUDA 12.2.148".
    pub fn version(&self) -> GPUResult<String> {
        self.platform.version().map_err(native("clGetPlatformInfo"))
    }

    /// Returns the profile, either "FULL_PROFILE" or "EMBEDDED_PROFILE".
    pub fn profile(&self) -> GPUResult<String> {
        self.platform.profile().map_err(native("clGetPlatformInfo"))
    }

    /// Returns all devices of the platform. It's empty if they couldn't be listed.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Returns the device at `index`.
    pub fn device(&self, index: usize) -> GPUResult<&Device> {
        utils::select_device(&self.devices, index)
    }
}

/// An OpenCL device.
///
/// All properties are queried from the runtime on every call.
#[derive(Debug, Clone, Copy)]
pub struct Device {
    device: opencl3::device::Device,
}

impl Device {
    /// Returns the name of the device, e.g. "GeForce RTX 3090".
    pub fn name(&self) -> GPUResult<String> {
        self.device.name().map_err(native("clGetDeviceInfo"))
    }

    /// Returns the vendor of the device, e.g. "NVIDIA Corporation".
    pub fn vendor(&self) -> GPUResult<String> {
        self.device.vendor().map_err(native("clGetDeviceInfo"))
    }

    /// Returns the OpenCL version string of the device.
    pub fn version(&self) -> GPUResult<String> {
        self.device.version().map_err(native("clGetDeviceInfo"))
    }

    /// Returns the kind of the device.
    pub fn kind(&self) -> GPUResult<DeviceKind> {
        let bits = self.device.dev_type().map_err(native("clGetDeviceInfo"))?;
        Ok(DeviceKind::from_bits(bits))
    }

    /// Returns the number of compute units of the device.
    pub fn compute_units(&self) -> GPUResult<u32> {
        self.device
            .max_compute_units()
            .map_err(native("clGetDeviceInfo"))
    }

    /// Returns the global memory of the device in bytes.
    pub fn memory(&self) -> GPUResult<u64> {
        self.device
            .global_mem_size()
            .map_err(native("clGetDeviceInfo"))
    }

    /// Low-level access to the device identifier.
    ///
    /// It should only be used to interact with other libraries that work on the lowest OpenCL
    /// level.
    pub fn cl_device_id(&self) -> cl_device_id {
        self.device.id()
    }
}

/// A program compiled for one device, together with the kernel created from it.
pub struct OpenclKernel {
    kernel: ClKernel,
    _program: ClProgram,
}

/// An OpenCL context with a single device and its default, in-order command queue.
pub struct OpenclBackend {
    device_name: String,
    queue: CommandQueue,
    context: ClContext,
}

impl OpenclBackend {
    /// Creates the context and the command queue for `device`.
    pub fn new(platform: &Platform, device: &Device) -> GPUResult<Self> {
        let device_name = device.name()?;
        let context = ClContext::from_device(&device.device).map_err(native("clCreateContext"))?;
        let queue =
            CommandQueue::create_default(&context, 0).map_err(native("clCreateCommandQueue"))?;
        match platform.name() {
            Ok(platform_name) => info!("Opened {} on {}.", device_name, platform_name),
            Err(_) => info!("Opened {}.", device_name),
        }
        Ok(Self {
            device_name,
            queue,
            context,
        })
    }
}

impl Backend for OpenclBackend {
    type Memory = ClBuffer<u8>;
    type Kernel = OpenclKernel;

    fn device_name(&self) -> String {
        self.device_name.clone()
    }

    fn allocate(&self, access: Access, data: &[u8]) -> GPUResult<Self::Memory> {
        let flags = match access {
            Access::ReadWrite => CL_MEM_READ_WRITE,
            Access::ReadOnly => CL_MEM_READ_ONLY,
            Access::WriteOnly => CL_MEM_WRITE_ONLY,
        };
        // The host data is only copied from, never written to.
        let buffer = unsafe {
            ClBuffer::<u8>::create(
                &self.context,
                flags | CL_MEM_COPY_HOST_PTR,
                data.len(),
                data.as_ptr() as *mut c_void,
            )
        }
        .map_err(native("clCreateBuffer"))?;
        Ok(buffer)
    }

    fn read(&self, memory: &Self::Memory, data: &mut [u8]) -> GPUResult<()> {
        unsafe {
            self.queue
                .enqueue_read_buffer(memory, CL_BLOCKING, 0, data, &[])
                .map_err(native("clEnqueueReadBuffer"))?;
        }
        Ok(())
    }

    fn compile(&self, key: KernelKey, source: &str) -> GPUResult<Self::Kernel> {
        let mut program = ClProgram::create_from_source(&self.context, source)
            .map_err(native("clCreateProgramWithSource"))?;
        if let Err(ClError(code)) = program.build(self.context.devices(), "") {
            let log = program.get_build_log(self.context.devices()[0]);
            return Err(utils::build_failure(key, code, log));
        }
        debug!("Creating kernel {}.", key);
        let kernel = ClKernel::create(&program, &key.name()).map_err(native("clCreateKernel"))?;
        Ok(OpenclKernel {
            kernel,
            _program: program,
        })
    }

    fn launch(
        &self,
        kernel: &Self::Kernel,
        a: &Self::Memory,
        b: &Self::Memory,
        c: &mut Self::Memory,
        length: usize,
    ) -> GPUResult<()> {
        let kernel = &kernel.kernel;
        let size = length as cl_ulong;
        let global_work_size = [length];
        // The argument types match the generated kernel signature.
        unsafe {
            kernel
                .set_arg(0, &a.get())
                .map_err(native("clSetKernelArg"))?;
            kernel
                .set_arg(1, &b.get())
                .map_err(native("clSetKernelArg"))?;
            kernel
                .set_arg(2, &c.get())
                .map_err(native("clSetKernelArg"))?;
            kernel
                .set_arg(3, &size)
                .map_err(native("clSetKernelArg"))?;
            self.queue
                .enqueue_nd_range_kernel(
                    kernel.get(),
                    1,
                    ptr::null(),
                    global_work_size.as_ptr(),
                    ptr::null(),
                    &[],
                )
                .map_err(native("clEnqueueNDRangeKernel"))?;
        }
        Ok(())
    }
}

impl Context<OpenclBackend> {
    /// Creates a context for `device` of `platform`.
    pub fn from_device(platform: &Platform, device: &Device) -> GPUResult<Self> {
        Ok(Self::new(OpenclBackend::new(platform, device)?))
    }
}

#[cfg(test)]
mod tests {
    use super::{list_platforms, Device, Platform};
    use crate::backend::Access;
    use crate::context::{Context, KernelCache};
    use crate::error::GPUError;

    fn first_device() -> Option<(Platform, Device)> {
        let platforms = match list_platforms() {
            Ok(platforms) => platforms,
            Err(GPUError::NoPlatforms) => {
                println!("No OpenCL platform available, skipping.");
                return None;
            }
            Err(error) => panic!("Listing platforms failed: {}", error),
        };
        platforms.into_iter().find_map(|platform| {
            let device = *platform.devices().first()?;
            Some((platform, device))
        })
    }

    #[test]
    fn test_list_platforms() {
        let Some((platform, device)) = first_device() else {
            return;
        };
        println!(
            "platform: {:?} {:?} {:?} {:?}",
            platform.name(),
            platform.vendor(),
            platform.version(),
            platform.profile()
        );
        assert!(platform.device(0).is_ok());
        assert!(matches!(
            platform.device(platform.devices().len()),
            Err(GPUError::DeviceNotFound(_))
        ));
        assert!(!device.name().unwrap().is_empty());
        assert!(device.compute_units().unwrap() > 0);
        assert!(device.memory().unwrap() > 0);
        println!("device: {:?}", device.kind().unwrap());
    }

    #[test]
    fn test_add_and_div() {
        let Some((platform, device)) = first_device() else {
            return;
        };
        let context = Context::from_device(&platform, &device).unwrap();
        let a = context.create_buffer(Access::ReadOnly, &[1i32, 2, 3]).unwrap();
        let b = context.create_buffer(Access::ReadOnly, &[4i32, 5, 6]).unwrap();
        let mut c = context.create_buffer(Access::WriteOnly, &[0i32; 3]).unwrap();
        context.add(&a, &b, &mut c).unwrap();
        assert_eq!(c.to_vec().unwrap(), [5, 7, 9]);

        let a = context
            .create_buffer(Access::ReadOnly, &[10i32, 20, 30])
            .unwrap();
        let b = context.create_buffer(Access::ReadOnly, &[2i32, 4, 5]).unwrap();
        context.div(&a, &b, &mut c).unwrap();
        assert_eq!(c.to_vec().unwrap(), [5, 5, 6]);
    }

    #[test]
    #[cfg(not(feature = "no-kernel-cache"))]
    fn test_cache_on_device() {
        let Some((platform, device)) = first_device() else {
            return;
        };
        let backend = super::OpenclBackend::new(&platform, &device).unwrap();
        let context = Context::with_kernel_cache(backend, KernelCache::Enabled);
        let a = context
            .create_buffer(Access::ReadWrite, &[1.5f32, 2.5, 3.5, 4.5])
            .unwrap();
        let mut c = context.create_buffer(Access::ReadWrite, &[0f32; 4]).unwrap();
        for _ in 0..3 {
            context.mul(&a, &a, &mut c).unwrap();
        }
        assert_eq!(context.cached_kernels(), 1);
        assert_eq!(c.to_vec().unwrap(), [2.25, 6.25, 12.25, 20.25]);
    }
}
