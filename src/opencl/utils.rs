use log::{debug, warn};
use once_cell::sync::Lazy;
use opencl3::error_codes::ClError;
use opencl3::platform::get_platforms;

use crate::error::{GPUError, GPUResult};
use crate::kernel::KernelKey;

use super::Platform;

/// Status returned by the ICD loader when no vendor runtime is installed.
const CL_PLATFORM_NOT_FOUND_KHR: i32 = -1001;

// If no platforms are available, querying the list can be very slow (10 seconds in practice).
// Only check once, and avoid the expensive lookup just to find nothing.
static PLATFORMS_AVAILABLE: Lazy<bool> = Lazy::new(|| match get_platforms() {
    Ok(platforms) => !platforms.is_empty(),
    Err(error) => {
        debug!("Cannot list OpenCL platforms: {}", error);
        false
    }
});

/// Returns a closure that turns an OpenCL status into a [`GPUError::Native`] for `call`.
pub(crate) fn native(call: &'static str) -> impl Fn(ClError) -> GPUError {
    move |ClError(code)| GPUError::Native { call, code }
}

/// Get a list of all OpenCL platforms, including the devices they expose.
pub(crate) fn build_platform_list() -> GPUResult<Vec<Platform>> {
    if !*PLATFORMS_AVAILABLE {
        return Err(GPUError::NoPlatforms);
    }
    let platforms: Vec<Platform> = check_platforms(get_platforms())?
        .into_iter()
        .map(Platform::new)
        .collect();
    debug!("loaded platforms: {:?}", platforms);
    Ok(platforms)
}

/// Maps the result of `clGetPlatformIDs`, a missing ICD or an empty list means no platforms.
fn check_platforms<P>(platforms: Result<Vec<P>, ClError>) -> GPUResult<Vec<P>> {
    match platforms {
        Ok(platforms) if platforms.is_empty() => {
            warn!("OpenCL runtime reports an empty platform list.");
            Err(GPUError::NoPlatforms)
        }
        Ok(platforms) => Ok(platforms),
        Err(ClError(CL_PLATFORM_NOT_FOUND_KHR)) => Err(GPUError::NoPlatforms),
        Err(error) => Err(native("clGetPlatformIDs")(error)),
    }
}

/// Picks the device at `index`.
pub(crate) fn select_device<D>(devices: &[D], index: usize) -> GPUResult<&D> {
    if devices.is_empty() {
        return Err(GPUError::NoDevices);
    }
    devices.get(index).ok_or(GPUError::DeviceNotFound(index))
}

/// The error for a failed program build. The build status is kept even if the log is unavailable.
pub(crate) fn build_failure(key: KernelKey, code: i32, log: Result<String, ClError>) -> GPUError {
    let log = log.unwrap_or_else(|error| {
        warn!("Cannot read the build log of {}: {}", key, error);
        String::new()
    });
    GPUError::Build {
        kernel: key.name(),
        code,
        log,
    }
}

#[cfg(test)]
mod tests {
    use opencl3::error_codes::ClError;

    use super::{build_failure, check_platforms, select_device, CL_PLATFORM_NOT_FOUND_KHR};
    use crate::element::ElementType;
    use crate::error::GPUError;
    use crate::kernel::{KernelKey, Operation};

    #[test]
    fn test_check_platforms() {
        assert_eq!(check_platforms(Ok(vec![1, 2])).unwrap(), [1, 2]);
        assert!(matches!(
            check_platforms::<u8>(Ok(Vec::new())),
            Err(GPUError::NoPlatforms)
        ));
        assert!(matches!(
            check_platforms::<u8>(Err(ClError(CL_PLATFORM_NOT_FOUND_KHR))),
            Err(GPUError::NoPlatforms)
        ));
        // CL_OUT_OF_HOST_MEMORY
        assert!(matches!(
            check_platforms::<u8>(Err(ClError(-6))),
            Err(GPUError::Native {
                call: "clGetPlatformIDs",
                code: -6
            })
        ));
    }

    #[test]
    fn test_select_device() {
        let devices = ["gpu", "cpu"];
        assert_eq!(select_device(&devices[..], 0).unwrap(), &"gpu");
        assert_eq!(select_device(&devices[..], 1).unwrap(), &"cpu");
        assert!(matches!(
            select_device(&devices[..], 2),
            Err(GPUError::DeviceNotFound(2))
        ));

        let none: [&str; 0] = [];
        assert!(matches!(select_device(&none[..], 0), Err(GPUError::NoDevices)));
        assert!(matches!(select_device(&none[..], 3), Err(GPUError::NoDevices)));
    }

    #[test]
    fn test_build_failure_keeps_status() {
        let key = KernelKey::new(Operation::Divide, ElementType::Float64);
        match build_failure(key, -11, Ok("error: double unsupported".to_string())) {
            GPUError::Build { kernel, code, log } => {
                assert_eq!(kernel, "div_float64");
                assert_eq!(code, -11);
                assert_eq!(log, "error: double unsupported");
            }
            other => panic!("Expected a build error, got {:?}", other),
        }

        // CL_INVALID_DEVICE while reading the log.
        match build_failure(key, -11, Err(ClError(-33))) {
            GPUError::Build { code, log, .. } => {
                assert_eq!(code, -11);
                assert!(log.is_empty());
            }
            other => panic!("Expected a build error, got {:?}", other),
        }
    }
}
