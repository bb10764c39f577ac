use std::fmt;

// The `cl_device_type` bits as defined by the OpenCL headers.
const DEVICE_TYPE_DEFAULT: u64 = 1 << 0;
const DEVICE_TYPE_CPU: u64 = 1 << 1;
const DEVICE_TYPE_GPU: u64 = 1 << 2;
const DEVICE_TYPE_ACCELERATOR: u64 = 1 << 3;

/// The kind of a compute device.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DeviceKind {
    /// A graphics card.
    Gpu,
    /// The host processor.
    Cpu,
    /// A dedicated accelerator, e.g. an FPGA board.
    Accelerator,
    /// The platform's default device, without a more specific kind.
    Default,
    /// None of the known kinds.
    Unknown,
}

impl DeviceKind {
    /// Classifies a device type bitmask.
    ///
    /// If several bits are set, the first match of GPU, CPU, accelerator, default wins.
    pub fn from_bits(bits: u64) -> Self {
        if bits & DEVICE_TYPE_GPU != 0 {
            Self::Gpu
        } else if bits & DEVICE_TYPE_CPU != 0 {
            Self::Cpu
        } else if bits & DEVICE_TYPE_ACCELERATOR != 0 {
            Self::Accelerator
        } else if bits & DEVICE_TYPE_DEFAULT != 0 {
            Self::Default
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Gpu => "GPU",
            Self::Cpu => "CPU",
            Self::Accelerator => "Accelerator",
            Self::Default => "Default",
            Self::Unknown => "Unknown",
        };
        write!(f, "{}", kind)
    }
}

#[cfg(test)]
mod test {
    use super::{
        DeviceKind, DEVICE_TYPE_ACCELERATOR, DEVICE_TYPE_CPU, DEVICE_TYPE_DEFAULT, DEVICE_TYPE_GPU,
    };

    #[test]
    fn test_single_bits() {
        assert_eq!(DeviceKind::from_bits(DEVICE_TYPE_GPU), DeviceKind::Gpu);
        assert_eq!(DeviceKind::from_bits(DEVICE_TYPE_CPU), DeviceKind::Cpu);
        assert_eq!(
            DeviceKind::from_bits(DEVICE_TYPE_ACCELERATOR),
            DeviceKind::Accelerator
        );
        assert_eq!(DeviceKind::from_bits(DEVICE_TYPE_DEFAULT), DeviceKind::Default);
        assert_eq!(DeviceKind::from_bits(0), DeviceKind::Unknown);
        // CL_DEVICE_TYPE_CUSTOM
        assert_eq!(DeviceKind::from_bits(1 << 4), DeviceKind::Unknown);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            DeviceKind::from_bits(DEVICE_TYPE_DEFAULT | DEVICE_TYPE_GPU),
            DeviceKind::Gpu,
            "A default GPU is a GPU."
        );
        assert_eq!(
            DeviceKind::from_bits(DEVICE_TYPE_CPU | DEVICE_TYPE_GPU),
            DeviceKind::Gpu
        );
        assert_eq!(
            DeviceKind::from_bits(DEVICE_TYPE_ACCELERATOR | DEVICE_TYPE_CPU),
            DeviceKind::Cpu
        );
        assert_eq!(
            DeviceKind::from_bits(DEVICE_TYPE_DEFAULT | DEVICE_TYPE_ACCELERATOR),
            DeviceKind::Accelerator
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(DeviceKind::Gpu.to_string(), "GPU");
        assert_eq!(DeviceKind::Unknown.to_string(), "Unknown");
    }
}
