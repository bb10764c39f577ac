use std::fmt;
use std::mem;

use crate::kernel::Operation;

/// The element kinds a kernel can be generated for.
///
/// Half precision floats are not supported.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum ElementType {
    /// `i8`, OpenCL `char`.
    Int8,
    /// `i16`, OpenCL `short`.
    Int16,
    /// `i32`, OpenCL `int`.
    Int32,
    /// `i64`, OpenCL `long`.
    Int64,
    /// `u8`, OpenCL `uchar`.
    Uint8,
    /// `u16`, OpenCL `ushort`.
    Uint16,
    /// `u32`, OpenCL `uint`.
    Uint32,
    /// `u64`, OpenCL `ulong`.
    Uint64,
    /// `f32`, OpenCL `float`.
    Float32,
    /// `f64`, OpenCL `double`.
    Float64,
}

impl ElementType {
    /// All supported element types.
    pub const ALL: [ElementType; 10] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Float32,
        Self::Float64,
    ];

    /// The OpenCL C type the kernel is written in.
    pub fn cl_type(&self) -> &'static str {
        match self {
            Self::Int8 => "char",
            Self::Int16 => "short",
            Self::Int32 => "int",
            Self::Int64 => "long",
            Self::Uint8 => "uchar",
            Self::Uint16 => "ushort",
            Self::Uint32 => "uint",
            Self::Uint64 => "ulong",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }

    /// The name used as kernel name suffix, e.g. `int32`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Size of a single element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 => 8,
        }
    }

    /// Whether the type needs the `cl_khr_fp64` extension.
    pub fn is_double(&self) -> bool {
        *self == Self::Float64
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

mod private {
    pub trait Sealed {}
}

/// A host type that can be stored in a [`crate::Buffer`].
///
/// The trait is sealed, it is implemented for the ten primitive types listed in
/// [`ElementType`]. All of them are plain old data, which is what makes the byte views used for
/// uploads and readbacks sound.
pub trait Element: Copy + Default + fmt::Debug + PartialEq + private::Sealed + 'static {
    /// The kernel element type for this host type.
    const TYPE: ElementType;

    /// Applies `op` the way an OpenCL C kernel does: integers wrap on overflow and division
    /// truncates towards zero. Integer division by zero yields zero.
    fn apply(op: Operation, lhs: Self, rhs: Self) -> Self;

    /// Reads an element from native-endian bytes. `bytes` must be exactly one element long.
    fn from_ne_slice(bytes: &[u8]) -> Self;

    /// Writes the element as native-endian bytes. `out` must be exactly one element long.
    fn write_ne_slice(self, out: &mut [u8]);
}

macro_rules! impl_element {
    ($ty:ty, $element_type:expr, |$op:ident, $lhs:ident, $rhs:ident| $apply:expr) => {
        impl private::Sealed for $ty {}

        impl Element for $ty {
            const TYPE: ElementType = $element_type;

            fn apply($op: Operation, $lhs: Self, $rhs: Self) -> Self {
                $apply
            }

            fn from_ne_slice(bytes: &[u8]) -> Self {
                let mut raw = [0u8; mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(raw)
            }

            fn write_ne_slice(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }
        }
    };
}

macro_rules! impl_integer {
    ($($ty:ty => $element_type:expr),* $(,)?) => {
        $(
            impl_element!($ty, $element_type, |op, lhs, rhs| match op {
                Operation::Add => lhs.wrapping_add(rhs),
                Operation::Subtract => lhs.wrapping_sub(rhs),
                Operation::Multiply => lhs.wrapping_mul(rhs),
                Operation::Divide if rhs == 0 => 0,
                Operation::Divide => lhs.wrapping_div(rhs),
            });
        )*
    };
}

macro_rules! impl_float {
    ($($ty:ty => $element_type:expr),* $(,)?) => {
        $(
            impl_element!($ty, $element_type, |op, lhs, rhs| match op {
                Operation::Add => lhs + rhs,
                Operation::Subtract => lhs - rhs,
                Operation::Multiply => lhs * rhs,
                Operation::Divide => lhs / rhs,
            });
        )*
    };
}

impl_integer! {
    i8 => ElementType::Int8,
    i16 => ElementType::Int16,
    i32 => ElementType::Int32,
    i64 => ElementType::Int64,
    u8 => ElementType::Uint8,
    u16 => ElementType::Uint16,
    u32 => ElementType::Uint32,
    u64 => ElementType::Uint64,
}

impl_float! {
    f32 => ElementType::Float32,
    f64 => ElementType::Float64,
}

/// Views a slice of elements as bytes.
pub(crate) fn as_bytes<T: Element>(data: &[T]) -> &[u8] {
    // It is safe as `T` is a sealed primitive without padding or invalid bit patterns.
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, mem::size_of_val(data)) }
}

/// Views a mutable slice of elements as bytes.
pub(crate) fn as_bytes_mut<T: Element>(data: &mut [T]) -> &mut [u8] {
    // It is safe as `T` is a sealed primitive without padding or invalid bit patterns.
    unsafe {
        std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut u8, mem::size_of_val(data))
    }
}

#[cfg(test)]
mod tests {
    use super::{as_bytes, as_bytes_mut, Element, ElementType};
    use crate::kernel::Operation;

    fn check_size<T: Element>() {
        assert_eq!(T::TYPE.size(), std::mem::size_of::<T>(), "{}", T::TYPE);
    }

    #[test]
    fn test_sizes_match_host_types() {
        check_size::<i8>();
        check_size::<i16>();
        check_size::<i32>();
        check_size::<i64>();
        check_size::<u8>();
        check_size::<u16>();
        check_size::<u32>();
        check_size::<u64>();
        check_size::<f32>();
        check_size::<f64>();
    }

    #[test]
    fn test_names() {
        let names: Vec<_> = ElementType::ALL.iter().map(|ty| ty.name()).collect();
        assert_eq!(
            names,
            [
                "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64",
                "float32", "float64"
            ]
        );
        assert_eq!(ElementType::Uint64.cl_type(), "ulong");
        assert_eq!(ElementType::Int8.cl_type(), "char");
        assert_eq!(ElementType::Float32.to_string(), "float32");
    }

    #[test]
    fn test_only_double_needs_fp64() {
        let doubles: Vec<_> = ElementType::ALL
            .into_iter()
            .filter(ElementType::is_double)
            .collect();
        assert_eq!(doubles, [ElementType::Float64]);
    }

    #[test]
    fn test_integer_semantics() {
        assert_eq!(i32::apply(Operation::Divide, 30, 5), 6);
        assert_eq!(i32::apply(Operation::Divide, -7, 2), -3);
        assert_eq!(u8::apply(Operation::Add, 250, 10), 4);
        assert_eq!(u8::apply(Operation::Subtract, 1, 2), 255);
        assert_eq!(i8::apply(Operation::Multiply, 64, 2), -128);
        assert_eq!(i8::apply(Operation::Divide, i8::MIN, -1), i8::MIN);
        assert_eq!(u32::apply(Operation::Divide, 10, 0), 0);
    }

    #[test]
    fn test_float_semantics() {
        assert_eq!(f32::apply(Operation::Divide, 1.0, 4.0), 0.25);
        assert_eq!(f64::apply(Operation::Subtract, 0.5, 1.5), -1.0);
        assert!(f64::apply(Operation::Divide, 1.0, 0.0).is_infinite());
    }

    #[test]
    fn test_byte_views() {
        let mut data = [1u16, 0x0302];
        assert_eq!(as_bytes(&data).len(), 4);
        assert_eq!(u16::from_ne_slice(&as_bytes(&data)[2..]), 0x0302);

        7u16.write_ne_slice(&mut as_bytes_mut(&mut data)[..2]);
        assert_eq!(data, [7, 0x0302]);
    }
}
