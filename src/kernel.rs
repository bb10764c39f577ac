//! Generation of the elementwise kernels.
//!
//! Every `(Operation, ElementType)` pair maps to exactly one kernel. Its name is
//! `<operation>_<type>`, e.g. `add_int32`, and its source follows a single template:
//!
//! ```text
//! __kernel void add_int32(__global const int* a, __global const int* b, __global int* c, const ulong s) {
//!     int gid = get_global_id(0);
//!     if (gid < s) c[gid] = a[gid] + b[gid];
//! }
//! ```
//!
//! The length guard protects against runtimes that round the global work size up.

use std::fmt;

use crate::element::ElementType;

/// The arithmetic operations a kernel can perform.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Operation {
    /// `c = a + b`
    Add,
    /// `c = a - b`
    Subtract,
    /// `c = a * b`
    Multiply,
    /// `c = a / b`
    Divide,
}

impl Operation {
    /// All supported operations.
    pub const ALL: [Operation; 4] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
    ];

    /// The name used as kernel name prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
            Self::Divide => "div",
        }
    }

    /// The OpenCL C operator.
    pub fn operator(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identifies a generated kernel. It's the key of a context's kernel cache.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct KernelKey {
    /// The operation.
    pub op: Operation,
    /// The element type of all three buffers.
    pub ty: ElementType,
}

impl KernelKey {
    /// Returns the key for the given pair.
    pub fn new(op: Operation, ty: ElementType) -> Self {
        Self { op, ty }
    }

    /// The kernel function name, e.g. `add_int32`.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// The OpenCL C source of the kernel.
    pub fn source(&self) -> String {
        let ty = self.ty.cl_type();
        let mut source = String::new();
        if self.ty.is_double() {
            source.push_str("#pragma OPENCL EXTENSION cl_khr_fp64 : enable\n");
        }
        source.push_str(&format!(
            "__kernel void {name}(__global const {ty}* a, __global const {ty}* b, __global {ty}* c, const ulong s) {{\
             \n    int gid = get_global_id(0);\
             \n    if (gid < s) c[gid] = a[gid] {op} b[gid];\
             \n}}",
            name = self,
            op = self.op.operator(),
        ));
        source
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.op, self.ty)
    }
}
