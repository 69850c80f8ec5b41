//! Arithmetic element types that may be bound to kernel parameters.

use std::fmt;

// datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes
    pub const fn size(&self) -> usize {
        match self {
            DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DType::U8 => write!(f, "uchar"),
            DType::U16 => write!(f, "ushort"),
            DType::U32 => write!(f, "uint"),
            DType::U64 => write!(f, "ulong"),
            DType::I8 => write!(f, "char"),
            DType::I16 => write!(f, "short"),
            DType::I32 => write!(f, "int"),
            DType::I64 => write!(f, "long"),
            DType::F32 => write!(f, "float"),
            DType::F64 => write!(f, "double"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Primitive arithmetic types whose slices can be bound to a kernel.
///
/// Every bit pattern is a valid value for these types, which is what lets a
/// device readback overwrite the host slice byte-for-byte.
pub trait Scalar: sealed::Sealed + Copy + 'static {
    /// The corresponding DType variant
    const DTYPE: DType;
}

macro_rules! impl_scalar {
    ($($ty:ty => $dtype:expr);+ $(;)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Scalar for $ty {
                const DTYPE: DType = $dtype;
            }
        )+
    };
}

impl_scalar!(
    u8  => DType::U8;
    u16 => DType::U16;
    u32 => DType::U32;
    u64 => DType::U64;
    i8  => DType::I8;
    i16 => DType::I16;
    i32 => DType::I32;
    i64 => DType::I64;
    f32 => DType::F32;
    f64 => DType::F64;
);

#[cfg(target_pointer_width = "64")]
impl_scalar!(
    usize => DType::U64;
    isize => DType::I64;
);

#[cfg(target_pointer_width = "32")]
impl_scalar!(
    usize => DType::U32;
    isize => DType::I32;
);
