//! Element types and the promotion algebra between them.
//!
//! Scalars follow numpy's `promote_types` table with one deliberate deviation: combining a
//! 32-bit integer with a 32-bit float yields a 32-bit float rather than a double. Structured
//! types (which is how vector types are represented) take over from any scalar they are combined
//! with; two structured types only combine if they are identical. Opaque types never promote.
use crate::common::Result;
use itertools::Itertools;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Class {
    Bool,
    Signed,
    Unsigned,
    Float,
    Complex,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 13] = [
        ScalarKind::Bool,
        ScalarKind::Int8,
        ScalarKind::Int16,
        ScalarKind::Int32,
        ScalarKind::Int64,
        ScalarKind::UInt8,
        ScalarKind::UInt16,
        ScalarKind::UInt32,
        ScalarKind::UInt64,
        ScalarKind::Float32,
        ScalarKind::Float64,
        ScalarKind::Complex64,
        ScalarKind::Complex128,
    ];

    fn class(self) -> Class {
        use ScalarKind::*;
        match self {
            Bool => Class::Bool,
            Int8 | Int16 | Int32 | Int64 => Class::Signed,
            UInt8 | UInt16 | UInt32 | UInt64 => Class::Unsigned,
            Float32 | Float64 => Class::Float,
            Complex64 | Complex128 => Class::Complex,
        }
    }

    /// Width in bits; for complex types this is the width of one component.
    fn bits(self) -> u32 {
        use ScalarKind::*;
        match self {
            Bool | Int8 | UInt8 => 8,
            Int16 | UInt16 => 16,
            Int32 | UInt32 | Float32 | Complex64 => 32,
            Int64 | UInt64 | Float64 | Complex128 => 64,
        }
    }

    fn signed(bits: u32) -> Option<ScalarKind> {
        use ScalarKind::*;
        Some(match bits {
            8 => Int8,
            16 => Int16,
            32 => Int32,
            64 => Int64,
            _ => return None,
        })
    }

    fn float(bits: u32) -> ScalarKind {
        if bits <= 32 {
            ScalarKind::Float32
        } else {
            ScalarKind::Float64
        }
    }

    fn complex(bits: u32) -> ScalarKind {
        if bits <= 32 {
            ScalarKind::Complex64
        } else {
            ScalarKind::Complex128
        }
    }

    /// The narrowest float that holds every value of an integer type. There is no half-precision
    /// float here, so 8- and 16-bit integers land on float32.
    fn min_float_bits(self) -> u32 {
        if self.bits() <= 16 {
            32
        } else {
            64
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self.class(), Class::Signed | Class::Unsigned)
    }

    pub fn is_complex(self) -> bool {
        self.class() == Class::Complex
    }

    pub fn is_float(self) -> bool {
        self.class() == Class::Float
    }

    pub fn name(self) -> &'static str {
        use ScalarKind::*;
        match self {
            Bool => "bool",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            UInt8 => "uint8",
            UInt16 => "uint16",
            UInt32 => "uint32",
            UInt64 => "uint64",
            Float32 => "float32",
            Float64 => "float64",
            Complex64 => "complex64",
            Complex128 => "complex128",
        }
    }

    /// The real type underlying a complex type; other types map to themselves.
    pub fn real_part(self) -> ScalarKind {
        match self {
            ScalarKind::Complex64 => ScalarKind::Float32,
            ScalarKind::Complex128 => ScalarKind::Float64,
            s => s,
        }
    }
}

/// numpy's `promote_types`, except for the int32/float32 override.
pub fn promote_scalar(a: ScalarKind, b: ScalarKind) -> ScalarKind {
    use ScalarKind::*;
    if a == b {
        return a;
    }
    if let (Int32, Float32) | (Float32, Int32) = (a, b) {
        // numpy makes this a double.
        return Float32;
    }
    // order the pair so that only one arm per combination of classes is needed
    let (lo, hi) = if rank(a) <= rank(b) { (a, b) } else { (b, a) };
    match (lo.class(), hi.class()) {
        (Class::Bool, _) => hi,
        (Class::Signed, Class::Signed)
        | (Class::Unsigned, Class::Unsigned)
        | (Class::Float, Class::Float)
        | (Class::Complex, Class::Complex) => {
            if lo.bits() >= hi.bits() {
                lo
            } else {
                hi
            }
        }
        (Class::Signed, Class::Unsigned) | (Class::Unsigned, Class::Signed) => {
            let (s, u) = if lo.class() == Class::Signed {
                (lo, hi)
            } else {
                (hi, lo)
            };
            if s.bits() > u.bits() {
                s
            } else {
                ScalarKind::signed(u.bits() * 2).unwrap_or(Float64)
            }
        }
        (Class::Signed, Class::Float) | (Class::Unsigned, Class::Float) => {
            ScalarKind::float(lo.min_float_bits().max(hi.bits()))
        }
        (Class::Signed, Class::Complex) | (Class::Unsigned, Class::Complex) => {
            ScalarKind::complex(lo.min_float_bits().max(hi.bits()))
        }
        (Class::Float, Class::Complex) => ScalarKind::complex(lo.bits().max(hi.bits())),
        // `rank` puts these in the other order
        (_, Class::Bool)
        | (Class::Float, Class::Signed)
        | (Class::Float, Class::Unsigned)
        | (Class::Complex, _) => unreachable!("unordered promotion pair {:?} {:?}", lo, hi),
    }
}

fn rank(s: ScalarKind) -> u32 {
    match s.class() {
        Class::Bool => 0,
        Class::Signed | Class::Unsigned => 1,
        Class::Float => 2,
        Class::Complex => 3,
    }
}

/// numpy's `can_cast(from, to, casting="safe")`: every value of `from` is representable in `to`.
pub fn can_cast_scalar(from: ScalarKind, to: ScalarKind) -> bool {
    if from == to {
        return true;
    }
    match (from.class(), to.class()) {
        (Class::Bool, _) => true,
        (_, Class::Bool) => false,
        (Class::Signed, Class::Signed) | (Class::Unsigned, Class::Unsigned) => {
            to.bits() >= from.bits()
        }
        (Class::Unsigned, Class::Signed) => to.bits() > from.bits(),
        (Class::Signed, Class::Unsigned) => false,
        (Class::Signed, Class::Float)
        | (Class::Unsigned, Class::Float)
        | (Class::Signed, Class::Complex)
        | (Class::Unsigned, Class::Complex) => from.min_float_bits() <= to.bits(),
        (Class::Float, Class::Float)
        | (Class::Float, Class::Complex)
        | (Class::Complex, Class::Complex) => to.bits() >= from.bits(),
        (Class::Float, _) | (Class::Complex, _) => false,
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ElementType {
    Scalar(ScalarKind),
    /// A structured layout; vector types are structs with one field per lane.
    Struct {
        name: String,
        fields: Vec<(String, ElementType)>,
    },
    /// A target-specific type with no known layout.
    Opaque(String),
}

pub const BOOL: ElementType = ElementType::Scalar(ScalarKind::Bool);
pub const INT8: ElementType = ElementType::Scalar(ScalarKind::Int8);
pub const INT16: ElementType = ElementType::Scalar(ScalarKind::Int16);
pub const INT32: ElementType = ElementType::Scalar(ScalarKind::Int32);
pub const INT64: ElementType = ElementType::Scalar(ScalarKind::Int64);
pub const UINT8: ElementType = ElementType::Scalar(ScalarKind::UInt8);
pub const UINT16: ElementType = ElementType::Scalar(ScalarKind::UInt16);
pub const UINT32: ElementType = ElementType::Scalar(ScalarKind::UInt32);
pub const UINT64: ElementType = ElementType::Scalar(ScalarKind::UInt64);
pub const FLOAT32: ElementType = ElementType::Scalar(ScalarKind::Float32);
pub const FLOAT64: ElementType = ElementType::Scalar(ScalarKind::Float64);
pub const COMPLEX64: ElementType = ElementType::Scalar(ScalarKind::Complex64);
pub const COMPLEX128: ElementType = ElementType::Scalar(ScalarKind::Complex128);

/// Comparisons and logical operators produce this type. A native boolean has an
/// indeterminate memory layout on several targets.
pub const BOOL_REPR: ElementType = INT32;

/// Integer literals are typed at the first of these that holds them.
pub(crate) const INT_CONSTANT_LADDER: [ScalarKind; 2] = [ScalarKind::Int32, ScalarKind::Int64];

impl From<ScalarKind> for ElementType {
    fn from(s: ScalarKind) -> ElementType {
        ElementType::Scalar(s)
    }
}

impl ElementType {
    pub fn vector(base: ScalarKind, lanes: usize) -> ElementType {
        const LANES: [&str; 4] = ["x", "y", "z", "w"];
        let fields = (0..lanes)
            .map(|i| {
                let name = match LANES.get(i) {
                    Some(l) => String::from(*l),
                    None => format!("s{}", i),
                };
                (name, ElementType::Scalar(base))
            })
            .collect();
        ElementType::Struct {
            name: format!("{}{}", base.name(), lanes),
            fields,
        }
    }

    pub fn scalar(&self) -> Option<ScalarKind> {
        match self {
            ElementType::Scalar(s) => Some(*s),
            ElementType::Struct { .. } | ElementType::Opaque(_) => None,
        }
    }

    /// Integers of either signedness. Booleans are not integral.
    pub fn is_integral(&self) -> bool {
        self.scalar().map_or(false, ScalarKind::is_integral)
    }

    /// Anything arithmetic can be performed on: every scalar except bool.
    pub fn is_numeric(&self) -> bool {
        self.scalar().map_or(false, |s| s != ScalarKind::Bool)
    }

    pub fn is_complex(&self) -> bool {
        self.scalar().map_or(false, ScalarKind::is_complex)
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, ElementType::Opaque(_))
    }

    pub fn field(&self, name: &str) -> Option<&ElementType> {
        match self {
            ElementType::Struct { fields, .. } => {
                fields.iter().find(|(f, _)| f == name).map(|(_, ty)| ty)
            }
            ElementType::Scalar(_) | ElementType::Opaque(_) => None,
        }
    }

    pub fn has_fields(&self) -> bool {
        matches!(self, ElementType::Struct { .. })
    }
}

/// Promote two known types. Fails when no rule relates them.
pub fn promote(a: &ElementType, b: &ElementType) -> Result<ElementType> {
    use ElementType::*;
    match (a, b) {
        (Scalar(x), Scalar(y)) => Ok(Scalar(promote_scalar(*x, *y))),
        // the non-native type takes over, whichever side it is on
        (Scalar(_), Struct { .. }) => Ok(b.clone()),
        (Struct { .. }, Scalar(_)) => Ok(a.clone()),
        (Struct { .. }, Struct { .. }) | (Opaque(_), _) | (_, Opaque(_)) => {
            if a == b {
                Ok(a.clone())
            } else {
                type_err!("nothing known about result of operation on '{}' and '{}'", a, b)
            }
        }
    }
}

/// numpy-style safe casting lifted to element types. Non-scalar types only cast to themselves.
pub fn can_cast_safely(from: &ElementType, to: &ElementType) -> bool {
    match (from.scalar(), to.scalar()) {
        (Some(f), Some(t)) => can_cast_scalar(f, t),
        _ => from == to,
    }
}

/// Merge sibling type sets. Each entry is `None` (nothing known, consistent with anything) or a
/// single known type. The result is `None` only if no entry was known.
pub fn combine<'a>(sets: impl IntoIterator<Item = &'a Option<ElementType>>) -> Result<Option<ElementType>> {
    let known: Vec<&ElementType> = sets.into_iter().filter_map(Option::as_ref).collect();
    let first = match known.first() {
        Some(t) => *t,
        None => return Ok(None),
    };
    if known.iter().any(|t| t.is_opaque()) {
        if known.iter().all(|t| *t == first) {
            return Ok(Some(first.clone()));
        }
        return type_err!(
            "Nothing known about operations between '{}'",
            known.iter().join(", ")
        );
    }
    let mut res = first.clone();
    for t in &known[1..] {
        res = promote(&res, t)?;
    }
    Ok(Some(res))
}
