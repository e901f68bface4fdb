//! Scalar codec: the closed set of primitive kinds a record leaf may hold,
//! and their textual form.
//!
//! Every source that turns text into typed fields (environment variables,
//! flags, string values in config documents) goes through [`decode`]. The
//! kind set is deliberately closed: [`ScalarKind`] is an enum, not a plugin
//! point.
//!
//! Numeric decoding is base-10 and width-bounded. A value that is well-formed
//! but does not fit the target width fails with [`ParseFailure::Range`], while
//! malformed text fails with [`ParseFailure::Syntax`], so callers can tell the
//! two apart. Floating point and complex values always encode with exactly
//! four fractional digits.

use std::fmt;
use std::num::IntErrorKind;

use thiserror::Error;

/// A complex number as a real/imaginary pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex<F> {
    pub re: F,
    pub im: F,
}

impl<F> Complex<F> {
    pub const fn new(re: F, im: F) -> Self {
        Self { re, im }
    }
}

pub type Complex32 = Complex<f32>;
pub type Complex64 = Complex<f64>;

/// The primitive kinds a leaf field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Complex32,
    Complex64,
    String,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::Isize => "isize",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::Usize => "usize",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Complex32 => "complex32",
            ScalarKind::Complex64 => "complex64",
            ScalarKind::String => "string",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded scalar value, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    Complex32(Complex32),
    Complex64(Complex64),
    String(String),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::I8(_) => ScalarKind::I8,
            Scalar::I16(_) => ScalarKind::I16,
            Scalar::I32(_) => ScalarKind::I32,
            Scalar::I64(_) => ScalarKind::I64,
            Scalar::Isize(_) => ScalarKind::Isize,
            Scalar::U8(_) => ScalarKind::U8,
            Scalar::U16(_) => ScalarKind::U16,
            Scalar::U32(_) => ScalarKind::U32,
            Scalar::U64(_) => ScalarKind::U64,
            Scalar::Usize(_) => ScalarKind::Usize,
            Scalar::F32(_) => ScalarKind::F32,
            Scalar::F64(_) => ScalarKind::F64,
            Scalar::Complex32(_) => ScalarKind::Complex32,
            Scalar::Complex64(_) => ScalarKind::Complex64,
            Scalar::String(_) => ScalarKind::String,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}

/// Why a textual value could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("invalid syntax")]
    Syntax,
    #[error("value out of range")]
    Range,
}

/// A textual value that could not be decoded into the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value {input:?}: {reason}")]
pub struct ParseError {
    pub input: String,
    pub kind: ScalarKind,
    pub reason: ParseFailure,
}

impl ParseError {
    fn new(input: &str, kind: ScalarKind, reason: ParseFailure) -> Self {
        Self {
            input: input.to_string(),
            kind,
            reason,
        }
    }
}

/// Rust types that map one-to-one onto a [`ScalarKind`].
pub trait ScalarValue: Sized {
    const KIND: ScalarKind;

    fn into_scalar(self) -> Scalar;

    fn from_scalar(scalar: Scalar) -> Option<Self>;
}

macro_rules! scalar_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ScalarValue for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                fn from_scalar(scalar: Scalar) -> Option<Self> {
                    match scalar {
                        Scalar::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_value! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    Complex32 => Complex32,
    Complex64 => Complex64,
    String => String,
}

/// Decode `text` into a scalar of the given kind.
pub fn decode(text: &str, kind: ScalarKind) -> Result<Scalar, ParseError> {
    let fail = |reason| ParseError::new(text, kind, reason);
    match kind {
        ScalarKind::Bool => parse_bool(text).map(Scalar::Bool).ok_or(fail(ParseFailure::Syntax)),
        ScalarKind::I8 => parse_int(text).map(Scalar::I8).map_err(fail),
        ScalarKind::I16 => parse_int(text).map(Scalar::I16).map_err(fail),
        ScalarKind::I32 => parse_int(text).map(Scalar::I32).map_err(fail),
        ScalarKind::I64 => parse_int(text).map(Scalar::I64).map_err(fail),
        ScalarKind::Isize => parse_int(text).map(Scalar::Isize).map_err(fail),
        ScalarKind::U8 => parse_int(text).map(Scalar::U8).map_err(fail),
        ScalarKind::U16 => parse_int(text).map(Scalar::U16).map_err(fail),
        ScalarKind::U32 => parse_int(text).map(Scalar::U32).map_err(fail),
        ScalarKind::U64 => parse_int(text).map(Scalar::U64).map_err(fail),
        ScalarKind::Usize => parse_int(text).map(Scalar::Usize).map_err(fail),
        ScalarKind::F32 => parse_float::<f32>(text).map(Scalar::F32).map_err(fail),
        ScalarKind::F64 => parse_float::<f64>(text).map(Scalar::F64).map_err(fail),
        ScalarKind::Complex32 => parse_complex::<f32>(text)
            .map(Scalar::Complex32)
            .map_err(fail),
        ScalarKind::Complex64 => parse_complex::<f64>(text)
            .map(Scalar::Complex64)
            .map_err(fail),
        ScalarKind::String => Ok(Scalar::String(text.to_string())),
    }
}

/// Encode a scalar into its textual form.
pub fn encode(value: &Scalar) -> String {
    match value {
        Scalar::Bool(v) => v.to_string(),
        Scalar::I8(v) => v.to_string(),
        Scalar::I16(v) => v.to_string(),
        Scalar::I32(v) => v.to_string(),
        Scalar::I64(v) => v.to_string(),
        Scalar::Isize(v) => v.to_string(),
        Scalar::U8(v) => v.to_string(),
        Scalar::U16(v) => v.to_string(),
        Scalar::U32(v) => v.to_string(),
        Scalar::U64(v) => v.to_string(),
        Scalar::Usize(v) => v.to_string(),
        Scalar::F32(v) => format!("{v:.4}"),
        Scalar::F64(v) => format!("{v:.4}"),
        Scalar::Complex32(c) => format!("({:.4}{:+.4}i)", c.re, c.im),
        Scalar::Complex64(c) => format!("({:.4}{:+.4}i)", c.re, c.im),
        Scalar::String(v) => v.clone(),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_int<I>(text: &str) -> Result<I, ParseFailure>
where
    I: std::str::FromStr<Err = std::num::ParseIntError>,
{
    text.parse::<I>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ParseFailure::Range,
        _ => ParseFailure::Syntax,
    })
}

trait Float: std::str::FromStr + Copy + Default {
    fn is_infinite(self) -> bool;
    fn one() -> Self;
    fn neg(self) -> Self;
}

impl Float for f32 {
    fn is_infinite(self) -> bool {
        f32::is_infinite(self)
    }
    fn one() -> Self {
        1.0
    }
    fn neg(self) -> Self {
        -self
    }
}

impl Float for f64 {
    fn is_infinite(self) -> bool {
        f64::is_infinite(self)
    }
    fn one() -> Self {
        1.0
    }
    fn neg(self) -> Self {
        -self
    }
}

fn parse_float<F: Float>(text: &str) -> Result<F, ParseFailure> {
    let value = text.parse::<F>().map_err(|_| ParseFailure::Syntax)?;
    if value.is_infinite() && !names_infinity(text) {
        return Err(ParseFailure::Range);
    }
    Ok(value)
}

fn names_infinity(text: &str) -> bool {
    let unsigned = text.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

/// Accepts `a`, `bi`, `a+bi` and `a-bi`, optionally wrapped in parentheses.
fn parse_complex<F: Float>(text: &str) -> Result<Complex<F>, ParseFailure> {
    let body = match text.strip_prefix('(') {
        Some(inner) => inner.strip_suffix(')').ok_or(ParseFailure::Syntax)?,
        None => text,
    };
    if body.is_empty() {
        return Err(ParseFailure::Syntax);
    }

    let Some(imaginary) = body.strip_suffix('i') else {
        return Ok(Complex::new(parse_float(body)?, F::default()));
    };

    match split_imaginary(imaginary) {
        Some(at) => {
            let re = parse_float(&imaginary[..at])?;
            let im = parse_imaginary(&imaginary[at..])?;
            Ok(Complex::new(re, im))
        }
        None => Ok(Complex::new(F::default(), parse_imaginary(imaginary)?)),
    }
}

/// Byte offset of the sign separating the real part from the imaginary part.
fn split_imaginary(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'))
}

fn parse_imaginary<F: Float>(text: &str) -> Result<F, ParseFailure> {
    match text {
        "" | "+" => Ok(F::one()),
        "-" => Ok(F::one().neg()),
        _ => parse_float(text),
    }
}
