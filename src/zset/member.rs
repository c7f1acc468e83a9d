//! Canonical member form
//!
//! Members are stored and compared as strings. Every write and every
//! read-side comparison goes through [`ToMember`] so `5`, `5.0` and `"5"`
//! name the same member.

use std::borrow::Cow;

/// Conversion to the canonical string form of a member
pub trait ToMember {
    fn to_member(&self) -> Cow<'_, str>;
}

impl ToMember for str {
    fn to_member(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl ToMember for String {
    fn to_member(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: ToMember + ?Sized> ToMember for &T {
    fn to_member(&self) -> Cow<'_, str> {
        (**self).to_member()
    }
}

macro_rules! impl_to_member_display {
    ($($t:ty),* $(,)?) => {
        $(
            impl ToMember for $t {
                fn to_member(&self) -> Cow<'_, str> {
                    Cow::Owned(self.to_string())
                }
            }
        )*
    };
}

impl_to_member_display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char);

/// Shortest round-trip digits, like a JavaScript number-to-string.
///
/// Integral values have no fractional part (`5.0` -> `"5"`). Magnitudes of
/// at least `1e21` or below `1e-6` use exponent form (`"1e+21"`, `"1.5e-7"`).
fn float_member(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }

    let abs = f.abs();
    if (1e-6..1e21).contains(&abs) {
        return f.to_string();
    }

    // `{:e}` yields "<digits>e<exp>" with the same shortest digits
    let sci = format!("{:e}", abs);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let sign = if f < 0.0 { "-" } else { "" };
    let exp_sign = if exp.starts_with('-') { "" } else { "+" };
    format!("{}{}e{}{}", sign, mantissa, exp_sign, exp)
}

impl ToMember for f64 {
    fn to_member(&self) -> Cow<'_, str> {
        Cow::Owned(float_member(*self))
    }
}

impl ToMember for f32 {
    fn to_member(&self) -> Cow<'_, str> {
        Cow::Owned(float_member(f64::from(*self)))
    }
}

/// Canonicalize a batch of members
pub(crate) fn to_members<M: ToMember>(members: &[M]) -> Vec<String> {
    members.iter().map(|m| m.to_member().into_owned()).collect()
}
