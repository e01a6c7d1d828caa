//! Missing values at the JSON output boundary.
//!
//! Everything inside the transformer carries absent data as `Option::None`.
//! Only serialisation turns `None` into the `"-"` placeholder, so no output
//! leaf is ever `null`.

use serde::{Serialize, Serializer};

/// Placeholder written wherever a value is missing or underivable.
pub const MISSING: &str = "-";

/// Serialises `Some(v)` as `v` and `None` as [`MISSING`].
pub struct Dashed<'a, T>(pub &'a Option<T>);

impl<T: Serialize> Serialize for Dashed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_str(MISSING),
        }
    }
}

/// `serialize_with` adapter for optional struct fields.
pub fn or_dash<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    Dashed(value).serialize(serializer)
}

/// Round to `places` decimal places, ties to even.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}
