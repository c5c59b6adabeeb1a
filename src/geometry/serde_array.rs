//! `#[serde(with = ...)]` helper for const-generic fixed-size arrays.
//!
//! serde's derive only provides `Serialize`/`Deserialize` for arrays up to a
//! fixed length, not for `[T; N]` generic over a const `N`. These functions
//! bridge that gap by treating the array as a sequence, which is the same wire
//! representation serde uses for its built-in fixed-size array impls.

use serde::de::{Deserialize, Deserializer, Error as _};
use serde::ser::{Serialize, Serializer};

pub fn serialize<S, T, const N: usize>(array: &[T; N], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    array.as_slice().serialize(serializer)
}

pub fn deserialize<'de, D, T, const N: usize>(deserializer: D) -> Result<[T; N], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let values = Vec::<T>::deserialize(deserializer)?;
    let len = values.len();
    <[T; N]>::try_from(values).map_err(|_| {
        D::Error::custom(format!("expected an array of length {N}, got {len}"))
    })
}
