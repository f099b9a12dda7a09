//! Delegate to `zvariant` for the variant serialization format itself: the
//! codec only needs to move opaque typed values in and out of byte runs.
//!
//! Grounded in the teacher's `variant.rs`/`variant/{encode,decode}.rs`, which
//! use the exact same `zvariant::serialized::Context::new_gvariant` +
//! `zvariant::gvariant::Deserializer` pairing this module uses. The teacher's
//! version is generic over a Rust type `T: zvariant::Type + Serialize`;
//! this one is monomorphic over `zvariant::OwnedValue` because the tree
//! stores a dynamically typed value per node (the on-disk signature is
//! discovered while parsing, not known at compile time), so it decodes with
//! `Value`'s own signature (`"v"`) rather than a caller-chosen `T`.

use crate::endian::Endian;
use crate::error::{Error, Result};

/// An opaque, typed leaf value, exactly as spec.md §4.F's `Variant` contract
/// describes: callers can decode it from bytes, store it back to bytes,
/// byteswap it, and print it, without the codec knowing its GVariant type.
#[derive(Debug, Clone)]
pub struct Variant {
    value: zvariant::OwnedValue,
}

impl Variant {
    pub fn from_owned_value(value: zvariant::OwnedValue) -> Self {
        Self { value }
    }

    pub fn into_owned_value(self) -> zvariant::OwnedValue {
        self.value
    }

    pub fn as_owned_value(&self) -> &zvariant::OwnedValue {
        &self.value
    }

    /// Decode a gvariant-framed `VARIANT` container from `bytes`. `trusted`
    /// is forwarded to nothing in `zvariant` today (it does not expose a
    /// distinct untrusted-decode path for dynamic values), matching the
    /// byte-view rule that a trust flag never bypasses bounds/alignment
    /// checks -- those already happened in `byteview::deref` before these
    /// bytes reached here.
    pub fn from_bytes(bytes: &[u8], endian: Endian, _trusted: bool) -> Result<Self> {
        let context = zvariant::serialized::Context::new_gvariant(endian.into(), 0);
        let value: zvariant::Value = zvariant::from_slice(bytes, context)?;
        Ok(Self {
            value: value.try_to_owned()?,
        })
    }

    /// Re-serialize and re-deserialize through the gvariant normal form,
    /// matching `zvariant`'s own normalization of container padding and
    /// framing offsets.
    pub fn normal_form(&self, endian: Endian) -> Result<Self> {
        let bytes = self.to_bytes(endian)?;
        Self::from_bytes(&bytes, endian, true)
    }

    fn to_bytes(&self, endian: Endian) -> Result<Vec<u8>> {
        let context = zvariant::serialized::Context::new_gvariant(endian.into(), 0);
        let value: zvariant::Value = (&self.value).into();
        Ok(zvariant::to_bytes(context, &value)?.to_vec())
    }

    pub fn size(&self, endian: Endian) -> Result<usize> {
        Ok(self.to_bytes(endian)?.len())
    }

    pub fn store(&self, buf: &mut Vec<u8>, endian: Endian) -> Result<()> {
        buf.extend_from_slice(&self.to_bytes(endian)?);
        Ok(())
    }

    /// Re-encode this value for the opposite byte order, producing a new
    /// `Variant` whose stored bytes are laid out for `endian`.
    pub fn byteswap(&self, endian: Endian) -> Result<Self> {
        self.normal_form(endian)
    }

    /// Single-line text rendering, matching `zvariant::Value`'s own
    /// `Display` (GVariant text format), which is what the variant
    /// library's `print` routine maps onto here.
    pub fn print(&self) -> String {
        format!("{}", self.value)
    }
}

impl From<zvariant::OwnedValue> for Variant {
    fn from(value: zvariant::OwnedValue) -> Self {
        Self::from_owned_value(value)
    }
}

impl TryFrom<Variant> for zvariant::OwnedValue {
    type Error = Error;

    fn try_from(variant: Variant) -> Result<Self> {
        Ok(variant.into_owned_value())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_string() {
        let owned: zvariant::OwnedValue = zvariant::Value::from("hello").try_to_owned().unwrap();
        let variant = Variant::from_owned_value(owned);

        let bytes = variant.to_bytes(Endian::Little).unwrap();
        let back = Variant::from_bytes(&bytes, Endian::Little, true).unwrap();

        assert_eq!(variant.print(), back.print());
    }

    #[test]
    fn round_trips_an_i32() {
        let owned: zvariant::OwnedValue = zvariant::Value::from(42i32).try_to_owned().unwrap();
        let variant = Variant::from_owned_value(owned);
        let bytes = variant.to_bytes(Endian::Big).unwrap();
        let back = Variant::from_bytes(&bytes, Endian::Big, true).unwrap();
        assert_eq!(variant.print(), back.print());
    }
}
