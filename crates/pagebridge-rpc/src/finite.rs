// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rejects non-finite floats before a value reaches serde_json, which would
// otherwise write them as `null`.

use serde::Serialize;
use serde::ser::{self, Error as _};

type Outcome = Result<(), serde_json::Error>;

/// Walk `value` and fail on the first NaN or infinity.
pub(crate) fn ensure_finite<T: Serialize + ?Sized>(value: &T) -> Outcome {
    value.serialize(FiniteCheck)
}

fn float(v: f64) -> Outcome {
    if v.is_finite() {
        Ok(())
    } else {
        Err(serde_json::Error::custom(format!(
            "{v} has no wire representation"
        )))
    }
}

#[derive(Clone, Copy)]
struct FiniteCheck;

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Outcome {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> Outcome {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> Outcome {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> Outcome {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> Outcome {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> Outcome {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> Outcome {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> Outcome {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> Outcome {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> Outcome {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> Outcome {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Outcome {
        float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Outcome {
        float(v)
    }

    fn serialize_char(self, _: char) -> Outcome {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> Outcome {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> Outcome {
        Ok(())
    }

    fn serialize_none(self) -> Outcome {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Outcome {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Outcome {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Outcome {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Outcome {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Outcome {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Outcome {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(self)
    }
}

macro_rules! check_elements {
    ($($Trait:ident :: $method:ident),+ $(,)?) => {
        $(
            impl ser::$Trait for FiniteCheck {
                type Ok = ();
                type Error = serde_json::Error;

                fn $method<T: Serialize + ?Sized>(&mut self, value: &T) -> Outcome {
                    value.serialize(FiniteCheck)
                }

                fn end(self) -> Outcome {
                    Ok(())
                }
            }
        )+
    };
}

check_elements!(
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
);

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Outcome {
        key.serialize(FiniteCheck)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Outcome {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Outcome {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Outcome {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Outcome {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Outcome {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Outcome {
        Ok(())
    }
}
