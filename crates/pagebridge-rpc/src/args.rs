// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversions between native values and wire `Value`s.
//
// `EncodeArgs` turns evaluate arguments into values at the call site,
// `FromArgs` binds an inbound argument list to a handler's parameters, and
// `IntoReply` turns a handler's return value into a call result.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use pagebridge_core::error::{BridgeError, CallError, ErrorKind, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::finite::ensure_finite;

/// Convert a native value into its wire representation.
///
/// NaN and the infinities have none and fail with `Unsupported`.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    ensure_finite(value)
        .and_then(|()| serde_json::to_value(value))
        .map_err(|e| BridgeError::Unsupported(e.to_string()))
}

/// Arguments for `BridgeSession::evaluate`.
pub trait EncodeArgs {
    fn encode_args(self) -> Result<Vec<Value>>;
}

impl EncodeArgs for () {
    fn encode_args(self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

impl EncodeArgs for Vec<Value> {
    fn encode_args(self) -> Result<Vec<Value>> {
        Ok(self)
    }
}

macro_rules! encode_args_tuple {
    ($($T:ident),+) => {
        impl<$($T: Serialize),+> EncodeArgs for ($($T,)+) {
            #[allow(non_snake_case)]
            fn encode_args(self) -> Result<Vec<Value>> {
                let ($($T,)+) = self;
                Ok(vec![$(to_value(&$T)?),+])
            }
        }
    };
}

encode_args_tuple!(A1);
encode_args_tuple!(A1, A2);
encode_args_tuple!(A1, A2, A3);
encode_args_tuple!(A1, A2, A3, A4);
encode_args_tuple!(A1, A2, A3, A4, A5);
encode_args_tuple!(A1, A2, A3, A4, A5, A6);
encode_args_tuple!(A1, A2, A3, A4, A5, A6, A7);
encode_args_tuple!(A1, A2, A3, A4, A5, A6, A7, A8);

/// A parameter list a handler can be bound to.
///
/// Binding is strict: the argument count must equal the parameter count, and
/// each value must deserialize into its parameter type. Failures are
/// `TypeMismatch` errors naming the offending (zero-based) position.
pub trait FromArgs: Sized + Send + 'static {
    const ARITY: usize;

    fn from_args(args: Vec<Value>) -> std::result::Result<Self, CallError>;
}

fn check_arity(expected: usize, actual: usize) -> std::result::Result<(), CallError> {
    if expected == actual {
        Ok(())
    } else {
        Err(CallError::type_mismatch(format!(
            "expected {expected} argument(s), got {actual}"
        )))
    }
}

fn bind<T: DeserializeOwned>(
    slot: Option<(usize, Value)>,
) -> std::result::Result<T, CallError> {
    let (position, value) =
        slot.ok_or_else(|| CallError::type_mismatch("argument list ended early"))?;
    serde_json::from_value(value)
        .map_err(|e| CallError::type_mismatch(format!("argument {position}: {e}")))
}

impl FromArgs for () {
    const ARITY: usize = 0;

    fn from_args(args: Vec<Value>) -> std::result::Result<Self, CallError> {
        check_arity(Self::ARITY, args.len())
    }
}

macro_rules! from_args_tuple {
    ($arity:expr; $($T:ident),+) => {
        impl<$($T: DeserializeOwned + Send + 'static),+> FromArgs for ($($T,)+) {
            const ARITY: usize = $arity;

            fn from_args(args: Vec<Value>) -> std::result::Result<Self, CallError> {
                check_arity(Self::ARITY, args.len())?;
                let mut args = args.into_iter().enumerate();
                Ok(($(bind::<$T>(args.next())?,)+))
            }
        }
    };
}

from_args_tuple!(1; A1);
from_args_tuple!(2; A1, A2);
from_args_tuple!(3; A1, A2, A3);
from_args_tuple!(4; A1, A2, A3, A4);
from_args_tuple!(5; A1, A2, A3, A4, A5);
from_args_tuple!(6; A1, A2, A3, A4, A5, A6);
from_args_tuple!(7; A1, A2, A3, A4, A5, A6, A7);
from_args_tuple!(8; A1, A2, A3, A4, A5, A6, A7, A8);

/// Return values a handler may produce.
pub trait IntoReply {
    fn into_reply(self) -> std::result::Result<Value, CallError>;
}

fn reply_value<T: Serialize + ?Sized>(value: &T) -> std::result::Result<Value, CallError> {
    ensure_finite(value)
        .and_then(|()| serde_json::to_value(value))
        .map_err(|e| CallError::new(ErrorKind::Unsupported, e.to_string()))
}

/// Wrap any `Serialize` type to return it from a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> std::result::Result<Value, CallError> {
        reply_value(&self.0)
    }
}

/// `Err` becomes `HandlerFailed` carrying the error's message.
impl<T: Serialize, E: Display> IntoReply for std::result::Result<T, E> {
    fn into_reply(self) -> std::result::Result<Value, CallError> {
        match self {
            Ok(value) => reply_value(&value),
            Err(e) => Err(CallError::handler_failed(e.to_string())),
        }
    }
}

impl<T: Serialize> IntoReply for Option<T> {
    fn into_reply(self) -> std::result::Result<Value, CallError> {
        reply_value(&self)
    }
}

impl<T: Serialize> IntoReply for Vec<T> {
    fn into_reply(self) -> std::result::Result<Value, CallError> {
        reply_value(&self)
    }
}

impl<T: Serialize> IntoReply for HashMap<String, T> {
    fn into_reply(self) -> std::result::Result<Value, CallError> {
        reply_value(&self)
    }
}

impl<T: Serialize> IntoReply for BTreeMap<String, T> {
    fn into_reply(self) -> std::result::Result<Value, CallError> {
        reply_value(&self)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> std::result::Result<Value, CallError> {
        Ok(self)
    }
}

macro_rules! into_reply_plain {
    ($($T:ty),+ $(,)?) => {
        $(
            impl IntoReply for $T {
                fn into_reply(self) -> std::result::Result<Value, CallError> {
                    reply_value(&self)
                }
            }
        )+
    };
}

into_reply_plain!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    &'static str,
);
