//! Normalisation of raw Redis replies.
//!
//! Backend replies come in many shapes (`+OK`, bulk strings, integers,
//! nil). These helpers collapse them into the small set of results the
//! session cache exposes and turn anything unexpected into a [`CacheError`].

use redis::Value;

use crate::error::{CacheError, CacheResult};

/// Interprets a status reply: `true` iff the backend acknowledged with `OK`.
pub fn single_string_reply(command: &'static str, reply: Value) -> CacheResult<bool> {
    match reply {
        Value::Okay => Ok(true),
        Value::SimpleString(status) => Ok(status == "OK"),
        Value::Nil => Ok(false),
        Value::ServerError(err) => Err(CacheError::command(command, format!("{err:?}"))),
        other => Err(CacheError::unexpected_reply(command, other)),
    }
}

/// Interprets a value reply: nil becomes `None`, strings become `Some`.
pub fn single_value_reply(command: &'static str, reply: Value) -> CacheResult<Option<String>> {
    match reply {
        Value::Nil => Ok(None),
        Value::BulkString(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| CacheError::unexpected_reply(command, e)),
        Value::SimpleString(value) => Ok(Some(value)),
        Value::VerbatimString { text, .. } => Ok(Some(text)),
        Value::ServerError(err) => Err(CacheError::command(command, format!("{err:?}"))),
        other => Err(CacheError::unexpected_reply(command, other)),
    }
}

/// Interprets an integer reply.
///
/// With `expected` set, returns whether the integer matches it; without,
/// any integer is a success.
pub fn integer_reply(
    command: &'static str,
    reply: Value,
    expected: Option<i64>,
) -> CacheResult<bool> {
    match reply {
        Value::Int(n) => Ok(expected.is_none_or(|e| n == e)),
        Value::ServerError(err) => Err(CacheError::command(command, format!("{err:?}"))),
        other => Err(CacheError::unexpected_reply(command, other)),
    }
}

/// Turns a falsy acknowledgement into a [`CacheError::Rejected`].
pub fn falsy_reply_to_error(command: &'static str, key: &str, ok: bool) -> CacheResult<()> {
    if ok {
        Ok(())
    } else {
        Err(CacheError::rejected(command, key))
    }
}
