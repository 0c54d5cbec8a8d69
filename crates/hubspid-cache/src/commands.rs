//! Redis commands shared by the single-node and cluster adapters.

use redis::Value;
use redis::aio::ConnectionLike;

use crate::error::{CacheError, CacheResult};
use crate::reply::{falsy_reply_to_error, integer_reply, single_string_reply, single_value_reply};

pub(crate) async fn get<C>(conn: &mut C, key: &str) -> CacheResult<Option<String>>
where
    C: ConnectionLike + Send,
{
    let reply: Value = redis::cmd("GET")
        .arg(key)
        .query_async(conn)
        .await
        .map_err(|e| CacheError::command("GET", e))?;
    single_value_reply("GET", reply)
}

pub(crate) async fn set_ex<C>(conn: &mut C, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()>
where
    C: ConnectionLike + Send,
{
    if ttl_seconds == 0 {
        return Err(CacheError::invalid_expiration(key));
    }

    let reply: Value = redis::cmd("SET")
        .arg(key)
        .arg(value)
        .arg("EX")
        .arg(ttl_seconds)
        .query_async(conn)
        .await
        .map_err(|e| CacheError::command("SET", e))?;
    let acknowledged = single_string_reply("SET", reply)?;
    falsy_reply_to_error("SET", key, acknowledged)
}

pub(crate) async fn del<C>(conn: &mut C, key: &str) -> CacheResult<bool>
where
    C: ConnectionLike + Send,
{
    let reply: Value = redis::cmd("DEL")
        .arg(key)
        .query_async(conn)
        .await
        .map_err(|e| CacheError::command("DEL", e))?;
    integer_reply("DEL", reply, Some(1))
}

pub(crate) async fn exists<C>(conn: &mut C, key: &str) -> CacheResult<bool>
where
    C: ConnectionLike + Send,
{
    let reply: Value = redis::cmd("EXISTS")
        .arg(key)
        .query_async(conn)
        .await
        .map_err(|e| CacheError::command("EXISTS", e))?;
    integer_reply("EXISTS", reply, Some(1))
}

pub(crate) async fn ping<C>(conn: &mut C) -> CacheResult<bool>
where
    C: ConnectionLike + Send,
{
    let reply: Value = redis::cmd("PING")
        .query_async(conn)
        .await
        .map_err(|e| CacheError::command("PING", e))?;
    match reply {
        Value::SimpleString(ref status) if status == "PONG" => Ok(true),
        Value::BulkString(ref bytes) if bytes.as_slice() == b"PONG" => Ok(true),
        other => Err(CacheError::unexpected_reply("PING", other)),
    }
}
