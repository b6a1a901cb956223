//! RESP2 framing: request encoding and incremental reply decoding.

use super::GraphError;
use serde_json::Value;

/// One decoded reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// JSON view of the reply, structure preserved: arrays stay arrays, nil becomes null,
    /// bulk strings are decoded as (lossy) UTF-8.
    pub fn to_json(&self) -> Value {
        match self {
            Reply::Simple(s) | Reply::Error(s) => Value::String(s.clone()),
            Reply::Integer(n) => Value::from(*n),
            Reply::Bulk(Some(bytes)) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Reply::Bulk(None) | Reply::Array(None) => Value::Null,
            Reply::Array(Some(items)) => Value::Array(items.iter().map(Reply::to_json).collect()),
        }
    }

    /// Text of a simple or bulk string reply.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Reply::Simple(s) => Some(s.clone()),
            Reply::Bulk(Some(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[String]) -> Vec<u8> {
    let mut payload = Vec::<u8>::new();
    payload.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        let bytes = arg.as_bytes();
        payload.extend_from_slice(format!("${}\r\n", bytes.len()).as_bytes());
        payload.extend_from_slice(bytes);
        payload.extend_from_slice(b"\r\n");
    }
    payload
}

/// Largest bulk string accepted from the server (the store's own protocol limit).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Deepest array nesting accepted in one reply.
pub const MAX_DEPTH: usize = 64;

/// Progress of decoding the front of a buffer.
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    /// A full reply and the number of bytes it used.
    Complete(Reply, usize),
    /// No reply can complete until the buffer holds at least this many bytes.
    Partial(usize),
}

/// Decode one reply from the front of `buf`. Returns the reply and the number of bytes it
/// used, or None when `buf` does not yet hold a complete reply.
pub fn decode(buf: &[u8]) -> Result<Option<(Reply, usize)>, GraphError> {
    match decode_frame(buf)? {
        Frame::Complete(reply, used) => Ok(Some((reply, used))),
        Frame::Partial(_) => Ok(None),
    }
}

pub(crate) fn decode_frame(buf: &[u8]) -> Result<Frame, GraphError> {
    decode_at(buf, 0, 0)
}

fn decode_at(buf: &[u8], pos: usize, depth: usize) -> Result<Frame, GraphError> {
    let more = Frame::Partial(buf.len() + 1);
    let Some(&prefix) = buf.get(pos) else {
        return Ok(more);
    };
    let Some((line, next)) = read_line(buf, pos + 1)? else {
        return Ok(more);
    };
    match prefix {
        b'+' => Ok(Frame::Complete(Reply::Simple(line.to_string()), next)),
        b'-' => Ok(Frame::Complete(Reply::Error(line.to_string()), next)),
        b':' => Ok(Frame::Complete(Reply::Integer(parse_int(line, "integer")?), next)),
        b'$' => {
            let len = parse_int(line, "bulk length")?;
            if len < 0 {
                return Ok(Frame::Complete(Reply::Bulk(None), next));
            }
            if len as u64 > MAX_BULK_LEN as u64 {
                return Err(GraphError::Protocol(format!(
                    "bulk string of {} bytes exceeds limit",
                    len
                )));
            }
            let end = next + len as usize;
            if buf.len() < end + 2 {
                return Ok(Frame::Partial(end + 2));
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(GraphError::Protocol("malformed bulk string trailer".to_string()));
            }
            Ok(Frame::Complete(Reply::Bulk(Some(buf[next..end].to_vec())), end + 2))
        }
        b'*' => {
            let count = parse_int(line, "array length")?;
            if count < 0 {
                return Ok(Frame::Complete(Reply::Array(None), next));
            }
            if depth >= MAX_DEPTH {
                return Err(GraphError::Protocol(format!(
                    "reply nested deeper than {} arrays",
                    MAX_DEPTH
                )));
            }
            let mut items = Vec::with_capacity(count.min(1024) as usize);
            let mut cursor = next;
            for _ in 0..count {
                match decode_at(buf, cursor, depth + 1)? {
                    Frame::Complete(item, after) => {
                        items.push(item);
                        cursor = after;
                    }
                    partial => return Ok(partial),
                }
            }
            Ok(Frame::Complete(Reply::Array(Some(items)), cursor))
        }
        other => Err(GraphError::Protocol(format!(
            "unsupported reply prefix byte: {}",
            other
        ))),
    }
}

fn read_line(buf: &[u8], start: usize) -> Result<Option<(&str, usize)>, GraphError> {
    let Some(rest) = buf.get(start..) else {
        return Ok(None);
    };
    let Some(rel) = rest.windows(2).position(|w| w == b"\r\n") else {
        return Ok(None);
    };
    let line = std::str::from_utf8(&rest[..rel])
        .map_err(|e| GraphError::Protocol(format!("invalid UTF-8 in reply line: {}", e)))?;
    Ok(Some((line, start + rel + 2)))
}

fn parse_int(line: &str, what: &str) -> Result<i64, GraphError> {
    line.parse::<i64>()
        .map_err(|e| GraphError::Protocol(format!("failed parsing {} '{}': {}", what, line, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_bulk_string_array() {
        let args = vec!["GRAPH.QUERY".to_string(), "g".to_string(), "RETURN 1".to_string()];
        assert_eq!(
            encode_command(&args),
            b"*3\r\n$11\r\nGRAPH.QUERY\r\n$1\r\ng\r\n$8\r\nRETURN 1\r\n".to_vec()
        );
    }

    #[test]
    fn decodes_scalars() {
        assert_eq!(
            decode(b"+PONG\r\n").unwrap(),
            Some((Reply::Simple("PONG".to_string()), 7))
        );
        assert_eq!(
            decode(b"-ERR bad\r\n").unwrap(),
            Some((Reply::Error("ERR bad".to_string()), 10))
        );
        assert_eq!(decode(b":-12\r\n").unwrap(), Some((Reply::Integer(-12), 6)));
        assert_eq!(decode(b"$-1\r\n").unwrap(), Some((Reply::Bulk(None), 5)));
    }

    #[test]
    fn decodes_nested_query_result() {
        let raw = b"*3\r\n*1\r\n$1\r\nn\r\n*1\r\n*1\r\n:1\r\n*1\r\n$25\r\nQuery internal execution \r\n";
        let (reply, used) = decode(raw).unwrap().unwrap();
        assert_eq!(used, raw.len());
        assert_eq!(
            reply.to_json(),
            json!([["n"], [[1]], ["Query internal execution "]])
        );
    }

    #[test]
    fn incomplete_input_needs_more_bytes() {
        assert_eq!(decode(b"").unwrap(), None);
        assert_eq!(decode(b"+PON").unwrap(), None);
        assert_eq!(decode(b"$5\r\nab").unwrap(), None);
        assert_eq!(decode(b"*2\r\n:1\r\n").unwrap(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode(b"?x\r\n"), Err(GraphError::Protocol(_))));
        assert!(matches!(decode(b":abc\r\n"), Err(GraphError::Protocol(_))));
        assert!(matches!(decode(b"$2\r\nabXY"), Err(GraphError::Protocol(_))));
    }

    #[test]
    fn partial_bulk_reports_bytes_needed() {
        assert_eq!(decode_frame(b"$10\r\nab").unwrap(), Frame::Partial(17));
        assert_eq!(decode_frame(b"*2\r\n$3\r\nfoo\r\n$4\r\n").unwrap(), Frame::Partial(23));
        assert_eq!(decode_frame(b"+PON").unwrap(), Frame::Partial(5));
    }

    #[test]
    fn oversized_bulk_length_is_rejected() {
        let raw = format!("${}\r\n", MAX_BULK_LEN + 1);
        assert!(matches!(decode(raw.as_bytes()), Err(GraphError::Protocol(_))));
    }

    #[test]
    fn nesting_is_bounded() {
        let mut ok = "*1\r\n".repeat(MAX_DEPTH);
        ok.push_str(":1\r\n");
        assert!(decode(ok.as_bytes()).unwrap().is_some());

        let mut deep = "*1\r\n".repeat(10_000);
        deep.push_str(":1\r\n");
        assert!(matches!(decode(deep.as_bytes()), Err(GraphError::Protocol(_))));
    }
}
