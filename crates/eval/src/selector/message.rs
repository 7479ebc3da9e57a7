//! Message attributes: HTTP headers, status, MIME parts and TCP details.

use std::sync::Arc;

use super::{split_first, strip_prefix_ci, Selection, Selector};
use crate::types::{Message, TcpInfo, Value};

const HTTP_HEADER_PREFIX: &str = "http.header.";
const HTTP_HEADERVALUES_PREFIX: &str = "http.headervalues.";
const HTTP_HEADERNAMES: &str = "http.headernames";
const HTTP_ALLHEADERVALUES: &str = "http.allheadervalues";
const HTTP_STATUS: &str = "http.status";
const MAINPART: &str = "mainpart";
const MAINPART_CONTENT_TYPE: &str = "mainpart.contenttype";
const MAINPART_SIZE: &str = "mainpart.size";
const CONTENT_TYPE: &str = "contenttype";
const SIZE: &str = "size";
const PARTS: &str = "parts";
const TCP_PREFIX: &str = "tcp.";

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageSelector;

impl Selector for MessageSelector {
    fn select(&self, context: &Value, path: &str) -> Option<Selection> {
        let Value::Message(message) = context else {
            return None;
        };
        let lname = path.to_ascii_lowercase();

        if let Some(header) = strip_prefix_ci(path, HTTP_HEADER_PREFIX) {
            let first = message.header_values(header).into_iter().next()?;
            return Some(Selection::done(first));
        }
        if let Some(header) = strip_prefix_ci(path, HTTP_HEADERVALUES_PREFIX) {
            let values = message.header_values(header);
            if values.is_empty() {
                return None;
            }
            return Some(Selection::done(values));
        }

        match lname.as_str() {
            HTTP_HEADERNAMES => Some(Selection::done(message.header_names())),
            HTTP_ALLHEADERVALUES => {
                let all: Vec<String> = message
                    .headers
                    .iter()
                    .map(|(n, v)| format!("{}:{}", n, v))
                    .collect();
                Some(Selection::done(all))
            }
            HTTP_STATUS => message
                .status
                .map(|s| Selection::done(i64::from(s))),
            MAINPART => message
                .main_part()
                .and_then(|p| p.body_text())
                .map(Selection::done),
            MAINPART_CONTENT_TYPE => message
                .main_part()
                .map(|p| Selection::done(p.content_type.as_str())),
            MAINPART_SIZE => message
                .main_part()
                .map(|p| Selection::done(len_value(p.body.len()))),
            CONTENT_TYPE => outer_content_type(message).map(Selection::done),
            SIZE => Some(Selection::done(len_value(message.content_length()))),
            _ => {
                let (head, rest) = split_first(path);
                if head.eq_ignore_ascii_case(PARTS) {
                    let parts: Vec<Value> = message
                        .parts
                        .iter()
                        .map(|p| Value::Part(Arc::new(p.clone())))
                        .collect();
                    return Some(Selection::partial(Value::List(parts), rest));
                }
                if lname.starts_with(TCP_PREFIX) {
                    return tcp_field(message.tcp.as_ref()?, &lname[TCP_PREFIX.len()..])
                        .map(Selection::done);
                }
                None
            }
        }
    }
}

fn outer_content_type(message: &Message) -> Option<String> {
    message
        .header_values("content-type")
        .into_iter()
        .next()
        .map(str::to_string)
        .or_else(|| message.main_part().map(|p| p.content_type.clone()))
}

fn tcp_field(tcp: &TcpInfo, field: &str) -> Option<Value> {
    let value = match field {
        "remoteaddress" | "remoteip" => Value::text(&tcp.remote_address),
        "remotehost" => Value::text(&tcp.remote_host),
        "remoteport" => Value::Int(i64::from(tcp.remote_port)),
        "localaddress" | "localip" => Value::text(&tcp.local_address),
        "localhost" => Value::text(&tcp.local_host),
        "localport" => Value::Int(i64::from(tcp.local_port)),
        "listenport" => Value::Int(i64::from(tcp.listen_port)),
        _ => return None,
    };
    Some(value)
}

pub(crate) fn len_value(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}
