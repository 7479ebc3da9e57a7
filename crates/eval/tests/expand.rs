//! Template expansion integration tests.
//!
//! Covers lenient and strict expansion, multi-value joining, subscripts,
//! and selector paths into message context variables.

use pretty_assertions::assert_eq;
use time::macros::datetime;

use tollgate_eval::{
    Engine, MemoryAudit, Message, PartInfo, ResolveError, TcpInfo, Value, VariableMap,
};

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn request() -> Message {
    Message::new()
        .with_header("SOAPAction", "urn:placeOrder")
        .with_header("X-Forwarded-For", "10.1.1.1")
        .with_header("x-forwarded-for", "10.2.2.2")
        .with_part(PartInfo::new("text/xml; charset=utf-8", "<order id=\"7\"/>"))
        .with_part(PartInfo::new("application/pdf", vec![0u8; 16]).with_header("Content-ID", "att1"))
        .with_tcp(TcpInfo {
            remote_address: "192.168.0.10".into(),
            remote_port: 40123,
            listen_port: 8443,
            ..TcpInfo::default()
        })
}

fn vars() -> VariableMap {
    VariableMap::new()
        .with("a", "1")
        .with("b", "2")
        .with("x", vec![1, 2, 3])
        .with("request", request())
        .with("response", Message::new().with_status(503))
        .with("when", datetime!(2012-02-03 04:05:06.007 UTC))
}

fn expand(template: &str) -> String {
    Engine::default()
        .session()
        .expand(template, &vars(), false)
        .unwrap()
}

// ──────────────────────────────────────────────
// Basic substitution
// ──────────────────────────────────────────────

#[test]
fn substitutes_in_place() {
    assert_eq!(expand("${a}-${b}"), "1-2");
    assert_eq!(expand("no references"), "no references");
}

#[test]
fn missing_variable_lenient_vs_strict() {
    let engine = Engine::default();
    let audit = MemoryAudit::new();
    let session = engine.session_with(&audit);
    assert_eq!(session.expand("${missing}", &VariableMap::new(), false).unwrap(), "");
    assert_eq!(
        session.expand("${missing}", &VariableMap::new(), true),
        Err(ResolveError::NoSuchVariable {
            name: "missing".to_string()
        })
    );
}

#[test]
fn list_is_joined_with_default_delimiter() {
    assert_eq!(expand("[${x}]"), "[1, 2, 3]");
    assert_eq!(expand("${x|+}"), "1+2+3");
    assert_eq!(expand("${x[2]}"), "3");
}

#[test]
fn unterminated_reference_is_left_alone() {
    assert_eq!(expand("${a"), "${a");
    assert_eq!(expand("cost: $5 ${a}"), "cost: $5 1");
}

#[test]
fn unclosed_subscript_is_left_alone() {
    let engine = Engine::default();
    let session = engine.session();
    assert_eq!(
        session.expand("x ${foo[1} y", &VariableMap::new(), false).unwrap(),
        "x ${foo[1} y"
    );
    assert_eq!(
        session.expand("${x[1} ${a}", &vars(), true).unwrap(),
        "${x[1} 1"
    );
}

// ──────────────────────────────────────────────
// Message selectors
// ──────────────────────────────────────────────

#[test]
fn message_headers() {
    assert_eq!(expand("${request.http.header.soapaction}"), "urn:placeOrder");
    assert_eq!(
        expand("${request.http.headerValues.X-Forwarded-For}"),
        "10.1.1.1, 10.2.2.2"
    );
    assert_eq!(
        expand("${request.http.headerValues.X-Forwarded-For[1]}"),
        "10.2.2.2"
    );
}

#[test]
fn message_body_and_parts() {
    assert_eq!(expand("${request.mainpart}"), "<order id=\"7\"/>");
    assert_eq!(expand("${request.parts.2.contentType}"), "application/pdf");
    assert_eq!(expand("${request.parts.2.header.content-id}"), "att1");
    assert_eq!(expand("${request.parts.length}"), "2");
    assert_eq!(expand("${request.parts.2.body}"), "");
}

#[test]
fn response_status_and_tcp() {
    assert_eq!(expand("${response.http.status}"), "503");
    assert_eq!(expand("${request.http.status}"), "");
    assert_eq!(
        expand("${request.tcp.remoteip}:${request.tcp.remotePort}"),
        "192.168.0.10:40123"
    );
}

#[test]
fn strict_selector_miss_is_an_error() {
    let result = Engine::default()
        .session()
        .expand("${request.http.status}", &vars(), true);
    assert!(matches!(result, Err(ResolveError::SelectorMiss { .. })));
}

// ──────────────────────────────────────────────
// Date/time selectors
// ──────────────────────────────────────────────

#[test]
fn datetime_views() {
    assert_eq!(expand("${when}"), "2012-02-03T04:05:06.007Z");
    assert_eq!(expand("${when.millis}"), "1328241906007");
    assert_eq!(expand("${when.seconds}"), "1328241906");
    assert_eq!(expand("${when.rfc1123}"), "Fri, 03 Feb 2012 04:05:06 GMT");
    assert_eq!(expand("${when.utc.iso8601}"), "2012-02-03T04:05:06.007Z");
}

#[test]
fn datetime_zones_and_patterns() {
    assert_eq!(expand("${when.rfc850}"), "Friday, 03-Feb-12 04:05:06 GMT");
    assert_eq!(expand("${when.asctime}"), "Fri Feb  3 04:05:06 2012");
    assert_eq!(expand("${when.-07:00}"), "2012-02-02T21:05:06.007-07:00");
    assert_eq!(expand("${when.+0530.asctime}"), "Fri Feb  3 09:35:06 2012");
    assert_eq!(
        expand("${when.America/New_York.iso8601}"),
        "2012-02-02T23:05:06.007-05:00"
    );
    assert_eq!(
        expand("${when.America/New_York.rfc1123}"),
        "Fri, 03 Feb 2012 04:05:06 GMT"
    );
    assert_eq!(expand("${when.yyyy-MM-dd HH:mm:ss.SSS}"), "2012-02-03 04:05:06.007");
    assert_eq!(expand("${when.Europe/Paris.EEEE d MMMM, HH'h'}"), "Friday 3 February, 05h");
}

#[test]
fn unknown_datetime_view_is_a_strict_miss() {
    let engine = Engine::default();
    let result = engine.session().expand("${when.fortnight}", &vars(), true);
    assert!(matches!(result, Err(ResolveError::SelectorMiss { .. })));
}

// ──────────────────────────────────────────────
// Typed resolution
// ──────────────────────────────────────────────

#[test]
fn pure_reference_resolves_to_raw_value() {
    let session_engine = Engine::default();
    let session = session_engine.session();
    assert_eq!(
        session.resolve_expression("${x}", &vars(), false).unwrap(),
        Some(Value::from(vec![1, 2, 3]))
    );
    assert_eq!(
        session.resolve_one("response.http.status", &vars(), true).unwrap(),
        Some(Value::Int(503))
    );
}

#[test]
fn expand_values_keeps_each_value() {
    let engine = Engine::default();
    let values = engine
        .session()
        .expand_values("${a}:${x}", &vars(), false)
        .unwrap();
    assert_eq!(
        values,
        vec![
            Value::from("1"),
            Value::from(":"),
            Value::Int(1),
            Value::Int(2),
            Value::Int(3)
        ]
    );
}
