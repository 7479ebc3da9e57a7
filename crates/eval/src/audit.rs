//! Audit events for data-driven failures and comparison outcomes.
//!
//! Nothing that depends on request data is ever an `Err` in this crate.
//! Missing variables, selector misses, failed conversions and the like are
//! recorded here instead and folded into a `false` verdict.

use std::fmt;
use std::sync::Mutex;

use crate::types::{Operator, ValueKind};

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditLevel {
    Fine,
    Info,
    Warning,
}

/// Every event the engine can report. Codes are stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    NoSuchVariable {
        name: String,
    },
    /// Raised instead of `NoSuchVariable` when the caller resolves strictly.
    NoSuchVariableWarning {
        name: String,
    },
    SelectorMiss {
        name: String,
        context: String,
    },
    SubscriptOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },
    SuspiciousToString {
        name: String,
        kind: ValueKind,
    },
    ComparisonOk,
    ComparisonNot {
        predicate: String,
    },
    ComparisonNull,
    ComparisonConverting {
        from: String,
        to: String,
    },
    ComparisonCantConvert {
        from: String,
        to: String,
    },
    ComparisonNotComparable {
        side: &'static str,
        predicate: String,
    },
    ComparisonRightIsNull {
        operator: Operator,
    },
    ComparisonOperatorDefect {
        operator: Operator,
        left: String,
        right: String,
    },
}

impl AuditEvent {
    pub fn code(&self) -> i32 {
        match self {
            AuditEvent::NoSuchVariable { .. } => -6,
            AuditEvent::NoSuchVariableWarning { .. } => -10,
            AuditEvent::SelectorMiss { .. } => -11,
            AuditEvent::SubscriptOutOfRange { .. } => -12,
            AuditEvent::SuspiciousToString { .. } => -13,
            AuditEvent::ComparisonOk => 7100,
            AuditEvent::ComparisonNot { .. } => 7101,
            AuditEvent::ComparisonNull => 7103,
            AuditEvent::ComparisonConverting { .. } => 7104,
            AuditEvent::ComparisonCantConvert { .. } => 7105,
            AuditEvent::ComparisonNotComparable { .. } => 7106,
            AuditEvent::ComparisonRightIsNull { .. } => 7107,
            AuditEvent::ComparisonOperatorDefect { .. } => 7108,
        }
    }

    pub fn level(&self) -> AuditLevel {
        match self {
            AuditEvent::NoSuchVariable { .. }
            | AuditEvent::ComparisonOk
            | AuditEvent::ComparisonConverting { .. } => AuditLevel::Fine,
            AuditEvent::NoSuchVariableWarning { .. }
            | AuditEvent::SelectorMiss { .. }
            | AuditEvent::SuspiciousToString { .. }
            | AuditEvent::ComparisonOperatorDefect { .. } => AuditLevel::Warning,
            AuditEvent::SubscriptOutOfRange { .. }
            | AuditEvent::ComparisonNot { .. }
            | AuditEvent::ComparisonNull
            | AuditEvent::ComparisonCantConvert { .. }
            | AuditEvent::ComparisonNotComparable { .. }
            | AuditEvent::ComparisonRightIsNull { .. } => AuditLevel::Info,
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::NoSuchVariable { name } | AuditEvent::NoSuchVariableWarning { name } => {
                write!(f, "No such variable: {}", name)
            }
            AuditEvent::SelectorMiss { name, context } => {
                write!(f, "Unsupported variable: {} in {}", name, context)
            }
            AuditEvent::SubscriptOutOfRange { name, index, len } => write!(
                f,
                "Subscript {} out of range for {} ({} values)",
                index, name, len
            ),
            AuditEvent::SuspiciousToString { name, kind } => {
                write!(f, "Variable {} is a {}; rendering it as text", name, kind)
            }
            AuditEvent::ComparisonOk => f.write_str("Comparison matched"),
            AuditEvent::ComparisonNot { predicate } => {
                write!(f, "Comparison did not match: {}", predicate)
            }
            AuditEvent::ComparisonNull => f.write_str("At least one comparison value was null"),
            AuditEvent::ComparisonConverting { from, to } => {
                write!(f, "Converting {} value into {}", from, to)
            }
            AuditEvent::ComparisonCantConvert { from, to } => {
                write!(f, "Value of type {} cannot be converted to {}", from, to)
            }
            AuditEvent::ComparisonNotComparable { side, predicate } => write!(
                f,
                "{} Value for binary predicate '{}' is not Comparable; using its text form instead",
                side, predicate
            ),
            AuditEvent::ComparisonRightIsNull { operator } => write!(
                f,
                "Right value of null is not supported by comparison '{}'",
                operator
            ),
            AuditEvent::ComparisonOperatorDefect {
                operator,
                left,
                right,
            } => write!(
                f,
                "Operator {} could not compare {} with {}",
                operator, left, right
            ),
        }
    }
}

// ──────────────────────────────────────────────
// Sinks
// ──────────────────────────────────────────────

/// Receives audit events. Implementations must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Forwards events to `tracing` at a level matching their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: &AuditEvent) {
        let code = event.code();
        match event.level() {
            AuditLevel::Fine => tracing::debug!(code, message = %event, "audit"),
            AuditLevel::Info => tracing::info!(code, message = %event, "audit"),
            AuditLevel::Warning => tracing::warn!(code, message = %event, "audit"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudit;

impl AuditSink for NullAudit {
    fn record(&self, _event: &AuditEvent) {}
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().clone()
    }

    pub fn codes(&self) -> Vec<i32> {
        self.lock().iter().map(AuditEvent::code).collect()
    }

    pub fn contains_code(&self, code: i32) -> bool {
        self.lock().iter().any(|e| e.code() == code)
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<AuditEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEvent>> {
        // A panic while holding the lock cannot leave the Vec half-written
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: &AuditEvent) {
        self.lock().push(event.clone());
    }
}
