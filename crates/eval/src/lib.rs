//! Tollgate request-time evaluator -- resolves `${...}` variable references
//! against a per-request variable map and evaluates typed comparison
//! predicates against the result.
//!
//! Build an [`Engine`] once, then open a [`Session`] per caller:
//!
//! ```
//! use tollgate_eval::{Engine, MultivaluedComparison, Operator, Predicate, VariableMap};
//!
//! let engine = Engine::default();
//! let vars = VariableMap::new().with("roles", vec!["reader", "admin"]);
//! let outcome = engine
//!     .session()
//!     .evaluate(
//!         "${roles}",
//!         &[Predicate::binary(Operator::Eq, "admin")],
//!         MultivaluedComparison::Any,
//!         &vars,
//!     )
//!     .unwrap();
//! assert!(outcome.verdict);
//! ```

pub mod audit;
pub mod coerce;
pub mod comparison;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod operator;
pub mod resolve;
pub mod selector;
pub mod state;
pub mod types;

pub use audit::{AuditEvent, AuditLevel, AuditSink, MemoryAudit, NullAudit, TracingAudit};
pub use coerce::{Converter, StandardConverter};
pub use comparison::{CompiledAssertion, ComparisonOutcome};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, Session};
pub use evaluator::{
    CardinalityEvaluator, Evaluator, EvaluatorRegistry, MultiValuedEvaluator, RegexEvaluator,
    SingleValuedEvaluator, StringLengthEvaluator,
};
pub use resolve::{collapse, Resolver, VariableMap};
pub use selector::{PathMiss, Selection, Selector, SelectorRegistry};
pub use state::{effective_range, EvaluationState, StateValue};
pub use types::{
    parse_json_value, ComparisonAssertion, CustomTest, DataType, DecodeError,
    EvaluatorKind, Message, MultivaluedComparison, Operator, PartInfo, PolicyError, Predicate,
    ResolveError, TcpInfo, Value, ValueKind,
};
