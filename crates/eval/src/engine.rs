//! The engine and its per-caller sessions.
//!
//! An [`Engine`] is assembled once through [`EngineBuilder`] and is then
//! immutable. Any number of threads may evaluate through it at once; each
//! evaluation allocates its own state and shares nothing mutable.

use std::sync::Arc;

use crate::audit::{AuditSink, TracingAudit};
use crate::coerce::{Converter, StandardConverter};
use crate::config::EngineConfig;
use crate::evaluator::{EvaluatorRegistry, MultiValuedEvaluator, SingleValuedEvaluator};
use crate::resolve::{Resolver, VariableMap};
use time::UtcOffset;

use crate::selector::{DateTimeSelector, Selector, SelectorRegistry};
use crate::types::{ResolveError, Value, ValueKind};

pub struct Engine {
    config: EngineConfig,
    converter: Arc<dyn Converter>,
    audit: Arc<dyn AuditSink>,
    selectors: SelectorRegistry,
    evaluators: EvaluatorRegistry,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("selectors", &self.selectors)
            .field("evaluators", &self.evaluators)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn selectors(&self) -> &SelectorRegistry {
        &self.selectors
    }

    pub fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    pub(crate) fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    /// A session reporting to the engine's own audit sink.
    pub fn session(&self) -> Session<'_> {
        Session {
            engine: self,
            audit: self.audit.as_ref(),
        }
    }

    /// A session reporting to `audit`, e.g. a per-request collector.
    pub fn session_with<'a>(&'a self, audit: &'a dyn AuditSink) -> Session<'a> {
        Session {
            engine: self,
            audit,
        }
    }
}

// ──────────────────────────────────────────────
// Builder
// ──────────────────────────────────────────────

/// Assembles an [`Engine`]. Starts with the standard converter, the
/// standard selectors, no named evaluators, and `tracing` for audit.
pub struct EngineBuilder {
    config: EngineConfig,
    converter: Arc<dyn Converter>,
    audit: Arc<dyn AuditSink>,
    selectors: SelectorRegistry,
    evaluators: EvaluatorRegistry,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder {
            config: EngineConfig::default(),
            converter: Arc::new(StandardConverter),
            audit: Arc::new(TracingAudit),
            selectors: SelectorRegistry::standard(),
            evaluators: EvaluatorRegistry::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Register or replace the selector for one kind of value.
    pub fn selector(mut self, kind: ValueKind, selector: impl Selector + 'static) -> Self {
        self.selectors.register(kind, selector);
        self
    }

    /// Fix the offset `${when.local}` converts to instead of asking the host.
    pub fn local_offset(self, offset: UtcOffset) -> Self {
        self.selector(ValueKind::DateTime, DateTimeSelector::with_local_offset(offset))
    }

    pub fn selectors(mut self, selectors: SelectorRegistry) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn single_valued_evaluator(
        mut self,
        name: impl Into<String>,
        evaluator: impl SingleValuedEvaluator + 'static,
    ) -> Self {
        self.evaluators.register_single(name, evaluator);
        self
    }

    pub fn multi_valued_evaluator(
        mut self,
        name: impl Into<String>,
        evaluator: impl MultiValuedEvaluator + 'static,
    ) -> Self {
        self.evaluators.register_multi(name, evaluator);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            config: self.config,
            converter: self.converter,
            audit: self.audit,
            selectors: self.selectors,
            evaluators: self.evaluators,
        }
    }
}

// ──────────────────────────────────────────────
// Session
// ──────────────────────────────────────────────

/// An engine paired with the audit sink one caller wants events in.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    pub(crate) engine: &'a Engine,
    pub(crate) audit: &'a dyn AuditSink,
}

impl<'a> Session<'a> {
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    pub(crate) fn resolver(&self) -> Resolver<'a> {
        Resolver {
            selectors: &self.engine.selectors,
            audit: self.audit,
            default_delimiter: &self.engine.config.multivalue_delimiter,
        }
    }

    /// Resolve the text inside one `${...}`.
    pub fn resolve_one(
        &self,
        raw_name: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<Option<Value>, ResolveError> {
        self.resolver().resolve_one(raw_name, vars, strict)
    }

    /// Raw value for a single reference, text for anything else.
    pub fn resolve_expression(
        &self,
        expression: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<Option<Value>, ResolveError> {
        self.resolver().resolve_expression(expression, vars, strict)
    }

    pub fn expand(
        &self,
        template: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<String, ResolveError> {
        self.resolver().expand(template, vars, strict)
    }

    /// [`expand`](Self::expand) with the engine's configured strictness.
    pub fn expand_configured(
        &self,
        template: &str,
        vars: &VariableMap,
    ) -> Result<String, ResolveError> {
        self.expand(template, vars, self.engine.config.strict)
    }

    pub fn expand_values(
        &self,
        template: &str,
        vars: &VariableMap,
        strict: bool,
    ) -> Result<Vec<Value>, ResolveError> {
        self.resolver().expand_values(template, vars, strict)
    }
}
