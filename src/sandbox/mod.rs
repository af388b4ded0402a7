//! Restricted evaluation of generated analysis code.
//!
//! Generated code is a flat list of `;`-separated statements in an embedded
//! expression language. Its only inputs are the named bindings and the
//! function catalog in [`builtins`]; its outputs are the variables it assigns
//! under `results.`. Each run gets a fresh context on a blocking thread.

pub mod builtins;
pub mod guard;
pub mod plot;

use async_trait::async_trait;
use evalexpr::{
    eval_with_context_mut, ContextWithMutableVariables, DefaultNumericTypes, IterateVariablesContext, Value,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::table::{Column, Datum};
use plot::PlotCanvas;

pub type ExprValue = evalexpr::Value<DefaultNumericTypes>;
pub type ExprContext = evalexpr::HashMapContext<DefaultNumericTypes>;
pub type ExprFunction = evalexpr::Function<DefaultNumericTypes>;

/// Variables under this prefix are collected as results
pub const RESULT_PREFIX: &str = "results.";

pub const SINGLE_BINDING: &str = "data_column";
pub const PAIR_BINDINGS: [&str; 2] = ["data_column1", "data_column2"];

const MAX_DIAGNOSTIC_LEN: usize = 2000;

pub fn datum_to_value(datum: &Datum) -> ExprValue {
    match datum {
        Datum::Number(n) => Value::Float(*n),
        Datum::Text(s) => Value::String(s.clone()),
        Datum::Missing => Value::Empty,
    }
}

/// Read-only data sequences exposed to generated code by name
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: BTreeMap<String, Arc<[Datum]>>,
}

impl Bindings {
    pub fn single(column: &Column) -> Self {
        Self::default().with(SINGLE_BINDING, column)
    }

    pub fn pair(first: &Column, second: &Column) -> Self {
        Self::default()
            .with(PAIR_BINDINGS[0], first)
            .with(PAIR_BINDINGS[1], second)
    }

    pub fn with(mut self, name: &str, column: &Column) -> Self {
        self.values.insert(name.to_string(), Arc::from(column.values.as_slice()));
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&[Datum]> {
        self.values.get(name).map(|v| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Which function groups a run may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Compute,
    /// Compute plus the figure-building functions
    Plotting,
}

/// What one run produced
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// `results.*` variables, prefix stripped, sorted by name
    pub results: Vec<(String, ExprValue)>,
    /// Set when the run failed; results are then empty
    pub diagnostics: Option<String>,
    pub figures: Vec<PathBuf>,
}

impl ExecutionOutcome {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        let mut diagnostic: String = diagnostic.into();
        if diagnostic.chars().count() > MAX_DIAGNOSTIC_LEN {
            diagnostic = diagnostic.chars().take(MAX_DIAGNOSTIC_LEN).collect::<String>() + "...[truncated]";
        }
        Self { diagnostics: Some(diagnostic), ..Self::default() }
    }

    pub fn is_success(&self) -> bool {
        self.diagnostics.is_none()
    }

    pub fn get(&self, name: &str) -> Option<&ExprValue> {
        self.results.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Executes generated code against bound data.
///
/// Failures of the code itself come back as diagnostics; `Err` is reserved
/// for the interpreter's own infrastructure.
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        bindings: &Bindings,
        capability: Capability,
    ) -> AnalysisResult<ExecutionOutcome>;
}

/// `evalexpr`-backed interpreter with a wall-clock limit per run
pub struct ExprSandbox {
    timeout: Duration,
    output_dir: PathBuf,
}

impl ExprSandbox {
    pub fn new(timeout: Duration, output_dir: impl Into<PathBuf>) -> Self {
        Self { timeout, output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }
}

fn run(code: String, bindings: Bindings, capability: Capability, output_dir: PathBuf) -> ExecutionOutcome {
    let mut context = ExprContext::new();
    if let Err(e) = builtins::register(&mut context, builtins::catalog()) {
        return ExecutionOutcome::failed(format!("failed to register functions: {}", e));
    }

    let canvas = match capability {
        Capability::Compute => None,
        Capability::Plotting => {
            let canvas = Arc::new(Mutex::new(PlotCanvas::new(output_dir)));
            if let Err(e) = builtins::register(&mut context, builtins::plotting(canvas.clone())) {
                return ExecutionOutcome::failed(format!("failed to register plotting functions: {}", e));
            }
            Some(canvas)
        }
    };

    for (name, values) in &bindings.values {
        let sequence = Value::Tuple(values.iter().map(datum_to_value).collect());
        if let Err(e) = context.set_value(name.clone(), sequence) {
            return ExecutionOutcome::failed(format!("failed to bind '{}': {}", name, e));
        }
    }

    let evaluation = eval_with_context_mut(&code, &mut context);
    let figures = canvas
        .and_then(|c| c.lock().ok().map(|c| c.saved().to_vec()))
        .unwrap_or_default();

    if let Err(e) = evaluation {
        return ExecutionOutcome { figures, ..ExecutionOutcome::failed(e.to_string()) };
    }

    let mut results: Vec<(String, ExprValue)> = context
        .iter_variables()
        .filter_map(|(name, value)| name.strip_prefix(RESULT_PREFIX).map(|n| (n.to_string(), value)))
        .collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    if results.is_empty() && figures.is_empty() {
        return ExecutionOutcome::failed(format!(
            "code ran but assigned no {}* variables",
            RESULT_PREFIX
        ));
    }
    ExecutionOutcome { results, diagnostics: None, figures }
}

#[async_trait]
impl Interpreter for ExprSandbox {
    async fn execute(
        &self,
        code: &str,
        bindings: &Bindings,
        capability: Capability,
    ) -> AnalysisResult<ExecutionOutcome> {
        if let Err(reason) = guard::check(code) {
            warn!("Rejected generated code: {}", reason);
            return Ok(ExecutionOutcome::failed(reason));
        }
        debug!("Executing generated code ({:?}, bindings {:?}):\n{}", capability, bindings.names(), code);

        let task = tokio::task::spawn_blocking({
            let code = code.to_string();
            let bindings = bindings.clone();
            let output_dir = self.output_dir.clone();
            move || run(code, bindings, capability, output_dir)
        });

        // A timed-out run keeps its blocking thread until the expression finishes;
        // the language has no loops, so that is bounded by the input size.
        match timeout(self.timeout, task).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(AnalysisError::Execution(format!("interpreter task failed: {}", e))),
            Err(_) => {
                warn!("Generated code timed out after {:?}", self.timeout);
                Ok(ExecutionOutcome::failed(format!(
                    "execution timed out after {} seconds",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
