//! Prompt text sent to the oracle.
//!
//! Every prompt opens with a `## Task:` heading line that names what is being
//! asked; replies are parsed by the caller, so the headings are stable.

use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::sandbox::builtins::{catalog, describe, plotting};
use crate::sandbox::plot::PlotCanvas;
use crate::sandbox::{Capability, RESULT_PREFIX};

pub const DESCRIPTIVE_CODE: &str = "## Task: descriptive statistics code";
pub const DESCRIPTIVE_REASONING: &str = "## Task: descriptive reasoning";
pub const VISUALIZATION_SELECTION: &str = "## Task: visualization selection";
pub const INFERENTIAL_SELECTION: &str = "## Task: inferential test selection";
pub const INFERENTIAL_CONCLUSIONS: &str = "## Task: inferential conclusions";
pub const PRIOR_TEST_CODE: &str = "## Task: prior test code";
pub const OUTLIER_SELECTION: &str = "## Task: outlier method selection";
pub const IMPUTATION_SELECTION: &str = "## Task: imputation method selection";
pub const CRITIQUE: &str = "## Task: critique";
pub const COLUMN_METADATA: &str = "## Task: column metadata";
pub const FEATURE_REMOVAL: &str = "## Task: feature removal";
pub const PAIR_SELECTION: &str = "## Task: pair selection";
pub const TYPE_CLASSIFICATION: &str = "## Task: type classification";

pub const DESCRIPTIVE_CONTRACT: &str = "Compute every priority test and every descriptive statistic listed in the knowledge. \
Assign each to its own variable `results.<snake_case_name>`. For tests that return tuples, assign the \
statistic and the p-value separately (e.g. `results.shapiro_w`, `results.shapiro_p`).";

pub const PRIOR_TEST_CONTRACT: &str = "Run every prior test listed in the knowledge. Assign each statistic and \
p-value to its own variable `results.<snake_case_name>`.";

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Describes the code dialect and lists the callable functions.
pub fn dialect_guide(capability: Capability) -> String {
    let mut functions = describe(&catalog());
    if capability == Capability::Plotting {
        // Documentation only; the canvas is never drawn on.
        let canvas = Arc::new(Mutex::new(PlotCanvas::new(PathBuf::new())));
        functions.push('\n');
        functions.push_str(&describe(&plotting(canvas)));
    }
    format!(
        r#"Code is a sequence of statements separated by `;`.
- Inputs are only the bindings named in the task. Each is a tuple of cells; `()` marks a missing cell. Never write literal data.
- Every output is a variable named `{prefix}<name>`, e.g. `{prefix}mean = mean(data_column)`.
- Tests return tuples; read elements with nth, e.g. `{prefix}shapiro_p = nth(shapiro(data_column), 1)`.
- Operators: + - * / % ^, comparisons, && ||, `if(condition, a, b)`, strings in double quotes.
- No imports, no function definitions, no loops.

Functions:
{functions}"#,
        prefix = RESULT_PREFIX,
        functions = functions
    )
}

/// Everything the oracle sees when asked to write analysis code
#[derive(Debug, Clone)]
pub struct CodeRequest {
    pub heading: &'static str,
    pub knowledge: Value,
    pub description: Value,
    pub bindings: Vec<String>,
    pub contract: String,
    pub feedback: Option<String>,
    pub context: Option<Value>,
}

impl CodeRequest {
    pub fn new(heading: &'static str, knowledge: Value, description: Value, bindings: Vec<String>) -> Self {
        Self {
            heading,
            knowledge,
            description,
            bindings,
            contract: String::new(),
            feedback: None,
            context: None,
        }
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = contract.into();
        self
    }

    pub fn with_feedback(mut self, feedback: Option<String>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }
}

fn feedback_section(feedback: Option<&str>) -> String {
    match feedback {
        Some(f) => format!(
            "\n## Feedback on previous attempts\n{}\nFix every one of these problems in this attempt.\n",
            f
        ),
        None => String::new(),
    }
}

pub fn code_prompt(request: &CodeRequest) -> String {
    let context = request
        .context
        .as_ref()
        .map(|c| format!("\n## Upstream findings\n{}\n", pretty(c)))
        .unwrap_or_default();
    format!(
        r#"{heading}

You write statistical analysis code in the expression dialect described below.

## Knowledge
{knowledge}

## Data description
{description}

## Bindings
{bindings}
{context}
## Output contract
{contract}
{feedback}
## Dialect
{guide}

Return ONLY the code in a single fenced block. No explanations."#,
        heading = request.heading,
        knowledge = pretty(&request.knowledge),
        description = pretty(&request.description),
        bindings = request.bindings.join(", "),
        context = context,
        contract = request.contract,
        feedback = feedback_section(request.feedback.as_deref()),
        guide = dialect_guide(Capability::Compute),
    )
}

pub fn descriptive_reasoning(findings: &Value, knowledge: &Value, description: &Value) -> String {
    format!(
        r#"{heading}

You are a statistical reasoning assistant. Decide which of the computed statistics are preferred
for this data and summarize them.

## Computed results
{findings}

## Knowledge (selection and application criteria)
{knowledge}

## Data description
{description}

Return ONLY a JSON object:
{{
  "statistics_results": {{
    "<statistic>": {{
      "result_value": <number or "NA">,
      "result_text": "the result in plain language",
      "preferred": true,
      "reason": "why it is or is not preferred"
    }}
  }}
}}"#,
        heading = DESCRIPTIVE_REASONING,
        findings = pretty(findings),
        knowledge = pretty(knowledge),
        description = pretty(description),
    )
}

/// `file_names` are the plain names `save_plot` must be called with, in order.
pub fn visualization_selection(
    knowledge: &Value,
    upstream: &Value,
    description: &Value,
    bindings: &[String],
    file_names: &[String],
    feedback: Option<&str>,
) -> String {
    format!(
        r#"{heading}

You are a statistical visualization assistant. Select at most {count} visualizations from the
options below that suit this data, and write the code that draws each one.

## Visualization options and selection criteria
{knowledge}

## Descriptive findings
{upstream}

## Data description
{description}

## Bindings
{bindings}

## Rules
- Visualization k must end with `{prefix}path = save_plot("<name k>")` using these names in order: {names}.
- Choose bins and titles from the observed range.
{feedback}
## Dialect
{guide}

Return ONLY a JSON object:
{{
  "visualizations": [
    {{"name": "plot name", "code": "statements", "reason": "why this plot fits the data"}}
  ]
}}"#,
        heading = VISUALIZATION_SELECTION,
        count = file_names.len(),
        knowledge = pretty(knowledge),
        upstream = pretty(upstream),
        description = pretty(description),
        bindings = bindings.join(", "),
        prefix = RESULT_PREFIX,
        names = file_names
            .iter()
            .map(|n| format!("\"{}\"", n))
            .collect::<Vec<_>>()
            .join(", "),
        feedback = feedback_section(feedback),
        guide = dialect_guide(Capability::Plotting),
    )
}

pub fn inferential_selection(
    knowledge: &Value,
    upstream: &Value,
    description: &Value,
    bindings: &[String],
    feedback: Option<&str>,
) -> String {
    format!(
        r#"{heading}

You are a statistical inference expert. Select the appropriate tests from the knowledge given the
descriptive findings. State the null and alternative hypotheses for each, and write code that
performs it. Do not compute anything yourself.

## Knowledge (tests, selection and application criteria)
{knowledge}

## Descriptive findings
{upstream}

## Data description
{description}

## Bindings
{bindings}
{feedback}
## Dialect
{guide}

Each test's code assigns at least `{prefix}statistic` and `{prefix}p_value`.

Return ONLY a JSON object:
{{
  "tests": [
    {{"name": "test name", "hypothesis": "H0 ... / H1 ...", "code": "statements", "reason": "why this test"}}
  ]
}}"#,
        heading = INFERENTIAL_SELECTION,
        knowledge = pretty(knowledge),
        upstream = pretty(upstream),
        description = pretty(description),
        bindings = bindings.join(", "),
        feedback = feedback_section(feedback),
        guide = dialect_guide(Capability::Compute),
        prefix = RESULT_PREFIX,
    )
}

pub fn inferential_conclusions(tests: &Value) -> String {
    format!(
        r#"{heading}

You are a statistical inference reasoning assistant. For each executed test below, state the
conclusion in plain language based on its hypothesis and result.

## Tests and results
{tests}

Return ONLY a JSON object mapping each test name to its conclusion:
{{
  "<test name>": "conclusion"
}}"#,
        heading = INFERENTIAL_CONCLUSIONS,
        tests = pretty(tests),
    )
}

pub fn outlier_selection(
    methods: &Value,
    variable_type: &str,
    description: &Value,
    prior_results: &Value,
    feedback: Option<&str>,
) -> String {
    format!(
        r#"{heading}

You are a data preprocessing expert. Choose the outlier detection method that best fits this column
given the prior test results, and write code that applies it.

## Available methods
{methods}

## Column
type: {variable_type}
{description}

## Prior test results
{prior}
{feedback}
## Dialect
{guide}

The code must assign the detected row indexes to `{prefix}outlier_indexes`.

Return ONLY a JSON object:
{{"selected_method": "method name", "reasoning": "why it fits", "code": "statements"}}"#,
        heading = OUTLIER_SELECTION,
        methods = pretty(methods),
        variable_type = variable_type,
        description = pretty(description),
        prior = pretty(prior_results),
        feedback = feedback_section(feedback),
        guide = dialect_guide(Capability::Compute),
        prefix = RESULT_PREFIX,
    )
}

pub fn imputation_selection(
    methods: &Value,
    variable_type: &str,
    description: &Value,
    outliers: &Value,
    feedback: Option<&str>,
) -> String {
    format!(
        r#"{heading}

You are a data preprocessing expert. Choose the missing-value imputation method that best fits this
column, and write code that applies it.

## Available methods
{methods}

## Column
type: {variable_type}
{description}

## Outlier findings
{outliers}
{feedback}
## Dialect
{guide}

The code must assign the complete column, same length as the input and with no missing cells, to
`{prefix}imputed`.

Return ONLY a JSON object:
{{"selected_method": "method name", "reasoning": "why it fits", "code": "statements"}}"#,
        heading = IMPUTATION_SELECTION,
        methods = pretty(methods),
        variable_type = variable_type,
        description = pretty(description),
        outliers = pretty(outliers),
        feedback = feedback_section(feedback),
        guide = dialect_guide(Capability::Compute),
        prefix = RESULT_PREFIX,
    )
}

pub fn critique(stage: &str, knowledge: &Value, artifact: &Value, description: &Value) -> String {
    format!(
        r#"{heading}

You are a statistical validation expert. Judge whether this {stage} result satisfies the knowledge
and suits the data.

## Knowledge
{knowledge}

## Result
{artifact}

## Data description
{description}

## Rules
- Check that what the knowledge requires is present and appropriate for the data.
- Ignore references to binding names such as data_column; they are placeholders.
- When rejecting, say precisely what to change.

Return ONLY a JSON object:
{{"valid": true, "reason": "short justification"}}"#,
        heading = CRITIQUE,
        stage = stage,
        knowledge = pretty(knowledge),
        artifact = pretty(artifact),
        description = pretty(description),
    )
}

pub fn column_metadata(column_types: &Value, context: &str) -> String {
    format!(
        r#"{heading}

You are a metadata expert. Describe each column of this dataset in one sentence, and the dataset as
a whole.

## Columns and types
{columns}

## Context
{context}

Return ONLY a JSON object:
{{"<column>": "description", "dataset_desc": "short description of the dataset"}}"#,
        heading = COLUMN_METADATA,
        columns = pretty(column_types),
        context = if context.is_empty() { "None" } else { context },
    )
}

pub fn feature_removal(column_types: &Value, metadata: &Value, context: &str) -> String {
    format!(
        r#"{heading}

You are a feature selection expert. Remove columns that are irrelevant, redundant, identifiers, or
date and time stamps. Keep everything else.

## Columns and types
{columns}

## Metadata
{metadata}

## Context
{context}

Return ONLY a JSON object of the retained columns and their types:
{{"<column>": "<type>"}}"#,
        heading = FEATURE_REMOVAL,
        columns = pretty(column_types),
        metadata = pretty(metadata),
        context = if context.is_empty() { "None" } else { context },
    )
}

pub fn pair_selection(candidates: &Value, column_types: &Value, context: &str, max_pairs: usize) -> String {
    format!(
        r#"{heading}

You are a statistical reasoning assistant. Below are column pairs with the result of an association
test. Select up to {max_pairs} pairs worth analysing further.

## Rules
- Pairs the context describes as related are selected regardless of their statistics.
- Numerical-numerical: prefer higher absolute correlation.
- Numerical-categorical and categorical-categorical: prefer smaller p-values.
- Avoid redundant or weak relationships.

## Context
{context}

## Column types
{columns}

## Candidates
{candidates}

Return ONLY a JSON object:
{{"selected_pairs": [{{"pair": ["column a", "column b"], "reason": "brief reasoning"}}]}}"#,
        heading = PAIR_SELECTION,
        max_pairs = max_pairs,
        context = if context.is_empty() { "None" } else { context },
        columns = pretty(column_types),
        candidates = pretty(candidates),
    )
}

pub fn type_classification(summaries: &Value) -> String {
    format!(
        r#"{heading}

Classify each column into exactly one of: numerical continuous, numerical discrete,
categorical nominal, categorical ordinal, binary variable, time series.

## Columns
{summaries}

Return ONLY a JSON object:
{{"<column>": "<type>"}}"#,
        heading = TYPE_CLASSIFICATION,
        summaries = pretty(summaries),
    )
}
