use crate::component::{Calculation, Component, InputValue, ValueMap};
use crate::formula::{FormulaError, FormulaEvaluator};
use crate::graph::DependencyDag;
use chrono::NaiveDate;
use petgraph::algo::toposort;
use std::collections::HashMap;
use std::fmt;

/// Why a `calculate` call aborted. Every variant fails the whole call;
/// there is no partial-success mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationError {
    /// A formula failed to parse. The message is the parser's, verbatim,
    /// and retrying cannot help.
    FormulaSyntax { message: String },
    /// Two or more components depend on each other on the same date;
    /// `id` names a component on the cycle.
    CircularDependency { id: String },
    /// A calculation names a dependency with no calculation on the
    /// evaluation date.
    DependencyNotFound { id: String, referrer: String },
    /// A formula faulted while running.
    FormulaRuntime { id: String, message: String },
}

impl fmt::Display for CalculationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationError::FormulaSyntax { message } => {
                write!(f, "formula syntax error: {message}")
            }
            CalculationError::CircularDependency { id } => {
                write!(f, "circular dependency involving component {id}")
            }
            CalculationError::DependencyNotFound { id, referrer } => write!(
                f,
                "component {referrer} depends on {id}, which has no calculation on this date"
            ),
            CalculationError::FormulaRuntime { id, message } => {
                write!(f, "formula of component {id} failed: {message}")
            }
        }
    }
}

impl std::error::Error for CalculationError {}

/// Evaluates the firing set of a single date.
///
/// All evaluation state lives inside `execute`: the dependency DAG and the
/// memo map are created per call and dropped with it, so passes for
/// different dates share nothing and can run in parallel.
pub struct DatePass<'a, E> {
    components: &'a [Component],
    by_id: &'a HashMap<&'a str, usize>,
    values: &'a ValueMap,
    evaluator: &'a E,
}

impl<'a, E: FormulaEvaluator> DatePass<'a, E> {
    pub fn new(
        components: &'a [Component],
        by_id: &'a HashMap<&'a str, usize>,
        values: &'a ValueMap,
        evaluator: &'a E,
    ) -> Self {
        Self {
            components,
            by_id,
            values,
            evaluator,
        }
    }

    /// Resolves every firing component's amount for `date`.
    ///
    /// Returns `(component index, amount)` pairs for exactly the firing
    /// components. Dependencies that do not fire are evaluated for their
    /// values but reported by nobody.
    pub fn execute(
        &self,
        date: NaiveDate,
        firing: &[usize],
    ) -> Result<Vec<(usize, f64)>, CalculationError> {
        if firing.is_empty() {
            return Ok(Vec::new());
        }

        let dag = DependencyDag::build(self.components, self.by_id, date, firing)?;

        let order = toposort(&dag.graph, None).map_err(|cycle| {
            let index = dag.graph[cycle.node_id()];
            CalculationError::CircularDependency {
                id: self.components[index].id.clone(),
            }
        })?;

        // Amounts memoized by component index; topological order guarantees
        // every dependency is present before its dependents read it.
        let mut amounts: HashMap<usize, f64> = HashMap::with_capacity(order.len());
        for node in order {
            let index = dag.graph[node];
            let component = &self.components[index];
            let (period_key, calculation) = dag.calculations[&index];

            let inputs = self.resolve_inputs(component, period_key, calculation);
            let dependencies: HashMap<String, f64> = calculation
                .dependencies
                .iter()
                .map(|id| (id.clone(), amounts[&self.by_id[id.as_str()]]))
                .collect();

            let amount = self
                .evaluator
                .evaluate(&calculation.formula, &inputs, &dependencies)
                .map_err(|err| match err {
                    FormulaError::Syntax(message) => {
                        CalculationError::FormulaSyntax { message }
                    }
                    FormulaError::Runtime(message) => CalculationError::FormulaRuntime {
                        id: component.id.clone(),
                        message,
                    },
                })?;
            amounts.insert(index, amount);
        }

        Ok(firing
            .iter()
            .map(|&index| (index, amounts[&index]))
            .collect())
    }

    /// The formula's `inputs` binding: caller-supplied values where given,
    /// declared defaults or type fallbacks everywhere else.
    fn resolve_inputs(
        &self,
        component: &Component,
        period_key: &str,
        calculation: &Calculation,
    ) -> HashMap<String, InputValue> {
        let supplied = self
            .values
            .get(&component.id)
            .and_then(|periods| periods.get(period_key));
        calculation
            .inputs
            .iter()
            .map(|input| {
                let value = supplied
                    .and_then(|values| values.get(&input.id))
                    .cloned()
                    .unwrap_or_else(|| input.fallback_value());
                (input.id.clone(), value)
            })
            .collect()
    }
}
