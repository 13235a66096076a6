use crate::calculations::{CalculationError, DatePass};
use crate::component::{Component, ComponentKind, ComponentResult, DatedAmount, ValueMap};
use crate::formula::{FormulaEvaluator, Interpreter};
use crate::recurrence::occurrences;
use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Evaluate dates across threads. The merged output is identical to
    /// the serial path either way.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Drives occurrence generation, lookup and per-date evaluation across a
/// query window.
///
/// Generic over the formula evaluator so tests can plug in a
/// deterministic double; `Engine::new()` uses the production
/// [`Interpreter`].
pub struct Engine<E = Interpreter> {
    evaluator: E,
    config: EngineConfig,
}

impl Engine<Interpreter> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            evaluator: Interpreter::new(),
            config,
        }
    }
}

impl Default for Engine<Interpreter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: FormulaEvaluator + Sync> Engine<E> {
    pub fn with_evaluator(evaluator: E) -> Self {
        Self {
            evaluator,
            config: EngineConfig::default(),
        }
    }

    pub fn with_evaluator_and_config(evaluator: E, config: EngineConfig) -> Self {
        Self { evaluator, config }
    }

    /// Computes every component's dated amounts over the inclusive window
    /// `[from, to]`.
    ///
    /// Returns one result per input component, in input order, each with
    /// its firing dates ascending (empty when it never fires). Any
    /// [`CalculationError`] aborts the whole call; an inverted window
    /// yields all-empty results.
    pub fn calculate(
        &self,
        components: &[Component],
        values: &ValueMap,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ComponentResult>, CalculationError> {
        let mut results: Vec<ComponentResult> = components
            .iter()
            .map(|component| ComponentResult {
                id: component.id.clone(),
                name: component.name.clone(),
                results: Vec::new(),
            })
            .collect();
        if from > to {
            return Ok(results);
        }

        // Component ids are an input invariant; if one is duplicated the
        // first occurrence wins and later ones never fire.
        let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(components.len());
        for (index, component) in components.iter().enumerate() {
            by_id.entry(component.id.as_str()).or_insert(index);
        }

        // Occurrence dates per (component, period), computed once for the
        // whole window; per-date firing checks become set lookups.
        let occurrence_sets: Vec<Vec<BTreeSet<NaiveDate>>> = components
            .iter()
            .map(|component| match &component.kind {
                ComponentKind::Recurring { periods } => periods
                    .iter()
                    .map(|cp| occurrences(&cp.period, from, to).into_iter().collect())
                    .collect(),
                ComponentKind::OneTime { .. } => Vec::new(),
            })
            .collect();

        let mut dates = Vec::new();
        let mut date = from;
        while date <= to {
            dates.push(date);
            date += Duration::days(1);
        }

        let run_date = |&date: &NaiveDate| -> Result<Vec<(usize, f64)>, CalculationError> {
            let firing = self.firing_on(components, &by_id, &occurrence_sets, date);
            DatePass::new(components, &by_id, values, &self.evaluator).execute(date, &firing)
        };

        let daily: Vec<Vec<(usize, f64)>> = if self.config.parallel {
            dates
                .par_iter()
                .map(run_date)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            dates
                .iter()
                .map(run_date)
                .collect::<Result<Vec<_>, _>>()?
        };

        // Dates are already ascending, so appending keeps each result list
        // sorted.
        let mut amount_count = 0usize;
        for (date, amounts) in dates.iter().zip(daily) {
            amount_count += amounts.len();
            for (index, amount) in amounts {
                results[index].results.push(DatedAmount {
                    date: *date,
                    amount,
                });
            }
        }
        debug!(
            components = components.len(),
            days = dates.len(),
            amounts = amount_count,
            "calculation finished"
        );
        Ok(results)
    }

    /// The indices of components firing on `date`: one-time components on
    /// their exact date, recurring ones when the period chosen by lookup
    /// actually generates the date. Containment alone is not enough.
    fn firing_on(
        &self,
        components: &[Component],
        by_id: &HashMap<&str, usize>,
        occurrence_sets: &[Vec<BTreeSet<NaiveDate>>],
        date: NaiveDate,
    ) -> Vec<usize> {
        components
            .iter()
            .enumerate()
            .filter(|(index, component)| {
                if by_id[component.id.as_str()] != *index {
                    return false;
                }
                match &component.kind {
                    ComponentKind::OneTime { date: event, .. } => *event == date,
                    ComponentKind::Recurring { .. } => component
                        .calculation_period_on(date)
                        .is_some_and(|(period_index, _)| {
                            occurrence_sets[*index][period_index].contains(&date)
                        }),
                }
            })
            .map(|(index, _)| index)
            .collect()
    }
}
