use crate::period::Period;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Period key under which one-time components store their input values.
pub const ONE_TIME_PERIOD_ID: &str = "";

/// Caller-supplied runtime values, keyed component id, then period id
/// (`ONE_TIME_PERIOD_ID` for one-time components), then input id.
pub type ValueMap = HashMap<String, HashMap<String, HashMap<String, InputValue>>>;

/// An income item: either a single dated event or a list of recurring
/// calculation periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: ComponentKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    OneTime {
        date: NaiveDate,
        calculation: Calculation,
    },
    Recurring {
        periods: Vec<CalculationPeriod>,
    },
}

/// One recurrence span of a recurring component, owning the calculation
/// that applies to dates inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationPeriod {
    pub id: String,
    pub period: Period,
    pub calculation: Calculation,
}

/// The `{inputs, dependency ids, formula}` triple evaluated at each firing
/// date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub inputs: Vec<Input>,
    pub dependencies: Vec<String>,
    pub formula: String,
}

/// A typed parameter the formula reads from its `inputs` binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: InputKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<bool>,
    },
    Select {
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    Range {
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<f64>,
    },
}

/// A runtime value bound to an input id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Input {
    /// The value used when the caller supplied none: the declared default,
    /// or a type-appropriate fallback.
    pub fn fallback_value(&self) -> InputValue {
        match &self.kind {
            InputKind::Text { default } => {
                InputValue::Text(default.clone().unwrap_or_default())
            }
            InputKind::Number { default, min, .. } => {
                InputValue::Number(default.or(*min).unwrap_or(0.0))
            }
            InputKind::Boolean { default } => InputValue::Bool(default.unwrap_or(false)),
            InputKind::Select { options, default } => InputValue::Text(
                default
                    .clone()
                    .or_else(|| options.first().cloned())
                    .unwrap_or_default(),
            ),
            InputKind::Range { min, default, .. } => {
                InputValue::Number(default.unwrap_or(*min))
            }
        }
    }
}

impl Component {
    pub fn new_one_time(
        id: impl Into<String>,
        name: impl Into<String>,
        date: NaiveDate,
        calculation: Calculation,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            kind: ComponentKind::OneTime { date, calculation },
        }
    }

    pub fn new_recurring(
        id: impl Into<String>,
        name: impl Into<String>,
        periods: Vec<CalculationPeriod>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            kind: ComponentKind::Recurring { periods },
        }
    }

    /// The calculation period applying to `date`, along with its position
    /// in the declared list.
    ///
    /// Periods are considered in ascending start-date order (declaration
    /// order breaks ties) and the first whose span contains `date` wins.
    pub fn calculation_period_on(&self, date: NaiveDate) -> Option<(usize, &CalculationPeriod)> {
        let ComponentKind::Recurring { periods } = &self.kind else {
            return None;
        };
        let mut ordered: Vec<(usize, &CalculationPeriod)> = periods.iter().enumerate().collect();
        ordered.sort_by_key(|(_, cp)| cp.period.start_date);
        ordered
            .into_iter()
            .find(|(_, cp)| cp.period.contains(date))
    }

    /// The applicable calculation on `date`, with the period id that keys
    /// this component's entries in the [`ValueMap`].
    ///
    /// One-time components match only their exact date; recurring ones
    /// resolve through [`Component::calculation_period_on`].
    pub fn calculation_on(&self, date: NaiveDate) -> Option<(&str, &Calculation)> {
        match &self.kind {
            ComponentKind::OneTime {
                date: event_date,
                calculation,
            } => (*event_date == date).then_some((ONE_TIME_PERIOD_ID, calculation)),
            ComponentKind::Recurring { .. } => self
                .calculation_period_on(date)
                .map(|(_, cp)| (cp.id.as_str(), &cp.calculation)),
        }
    }
}

/// Per-component computed amounts over a query window, in ascending date
/// order. Built fresh by every `calculate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub id: String,
    pub name: String,
    pub results: Vec<DatedAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedAmount {
    pub date: NaiveDate,
    pub amount: f64,
}
