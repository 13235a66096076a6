pub mod calculations;
pub mod component;
pub mod engine;
pub mod formula;
pub mod graph;
pub mod period;
pub mod recurrence;

pub use calculations::{CalculationError, DatePass};
pub use component::{
    Calculation, CalculationPeriod, Component, ComponentKind, ComponentResult, DatedAmount,
    Input, InputKind, InputValue, ONE_TIME_PERIOD_ID, ValueMap,
};
pub use engine::{Engine, EngineConfig};
pub use formula::{FormulaError, FormulaEvaluator, Interpreter};
pub use period::{DayKind, DayRule, Frequency, Ordinal, Period, in_period, merge};
pub use recurrence::{occurrences, occurs_on};
