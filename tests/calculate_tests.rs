use chrono::NaiveDate;
use income_tool::calculations::CalculationError;
use income_tool::component::{
    Calculation, CalculationPeriod, Component, ComponentResult, Input, InputKind, InputValue,
    ONE_TIME_PERIOD_ID, ValueMap,
};
use income_tool::engine::{Engine, EngineConfig};
use income_tool::formula::{FormulaError, FormulaEvaluator};
use income_tool::period::{DayRule, Frequency, Period};
use std::collections::HashMap;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn calculation(dependencies: &[&str], formula: &str) -> Calculation {
    Calculation {
        inputs: Vec::new(),
        dependencies: dependencies.iter().map(ToString::to_string).collect(),
        formula: formula.to_string(),
    }
}

fn daily_period(id: &str, start: NaiveDate, end: Option<NaiveDate>, calc: Calculation) -> CalculationPeriod {
    CalculationPeriod {
        id: id.to_string(),
        period: Period {
            start_date: start,
            end_date: end,
            frequency: Frequency::Daily { every: 1 },
        },
        calculation: calc,
    }
}

fn number_input(id: &str, default: Option<f64>, min: Option<f64>) -> Input {
    Input {
        id: id.to_string(),
        label: None,
        kind: InputKind::Number {
            default,
            min,
            max: None,
        },
    }
}

fn dates_of(result: &ComponentResult) -> Vec<NaiveDate> {
    result.results.iter().map(|entry| entry.date).collect()
}

fn amounts_of(result: &ComponentResult) -> Vec<f64> {
    result.results.iter().map(|entry| entry.amount).collect()
}

#[test]
fn dependent_components_resolve_per_date() {
    let mut calc_a = calculation(&[], "return inputs.value + 1;");
    calc_a.inputs.push(number_input("value", None, None));
    let components = vec![
        Component::new_recurring("a", "A", vec![daily_period("pa", d(2023, 1, 1), None, calc_a)]),
        Component::new_recurring(
            "b",
            "B",
            vec![daily_period(
                "pb",
                d(2023, 1, 1),
                None,
                calculation(&["a"], "return dependencies.a * 2;"),
            )],
        ),
    ];
    let mut values = ValueMap::new();
    values.insert(
        "a".to_string(),
        HashMap::from([(
            "pa".to_string(),
            HashMap::from([("value".to_string(), InputValue::Number(3.0))]),
        )]),
    );

    let results = Engine::new()
        .calculate(&components, &values, d(2023, 6, 1), d(2023, 6, 3))
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "a");
    assert_eq!(results[1].id, "b");
    assert_eq!(
        dates_of(&results[0]),
        vec![d(2023, 6, 1), d(2023, 6, 2), d(2023, 6, 3)]
    );
    assert_eq!(amounts_of(&results[0]), vec![4.0, 4.0, 4.0]);
    assert_eq!(amounts_of(&results[1]), vec![8.0, 8.0, 8.0]);
}

#[test]
fn one_time_component_outside_the_window_stays_empty() {
    let components = vec![Component::new_one_time(
        "bonus",
        "Bonus",
        d(2022, 12, 31),
        calculation(&[], "return 1000;"),
    )];
    let results = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 1, 1), d(2023, 12, 31))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "bonus");
    assert!(results[0].results.is_empty());
}

#[test]
fn one_time_component_reads_values_under_the_empty_period_key() {
    let mut calc = calculation(&[], "return inputs.gross - inputs.fees;");
    calc.inputs.push(number_input("gross", None, None));
    calc.inputs.push(number_input("fees", Some(50.0), None));
    let components = vec![Component::new_one_time("sale", "Sale", d(2023, 6, 15), calc)];

    let mut values = ValueMap::new();
    values.insert(
        "sale".to_string(),
        HashMap::from([(
            ONE_TIME_PERIOD_ID.to_string(),
            HashMap::from([("gross".to_string(), InputValue::Number(900.0))]),
        )]),
    );

    let results = Engine::new()
        .calculate(&components, &values, d(2023, 6, 1), d(2023, 6, 30))
        .unwrap();
    assert_eq!(dates_of(&results[0]), vec![d(2023, 6, 15)]);
    // Supplied gross, defaulted fees.
    assert_eq!(amounts_of(&results[0]), vec![850.0]);
}

#[test]
fn undeclared_input_reference_yields_nan_not_an_error() {
    let components = vec![Component::new_recurring(
        "a",
        "A",
        vec![daily_period(
            "pa",
            d(2023, 1, 1),
            None,
            calculation(&[], "return inputs.ghost + 1;"),
        )],
    )];
    let results = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 6, 1), d(2023, 6, 1))
        .unwrap();
    assert_eq!(results[0].results.len(), 1);
    assert!(results[0].results[0].amount.is_nan());
}

#[test]
fn declared_inputs_fall_back_to_default_then_minimum() {
    let mut calc = calculation(&[], "return inputs.rate * inputs.hours;");
    calc.inputs.push(number_input("rate", Some(25.0), Some(10.0)));
    calc.inputs.push(number_input("hours", None, Some(8.0)));
    let components = vec![Component::new_recurring(
        "w",
        "Work",
        vec![daily_period("pw", d(2023, 1, 1), None, calc)],
    )];
    let results = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 6, 1), d(2023, 6, 1))
        .unwrap();
    // rate uses its default, hours falls back to its minimum.
    assert_eq!(amounts_of(&results[0]), vec![200.0]);
}

#[test]
fn recurring_component_switches_calculation_between_periods() {
    let monthly_first = |start: NaiveDate, end: Option<NaiveDate>| Period {
        start_date: start,
        end_date: end,
        frequency: Frequency::Monthly {
            every: 1,
            day_rule: DayRule::Each { day: 1 },
        },
    };
    let components = vec![Component::new_recurring(
        "salary",
        "Salary",
        vec![
            CalculationPeriod {
                id: "h1".to_string(),
                period: monthly_first(d(2023, 1, 1), Some(d(2023, 6, 30))),
                calculation: calculation(&[], "return 100;"),
            },
            CalculationPeriod {
                id: "h2".to_string(),
                period: monthly_first(d(2023, 7, 1), None),
                calculation: calculation(&[], "return 200;"),
            },
        ],
    )];
    let results = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 1, 1), d(2023, 12, 31))
        .unwrap();
    let amounts = amounts_of(&results[0]);
    assert_eq!(amounts.len(), 12);
    assert!(amounts[..6].iter().all(|&amount| amount == 100.0));
    assert!(amounts[6..].iter().all(|&amount| amount == 200.0));
    let dates = dates_of(&results[0]);
    assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn dependency_is_computed_even_when_it_does_not_fire() {
    let fifteenth = Period {
        start_date: d(2023, 1, 1),
        end_date: None,
        frequency: Frequency::Monthly {
            every: 1,
            day_rule: DayRule::Each { day: 15 },
        },
    };
    let components = vec![
        Component::new_recurring(
            "base",
            "Base",
            vec![CalculationPeriod {
                id: "pb".to_string(),
                period: fifteenth,
                calculation: calculation(&[], "return 10;"),
            }],
        ),
        Component::new_recurring(
            "derived",
            "Derived",
            vec![daily_period(
                "pd",
                d(2023, 1, 1),
                None,
                calculation(&["base"], "return dependencies.base * 2;"),
            )],
        ),
    ];
    let results = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 6, 10), d(2023, 6, 20))
        .unwrap();
    // base fires once in the window, derived fires daily and sees base's
    // value on every one of those days.
    assert_eq!(dates_of(&results[0]), vec![d(2023, 6, 15)]);
    assert_eq!(results[1].results.len(), 11);
    assert!(amounts_of(&results[1]).iter().all(|&amount| amount == 20.0));
}

#[test]
fn a_cycle_aborts_the_whole_call() {
    let components = vec![
        Component::new_recurring(
            "a",
            "A",
            vec![daily_period(
                "pa",
                d(2023, 1, 1),
                None,
                calculation(&["b"], "return dependencies.b;"),
            )],
        ),
        Component::new_recurring(
            "b",
            "B",
            vec![daily_period(
                "pb",
                d(2023, 1, 1),
                None,
                calculation(&["a"], "return dependencies.a;"),
            )],
        ),
        Component::new_recurring(
            "healthy",
            "Healthy",
            vec![daily_period("ph", d(2023, 1, 1), None, calculation(&[], "return 1;"))],
        ),
    ];
    let err = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 6, 1), d(2023, 6, 5))
        .unwrap_err();
    assert!(matches!(err, CalculationError::CircularDependency { .. }));
}

#[test]
fn a_missing_dependency_aborts_with_the_referrer() {
    let components = vec![Component::new_recurring(
        "b",
        "B",
        vec![daily_period(
            "pb",
            d(2023, 1, 1),
            None,
            calculation(&["gone"], "return dependencies.gone;"),
        )],
    )];
    let err = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 6, 1), d(2023, 6, 1))
        .unwrap_err();
    assert_eq!(
        err,
        CalculationError::DependencyNotFound {
            id: "gone".to_string(),
            referrer: "b".to_string(),
        }
    );
}

#[test]
fn parallel_and_serial_evaluation_agree() {
    let mut calc = calculation(&[], "return inputs.value * 2;");
    calc.inputs.push(number_input("value", Some(21.0), None));
    let components = vec![
        Component::new_recurring("a", "A", vec![daily_period("pa", d(2023, 1, 1), None, calc)]),
        Component::new_recurring(
            "b",
            "B",
            vec![daily_period(
                "pb",
                d(2023, 1, 1),
                None,
                calculation(&["a"], "return dependencies.a + 1;"),
            )],
        ),
    ];
    let values = ValueMap::new();
    let parallel = Engine::new()
        .calculate(&components, &values, d(2023, 3, 1), d(2023, 4, 30))
        .unwrap();
    let serial = Engine::with_config(EngineConfig { parallel: false })
        .calculate(&components, &values, d(2023, 3, 1), d(2023, 4, 30))
        .unwrap();
    assert_eq!(parallel, serial);
}

#[test]
fn inverted_window_returns_empty_results_in_input_order() {
    let components = vec![
        Component::new_one_time("z", "Z", d(2023, 1, 1), calculation(&[], "return 1;")),
        Component::new_one_time("a", "A", d(2023, 1, 1), calculation(&[], "return 1;")),
    ];
    let results = Engine::new()
        .calculate(&components, &ValueMap::new(), d(2023, 12, 31), d(2023, 1, 1))
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "z");
    assert_eq!(results[1].id, "a");
    assert!(results.iter().all(|result| result.results.is_empty()));
}

/// A fixed-amount evaluator demonstrating the evaluator seam: occurrence
/// and graph logic run without any real formula evaluation.
struct FlatEvaluator(f64);

impl FormulaEvaluator for FlatEvaluator {
    fn evaluate(
        &self,
        _source: &str,
        _inputs: &HashMap<String, InputValue>,
        _dependencies: &HashMap<String, f64>,
    ) -> Result<f64, FormulaError> {
        Ok(self.0)
    }
}

#[test]
fn engine_accepts_a_substitute_evaluator() {
    let components = vec![Component::new_recurring(
        "a",
        "A",
        vec![daily_period("pa", d(2023, 1, 1), None, calculation(&[], "anything at all"))],
    )];
    let results = Engine::with_evaluator(FlatEvaluator(7.0))
        .calculate(&components, &ValueMap::new(), d(2023, 6, 1), d(2023, 6, 2))
        .unwrap();
    assert_eq!(amounts_of(&results[0]), vec![7.0, 7.0]);
}

#[test]
fn component_set_deserializes_and_calculates() {
    let raw = r#"
    [
        {
            "id": "salary",
            "name": "Salary",
            "recurring": {
                "periods": [
                    {
                        "id": "main",
                        "period": {
                            "start_date": "2023-01-01",
                            "end_date": null,
                            "frequency": "monthly",
                            "every": 1,
                            "day_rule": { "each": { "day": 25 } }
                        },
                        "calculation": {
                            "inputs": [
                                { "id": "gross", "type": "number", "default": 3000.0 }
                            ],
                            "dependencies": [],
                            "formula": "return inputs.gross;"
                        }
                    }
                ]
            }
        },
        {
            "id": "tax",
            "name": "Tax",
            "recurring": {
                "periods": [
                    {
                        "id": "main",
                        "period": {
                            "start_date": "2023-01-01",
                            "end_date": null,
                            "frequency": "monthly",
                            "every": 1,
                            "day_rule": { "each": { "day": 25 } }
                        },
                        "calculation": {
                            "inputs": [],
                            "dependencies": ["salary"],
                            "formula": "return dependencies.salary * 0.2;"
                        }
                    }
                ]
            }
        }
    ]
    "#;
    let components: Vec<Component> = serde_json::from_str(raw).unwrap();
    let values: ValueMap = serde_json::from_str(
        r#"{ "salary": { "main": { "gross": 4000.0 } } }"#,
    )
    .unwrap();

    let results = Engine::new()
        .calculate(&components, &values, d(2023, 3, 1), d(2023, 4, 30))
        .unwrap();
    assert_eq!(dates_of(&results[0]), vec![d(2023, 3, 25), d(2023, 4, 25)]);
    assert_eq!(amounts_of(&results[0]), vec![4000.0, 4000.0]);
    assert_eq!(amounts_of(&results[1]), vec![800.0, 800.0]);
}
