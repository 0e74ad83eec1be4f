//! Host-pluggable chain operators.
//!
//! A UDF takes the place of a built-in operator in a chain pipeline:
//!
//! ```text
//! positiveFilter().filter(>30).sum().meet(>100)   // filter position
//! filter(!=0).maxcalc().meet(>=8)                 // aggregation position
//! sum().positiveMeet()                            // terminal position
//! ```
//!
//! Names are resolved when a rule is compiled, so an unknown name fails the
//! compile instead of the first `execute`.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::value::Event;

/// Decides whether an event enters a pipeline.
pub trait FilterUdf: Send + Sync {
    fn filter(&self, event: &Event) -> bool;
}

/// Reduces the retained events to one number.
pub trait CalculatorUdf: Send + Sync {
    fn calculate(&self, events: &[Event]) -> f64;
}

/// Final decision on an aggregate.
pub trait MeetUdf: Send + Sync {
    fn meet(&self, value: f64) -> bool;
}

impl<F> FilterUdf for F
where
    F: Fn(&Event) -> bool + Send + Sync,
{
    fn filter(&self, event: &Event) -> bool {
        self(event)
    }
}

impl<F> CalculatorUdf for F
where
    F: Fn(&[Event]) -> f64 + Send + Sync,
{
    fn calculate(&self, events: &[Event]) -> f64 {
        self(events)
    }
}

impl<F> MeetUdf for F
where
    F: Fn(f64) -> bool + Send + Sync,
{
    fn meet(&self, value: f64) -> bool {
        self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdfKind {
    Filter,
    Calculator,
    Meet,
}

impl fmt::Display for UdfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UdfKind::Filter => write!(f, "filter"),
            UdfKind::Calculator => write!(f, "calculator"),
            UdfKind::Meet => write!(f, "meet"),
        }
    }
}

/// A registered operator of one of the three kinds.
#[derive(Clone)]
pub enum Udf {
    Filter(Arc<dyn FilterUdf>),
    Calculator(Arc<dyn CalculatorUdf>),
    Meet(Arc<dyn MeetUdf>),
}

impl Udf {
    pub fn kind(&self) -> UdfKind {
        match self {
            Udf::Filter(_) => UdfKind::Filter,
            Udf::Calculator(_) => UdfKind::Calculator,
            Udf::Meet(_) => UdfKind::Meet,
        }
    }
}

impl fmt::Debug for Udf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Udf::{}", self.kind())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UdfError {
    /// No operator of this kind is registered under the name
    NotFound { kind: UdfKind, name: String },
}

impl fmt::Display for UdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UdfError::NotFound { kind, name } => {
                write!(f, "No {} UDF named '{}' is registered", kind, name)
            }
        }
    }
}

impl std::error::Error for UdfError {}

/// Name → operator table consulted while translating chains.
///
/// Cloning is cheap: operators are shared behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct UdfRegistry {
    entries: HashMap<String, Udf>,
}

impl UdfRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        UdfRegistry::default()
    }

    /// Registry preloaded with `numericFilter`, `positiveFilter`, `evenMeet`
    /// and `positiveMeet`.
    pub fn with_builtins() -> Self {
        let mut registry = UdfRegistry::new();
        registry.register_filter("numericFilter", |event: &Event| {
            event.value.to_number().is_some()
        });
        registry.register_filter("positiveFilter", |event: &Event| {
            event.value.to_number().is_some_and(|n| n > 0.0)
        });
        registry.register_meet("evenMeet", |value: f64| {
            value.fract() == 0.0 && value % 2.0 == 0.0
        });
        registry.register_meet("positiveMeet", |value: f64| value > 0.0);
        registry
    }

    /// Registers `udf` under `name`, replacing any previous operator of that name.
    pub fn register(&mut self, name: impl Into<String>, udf: Udf) -> &mut Self {
        self.entries.insert(name.into(), udf);
        self
    }

    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        udf: impl FilterUdf + 'static,
    ) -> &mut Self {
        self.register(name, Udf::Filter(Arc::new(udf)))
    }

    pub fn register_calculator(
        &mut self,
        name: impl Into<String>,
        udf: impl CalculatorUdf + 'static,
    ) -> &mut Self {
        self.register(name, Udf::Calculator(Arc::new(udf)))
    }

    pub fn register_meet(
        &mut self,
        name: impl Into<String>,
        udf: impl MeetUdf + 'static,
    ) -> &mut Self {
        self.register(name, Udf::Meet(Arc::new(udf)))
    }

    pub fn kind_of(&self, name: &str) -> Option<UdfKind> {
        self.entries.get(name).map(Udf::kind)
    }

    pub fn is_kind(&self, name: &str, kind: UdfKind) -> bool {
        self.kind_of(name) == Some(kind)
    }

    pub fn filter(&self, name: &str) -> Result<&Arc<dyn FilterUdf>, UdfError> {
        match self.entries.get(name) {
            Some(Udf::Filter(udf)) => Ok(udf),
            _ => Err(not_found(UdfKind::Filter, name)),
        }
    }

    pub fn calculator(&self, name: &str) -> Result<&Arc<dyn CalculatorUdf>, UdfError> {
        match self.entries.get(name) {
            Some(Udf::Calculator(udf)) => Ok(udf),
            _ => Err(not_found(UdfKind::Calculator, name)),
        }
    }

    pub fn meet(&self, name: &str) -> Result<&Arc<dyn MeetUdf>, UdfError> {
        match self.entries.get(name) {
            Some(Udf::Meet(udf)) => Ok(udf),
            _ => Err(not_found(UdfKind::Meet, name)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn not_found(kind: UdfKind, name: &str) -> UdfError {
    UdfError::NotFound {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered_by_kind() {
        let registry = UdfRegistry::with_builtins();
        assert_eq!(registry.kind_of("positiveFilter"), Some(UdfKind::Filter));
        assert_eq!(registry.kind_of("evenMeet"), Some(UdfKind::Meet));
        assert!(registry.calculator("positiveFilter").is_err());

        let mut names: Vec<&str> = registry.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["evenMeet", "numericFilter", "positiveFilter", "positiveMeet"]);
        assert_eq!(registry.len(), 4);
        assert!(UdfRegistry::new().is_empty());
    }

    #[test]
    fn test_closure_registration() {
        let mut registry = UdfRegistry::new();
        registry.register_calculator("maxcalc", |events: &[Event]| {
            events
                .iter()
                .filter_map(|e| e.value.to_number())
                .fold(f64::MIN, f64::max)
        });
        let calc = registry.calculator("maxcalc").unwrap();
        let events = [Event::at(3, 0), Event::at(8, 1)];
        assert_eq!(calc.calculate(&events), 8.0);
    }

    #[test]
    fn test_builtin_filters() {
        let registry = UdfRegistry::with_builtins();
        let positive = registry.filter("positiveFilter").unwrap();
        assert!(positive.filter(&Event::at(2.5, 0)));
        assert!(!positive.filter(&Event::at("off", 0)));
        let even = registry.meet("evenMeet").unwrap();
        assert!(even.meet(4.0));
        assert!(!even.meet(3.0));
    }
}
