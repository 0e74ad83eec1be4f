//! Executable IR produced by the translator.
//!
//! A compiled rule is an entry [`Code`] plus an ordered list of named
//! [`Fragment`]s. Stateful constructs (chains, arrows, `count`, `keep`,
//! `delay`, `slope`) become fragments; the code that uses them holds a
//! zero-argument [`Code::Call`]. `Display` renders the target text shown by
//! `rhythmix check --emit`.

use std::fmt;

use crate::{
    ast::{BinOp, CompareOp},
    value::Value,
};

/// Expression over the value under test.
#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    Literal(Value),

    /// The value under test: the event value, a retained value inside
    /// `hitRate`, or the aggregate inside `meet`
    Subject,

    Binary {
        op: BinOp,
        left: Box<Code>,
        right: Box<Code>,
    },

    Not(Box<Code>),

    /// `++x` / `--x`
    Step { operand: Box<Code>, delta: i64 },

    /// Guarded comparison of the subject against `operand`
    Compare { op: CompareOp, operand: Box<Code> },

    /// Runs fragment `index` of the compiled rule
    Call { name: String, index: usize },

    /// Registered filter UDF applied to the current event
    FilterUdf(String),
}

impl Code {
    pub fn binary(op: BinOp, left: Code, right: Code) -> Code {
        Code::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, operand: Code) -> Code {
        Code::Compare {
            op,
            operand: Box::new(operand),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Literal(v) => write!(f, "{}", v),
            Code::Subject => write!(f, "value"),
            Code::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Code::Not(inner) => write!(f, "(!{})", inner),
            Code::Step { operand, delta } => {
                let sign = if *delta < 0 { '-' } else { '+' };
                write!(f, "({0} = {0} {1} {2})", operand, sign, delta.abs())
            }
            Code::Compare { op, operand } => write!(f, "(value {} {})", op, operand),
            Code::Call { name, .. } => write!(f, "{}()", name),
            Code::FilterUdf(name) => write!(f, "{}(event)", name),
        }
    }
}

/// Sampler size: a number of values or a time span in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Count(usize),
    Duration(i64),
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Span::Count(n) => write!(f, "{}", n),
            Span::Duration(ms) => write!(f, "{}ms", ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterStep {
    Cond(Code),
    Udf(String),
}

/// Retention policy of a chain. `None` in [`ChainPlan::sampler`] keeps
/// everything (`collect`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    Limit(Span),
    Window(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Calculator {
    Sum,
    Avg,
    Min,
    Max,
    Stddev,
    Count,
    HitRate(Code),
    Udf(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Meet {
    Cond(Code),
    Udf(String),
}

/// Validated chain pipeline, always in the order
/// filters → retention → take → calculator → meet → clear.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainPlan {
    /// Empty admits every value
    pub filters: Vec<FilterStep>,
    pub sampler: Option<Sampler>,
    /// `take(start[, end])`
    pub take: Option<(i64, Option<i64>)>,
    pub calc: Calculator,
    pub meet: Meet,
    pub clear: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowPlan {
    pub stages: Vec<Code>,
    /// Fragments nested in the stages; their state is wiped whenever the
    /// sequence completes.
    pub owned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionPlan {
    Count {
        cond: Code,
        times: u64,
        strict: bool,
    },
    Keep {
        cond: Code,
        duration_ms: i64,
    },
    Delay {
        duration_ms: i64,
    },
    Slope {
        cond: Code,
        unit_ms: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentBody {
    Chain(ChainPlan),
    Arrow(ArrowPlan),
    Function(FunctionPlan),
}

/// One named translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub name: String,
    pub body: FragmentBody,
}

impl fmt::Display for ChainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filters.is_empty() {
            write!(f, "filter()")?;
        }
        for (i, step) in self.filters.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match step {
                FilterStep::Cond(code) => write!(f, "filter({})", code)?,
                FilterStep::Udf(name) => write!(f, "{}()", name)?,
            }
        }
        match self.sampler {
            Some(Sampler::Limit(span)) => write!(f, ".limit({})", span)?,
            Some(Sampler::Window(span)) => write!(f, ".window({})", span)?,
            None => write!(f, ".collect()")?,
        }
        match self.take {
            Some((start, Some(end))) => write!(f, ".take({},{})", start, end)?,
            Some((start, None)) => write!(f, ".take({})", start)?,
            None => {}
        }
        match &self.calc {
            Calculator::Sum => write!(f, ".sum()")?,
            Calculator::Avg => write!(f, ".avg()")?,
            Calculator::Min => write!(f, ".min()")?,
            Calculator::Max => write!(f, ".max()")?,
            Calculator::Stddev => write!(f, ".stddev()")?,
            Calculator::Count => write!(f, ".count()")?,
            Calculator::HitRate(code) => write!(f, ".hitRate({})", code)?,
            Calculator::Udf(name) => write!(f, ".{}()", name)?,
        }
        match &self.meet {
            Meet::Cond(code) => write!(f, ".meet({})", code)?,
            Meet::Udf(name) => write!(f, ".{}()", name)?,
        }
        if self.clear {
            write!(f, ".clear()")?;
        }
        Ok(())
    }
}

impl fmt::Display for ArrowPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sequence(")?;
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", stage)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for FunctionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionPlan::Count {
                cond,
                times,
                strict,
            } => {
                let marker = if *strict { "!" } else { "" };
                write!(f, "count{}({}, {})", marker, cond, times)
            }
            FunctionPlan::Keep { cond, duration_ms } => {
                write!(f, "keep({}, {}ms)", cond, duration_ms)
            }
            FunctionPlan::Delay { duration_ms } => write!(f, "delay({}ms)", duration_ms),
            FunctionPlan::Slope { cond, unit_ms } => write!(f, "slope({}, {}ms)", cond, unit_ms),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}() := ", self.name)?;
        match &self.body {
            FragmentBody::Chain(plan) => write!(f, "{}", plan),
            FragmentBody::Arrow(plan) => write!(f, "{}", plan),
            FragmentBody::Function(plan) => write!(f, "{}", plan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_renders_target_text() {
        let range = Code::binary(
            BinOp::And,
            Code::compare(CompareOp::GreaterThan, Code::Literal(Value::Integer(1))),
            Code::compare(CompareOp::LessEqual, Code::Literal(Value::Integer(5))),
        );
        assert_eq!(range.to_string(), "((value > 1) && (value <= 5))");

        let call = Code::Call {
            name: "chain_1".to_string(),
            index: 0,
        };
        assert_eq!(call.to_string(), "chain_1()");
    }

    #[test]
    fn test_step_renders_as_assignment() {
        let step = Code::Step {
            operand: Box::new(Code::Subject),
            delta: -1,
        };
        assert_eq!(step.to_string(), "(value = value - 1)");
    }
}
