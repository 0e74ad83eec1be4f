use std::fmt;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Logical
    /// Logical OR (`||`)
    Or,
    /// Logical AND (`&&`)
    And,

    // Bitwise
    /// Bitwise OR (`|`)
    BitOr,
    /// Bitwise XOR (`^`)
    BitXor,
    /// Bitwise AND (`&`)
    BitAnd,
    /// Shift left (`<<`)
    ShiftLeft,
    /// Shift right (`>>`)
    ShiftRight,

    // Comparison between two operands
    /// Equal (`==`)
    Equal,
    /// Not equal (`!=`)
    NotEqual,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than (`<`)
    LessThan,
    /// Greater than or equal (`>=`)
    GreaterEqual,
    /// Less than or equal (`<=`)
    LessEqual,

    // Arithmetic
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
}

impl BinOp {
    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        let op = match symbol {
            "||" => BinOp::Or,
            "&&" => BinOp::And,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "&" => BinOp::BitAnd,
            "<<" => BinOp::ShiftLeft,
            ">>" => BinOp::ShiftRight,
            "==" => BinOp::Equal,
            "!=" => BinOp::NotEqual,
            ">" => BinOp::GreaterThan,
            "<" => BinOp::LessThan,
            ">=" => BinOp::GreaterEqual,
            "<=" => BinOp::LessEqual,
            "+" => BinOp::Add,
            "-" => BinOp::Subtract,
            "*" => BinOp::Multiply,
            "/" => BinOp::Divide,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::ShiftLeft => "<<",
            BinOp::ShiftRight => ">>",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::GreaterThan => ">",
            BinOp::LessThan => "<",
            BinOp::GreaterEqual => ">=",
            BinOp::LessEqual => "<=",
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::Or | BinOp::And)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinOp::BitOr | BinOp::BitXor | BinOp::BitAnd | BinOp::ShiftLeft | BinOp::ShiftRight
        )
    }

    pub fn is_comparison(self) -> bool {
        self.as_compare().is_some()
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide
        )
    }

    /// The comparison this operator performs, if it is one.
    pub fn as_compare(self) -> Option<CompareOp> {
        match self {
            BinOp::Equal => Some(CompareOp::Equal),
            BinOp::NotEqual => Some(CompareOp::NotEqual),
            BinOp::GreaterThan => Some(CompareOp::GreaterThan),
            BinOp::LessThan => Some(CompareOp::LessThan),
            BinOp::GreaterEqual => Some(CompareOp::GreaterEqual),
            BinOp::LessEqual => Some(CompareOp::LessEqual),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation (`!`)
    Not,
    /// Increment (`++`)
    Increment,
    /// Decrement (`--`)
    Decrement,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<UnaryOp> {
        match symbol {
            "!" => Some(UnaryOp::Not),
            "++" => Some(UnaryOp::Increment),
            "--" => Some(UnaryOp::Decrement),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Increment => "++",
            UnaryOp::Decrement => "--",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operator of a compare expression such as `>=10`, applied to the value
/// under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<CompareOp> {
        BinOp::from_symbol(symbol).and_then(BinOp::as_compare)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::GreaterThan => ">",
            CompareOp::LessThan => "<",
            CompareOp::GreaterEqual => ">=",
            CompareOp::LessEqual => "<=",
        }
    }

    /// `==` and `!=` accept any scalar; the orderings need numbers.
    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
