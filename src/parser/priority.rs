/// Operator precedence levels consumed by the precedence-climbing parser,
/// lowest-precedence level first.
///
/// A table belongs to one parser. Sub-parses that need a different table
/// (range bounds, compare operands) install it through
/// [`Parser::with_table`](crate::parser::Parser::with_table), which restores
/// the previous one on every exit path.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityTable {
    levels: Vec<Vec<&'static str>>,
}

impl PriorityTable {
    pub fn new(levels: Vec<Vec<&'static str>>) -> Self {
        PriorityTable { levels }
    }

    /// `+ -` below `* /`, nothing else. Used for range bounds and compare
    /// operands, where `,`, `&&` and `||` must end the operand.
    pub fn arithmetic() -> Self {
        PriorityTable::new(vec![vec!["+", "-"], vec!["*", "/"]])
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, k: usize) -> &[&'static str] {
        self.levels.get(k).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, k: usize, symbol: &str) -> bool {
        self.level(k).contains(&symbol)
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        PriorityTable::new(vec![
            vec!["||"],
            vec!["&&"],
            vec!["|", "^", "&"],
            vec!["==", "!=", ">", "<", ">=", "<="],
            vec!["<<", ">>"],
            vec!["+", "-"],
            vec!["*", "/"],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_orders_logical_below_arithmetic() {
        let table = PriorityTable::default();
        assert!(table.contains(0, "||"));
        assert!(table.contains(1, "&&"));
        assert!(table.contains(table.len() - 1, "*"));
    }

    #[test]
    fn test_arithmetic_has_no_logical_level() {
        let table = PriorityTable::arithmetic();
        assert_eq!(table.len(), 2);
        assert!(!(0..table.len()).any(|k| table.contains(k, "&&")));
        assert!(table.level(5).is_empty());
    }
}
