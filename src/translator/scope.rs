use super::fragment::{Code, Fragment, FragmentBody};

/// Separator between a fragment prefix and its counter value.
pub const NAME_SEPARATOR: &str = "_";

/// Collision-free name source for one compile.
///
/// Every translation unit that needs its own namespace (an arrow, a chain,
/// a stateful call) draws a fresh suffix. The counter lives in the
/// [`TranslationContext`] of a single compile and is never shared.
#[derive(Debug, Clone, Default)]
pub struct NameScope {
    counter: usize,
}

impl NameScope {
    pub fn new() -> Self {
        NameScope::default()
    }

    /// `prefix_N` with `N` one above the last name handed out.
    pub fn next(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}{}{}", prefix, NAME_SEPARATOR, self.counter)
    }

    pub fn issued(&self) -> usize {
        self.counter
    }
}

/// State of one top-level translation.
#[derive(Debug, Default)]
pub struct TranslationContext {
    /// Fragments in emission order; nested fragments come before the
    /// fragment that calls them.
    pub codes: Vec<Fragment>,
    pub scope: NameScope,
    /// Name of the chain currently being translated, if any.
    pub pending_chain: Option<String>,
}

impl TranslationContext {
    pub fn new() -> Self {
        TranslationContext::default()
    }

    /// Appends a fragment and returns the zero-argument call that runs it.
    pub fn emit(&mut self, name: String, body: FragmentBody) -> Code {
        let index = self.codes.len();
        log::trace!("emit fragment #{} {}", index, name);
        self.codes.push(Fragment {
            name: name.clone(),
            body,
        });
        Code::Call { name, index }
    }

    /// Names of the fragments emitted since `mark` (a previous `codes.len()`).
    pub fn names_since(&self, mark: usize) -> Vec<String> {
        self.codes[mark.min(self.codes.len())..]
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        self.codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_never_repeat() {
        let mut scope = NameScope::new();
        assert_eq!(scope.next("chain"), "chain_1");
        assert_eq!(scope.next("arrow"), "arrow_2");
        assert_eq!(scope.next("chain"), "chain_3");
        assert_eq!(scope.issued(), 3);
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut a = NameScope::new();
        let mut b = NameScope::new();
        a.next("count");
        assert_eq!(b.next("count"), "count_1");
    }
}
