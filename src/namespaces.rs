//! XML namespace handling
//!
//! Prefix-to-URI resolution for the NeXML parser. Scopes stack while the
//! document is read; each element resolves its tag against the innermost
//! declarations.

use std::collections::HashMap;

/// Namespace scope for resolving prefixes
///
/// One scope per open element during parsing; lookups walk outward.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<String, String>,
    /// Default namespace (no prefix)
    default_namespace: Option<String>,
}

impl NamespaceScope {
    /// Create a new empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix in this scope only
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace of this scope
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Check whether this scope declares anything
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }
}

/// Stack of namespace scopes built up while parsing
#[derive(Debug, Clone, Default)]
pub struct NamespaceStack {
    scopes: Vec<NamespaceScope>,
}

impl NamespaceStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a scope for an element being opened
    pub fn push(&mut self, scope: NamespaceScope) {
        self.scopes.push(scope);
    }

    /// Pop the scope of an element being closed
    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Resolve a prefix to a namespace URI, innermost scope first
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get_namespace(prefix))
    }

    /// Resolve the default namespace in effect
    pub fn default_namespace(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get_default_namespace())
    }

    /// Resolve a possibly-prefixed tag name to its namespace URI
    ///
    /// Unprefixed names resolve to the default namespace; an unknown
    /// prefix resolves to no namespace (NeXML documents in the wild carry
    /// undeclared prefixes in attribute values, which we must tolerate).
    pub fn resolve_tag(&self, tag: &str) -> Option<String> {
        match tag.split_once(':') {
            Some((prefix, _)) => self.resolve_prefix(prefix).map(|s| s.to_string()),
            None => self.default_namespace().map(|s| s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_declarations() {
        let mut scope = NamespaceScope::new();
        scope.add_prefix("nex", "http://www.nexml.org/2009");
        scope.set_default_namespace("http://www.nexml.org/2009");

        assert_eq!(scope.get_namespace("nex"), Some("http://www.nexml.org/2009"));
        assert_eq!(
            scope.get_default_namespace(),
            Some("http://www.nexml.org/2009")
        );
        assert!(!scope.is_empty());
    }

    #[test]
    fn test_stack_resolution_innermost_wins() {
        let mut stack = NamespaceStack::new();
        let mut outer = NamespaceScope::new();
        outer.add_prefix("a", "http://outer.example");
        stack.push(outer);
        let mut inner = NamespaceScope::new();
        inner.add_prefix("a", "http://inner.example");
        stack.push(inner);

        assert_eq!(stack.resolve_prefix("a"), Some("http://inner.example"));
        stack.pop();
        assert_eq!(stack.resolve_prefix("a"), Some("http://outer.example"));
    }

    #[test]
    fn test_resolve_tag() {
        let mut stack = NamespaceStack::new();
        let mut scope = NamespaceScope::new();
        scope.add_prefix("nex", "http://www.nexml.org/2009");
        scope.set_default_namespace("http://default.example");
        stack.push(scope);

        assert_eq!(
            stack.resolve_tag("nex:tree"),
            Some("http://www.nexml.org/2009".to_string())
        );
        assert_eq!(
            stack.resolve_tag("tree"),
            Some("http://default.example".to_string())
        );
        assert_eq!(stack.resolve_tag("unknown:tree"), None);
    }
}
