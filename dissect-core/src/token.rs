//! Interned string tokens.
//!
//! Every label the pipeline handles (layer ids, tags) is interned once into a
//! [`TokenTable`] and passed around as a 32-bit [`Token`]. The table is an
//! explicit shared component: construct it once, wrap it in an `Arc` and hand
//! it to every [`crate::Session`]. Tokens are never evicted.
//!
//! ```rust
//! use dissect_core::TokenTable;
//!
//! let tokens = TokenTable::new();
//! let eth = tokens.intern("eth");
//! assert_eq!(tokens.intern("eth"), eth);
//! assert_eq!(tokens.resolve(eth).unwrap(), "eth");
//! ```

use std::collections::HashMap;
use std::fmt;

use compact_str::CompactString;
use parking_lot::RwLock;

use crate::error::TokenError;

/// Interned label id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Token(u32);

impl Token {
    /// Token of the empty string, pre-issued by every table.
    pub const NULL: Token = Token(0);

    /// Raw 32-bit id.
    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(id: u32) -> Self {
        Token(id)
    }

    /// Whether this is the empty-string token.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> u32 {
        token.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Inner {
    by_name: HashMap<CompactString, Token>,
    names: Vec<CompactString>,
}

/// Thread-safe get-or-insert string registry.
#[derive(Debug)]
pub struct TokenTable {
    inner: RwLock<Inner>,
}

impl TokenTable {
    /// Create a table holding only [`Token::NULL`].
    pub fn new() -> Self {
        let empty = CompactString::default();
        let mut by_name = HashMap::new();
        by_name.insert(empty.clone(), Token::NULL);
        Self {
            inner: RwLock::new(Inner {
                by_name,
                names: vec![empty],
            }),
        }
    }

    /// Get the token for `name`, issuing a new one if needed.
    pub fn intern(&self, name: &str) -> Token {
        // Fast path: already interned (read lock only)
        if let Some(token) = self.inner.read().by_name.get(name) {
            return *token;
        }

        let mut inner = self.inner.write();
        // Another thread may have won the race between the two locks
        if let Some(token) = inner.by_name.get(name) {
            return *token;
        }

        let token = Token(inner.names.len() as u32);
        let name = CompactString::from(name);
        inner.names.push(name.clone());
        inner.by_name.insert(name, token);
        token
    }

    /// Get the token for `name` without issuing one.
    pub fn lookup(&self, name: &str) -> Option<Token> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Get the string a token was issued for.
    pub fn resolve(&self, token: Token) -> Result<CompactString, TokenError> {
        self.inner
            .read()
            .names
            .get(token.0 as usize)
            .cloned()
            .ok_or(TokenError::UnknownToken(token.0))
    }

    /// Number of issued tokens, including [`Token::NULL`].
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Always false: the empty-string token is issued at construction.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_null_token_is_empty_string() {
        let tokens = TokenTable::new();
        assert_eq!(tokens.intern(""), Token::NULL);
        assert_eq!(tokens.resolve(Token::NULL).unwrap(), "");
        assert!(Token::NULL.is_null());
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_intern_is_stable() {
        let tokens = TokenTable::new();
        let a = tokens.intern("eth");
        let b = tokens.intern("ipv4");
        assert_ne!(a, b);
        assert_eq!(tokens.intern("eth"), a);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_lookup_does_not_insert() {
        let tokens = TokenTable::new();
        assert!(tokens.lookup("tcp").is_none());
        assert_eq!(tokens.len(), 1);

        let tcp = tokens.intern("tcp");
        assert_eq!(tokens.lookup("tcp"), Some(tcp));
    }

    #[test]
    fn test_resolve_unknown_token() {
        let tokens = TokenTable::new();
        let err = tokens.resolve(Token(99)).unwrap_err();
        assert_eq!(err, TokenError::UnknownToken(99));
    }

    #[test]
    fn test_concurrent_intern_agrees() {
        let tokens = Arc::new(TokenTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokens = Arc::clone(&tokens);
                thread::spawn(move || {
                    (0..100)
                        .map(|i| tokens.intern(&format!("label-{}", i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<Token>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
        // 100 labels plus the empty string
        assert_eq!(tokens.len(), 101);
    }

    proptest! {
        #[test]
        fn prop_resolve_roundtrips(s in ".*") {
            let tokens = TokenTable::new();
            let token = tokens.intern(&s);
            let resolved = tokens.resolve(token).unwrap();
            prop_assert_eq!(resolved.as_str(), s.as_str());
        }

        #[test]
        fn prop_intern_is_injective(a in "[a-z]{0,8}", b in "[a-z]{0,8}") {
            let tokens = TokenTable::new();
            let ta = tokens.intern(&a);
            let tb = tokens.intern(&b);
            prop_assert_eq!(ta == tb, a == b);
        }
    }
}
