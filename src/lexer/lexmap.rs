use std::collections::HashMap;

use super::Terminal;

/// Map from the literal spelling of a terminal to its token kind. Lookup is
/// maximal munch: the lexer keeps consuming characters as long as some entry
/// still starts with the text read so far.
#[derive(Debug, Clone, Default)]
pub struct LexMap {
    map: HashMap<&'static str, Terminal>,
}

impl LexMap {
    pub fn insert(&mut self, key: &'static str, value: Terminal) {
        self.map.insert(key, value);
    }

    pub fn can_match(&self, key: &str) -> bool {
        self.map.keys().any(|map_key| map_key.starts_with(key))
    }

    pub fn get(&self, key: &str) -> Option<Terminal> {
        self.map.get(key).copied()
    }
}
