use super::{Grammar, GrammarConfig, operator_list};

/// Dialect-neutral grammar.
///
/// Uses the default compilation of every [`Grammar`] method: JSON selectors
/// compile to `json_value(...)`, and features without a portable spelling
/// (upserts, lateral joins, JSON containment, full text search) report
/// [`QueryError::Unsupported`](crate::QueryError::Unsupported).
#[derive(Debug, Clone, Default)]
pub struct StandardGrammar {
    config: GrammarConfig,
    operators: Vec<String>,
}

impl StandardGrammar {
    pub fn new(config: GrammarConfig) -> Self {
        let operators = operator_list(&[], &config);
        Self { config, operators }
    }
}

impl Grammar for StandardGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn operators(&self) -> &[String] {
        &self.operators
    }

    fn bitwise_operators(&self) -> &[String] {
        &[]
    }
}
