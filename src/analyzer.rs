//! Text analyzer selection
//!
//! All tokenized fields of the schema use one tokenizer name. The analyzer
//! behind that name is chosen from configuration and registered on every
//! index handle we open, so indexing and query parsing always agree.

use std::fmt;
use std::str::FromStr;
use tantivy::Index;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer,
    WhitespaceTokenizer,
};

/// Tokenizer name referenced by the schema's text fields
pub const WIKI_TOKENIZER: &str = "wiki_text";

/// Tokens longer than this are dropped
const MAX_TOKEN_LEN: usize = 40;

/// Supported analyzers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Analyzer {
    /// Word tokenizer, long-token filter, lowercase
    #[default]
    Standard,
    /// Standard plus English stemming
    English,
    /// Whitespace tokenizer, lowercase
    Whitespace,
}

impl Analyzer {
    /// Resolve a configured identifier, falling back to `Standard`
    ///
    /// A misconfigured analyzer is a recoverable configuration error: it
    /// is logged and never prevents startup.
    pub fn from_config(identifier: &str) -> Self {
        match identifier.parse() {
            Ok(analyzer) => analyzer,
            Err(e) => {
                tracing::error!("{}", e);
                tracing::warn!("Using default analyzer: {}", Analyzer::Standard);
                Analyzer::Standard
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::English => "english",
            Self::Whitespace => "whitespace",
        }
    }

    /// Build the tokenizer pipeline
    pub fn build(&self) -> TextAnalyzer {
        match self {
            Self::Standard => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
                .filter(LowerCaser)
                .build(),
            Self::English => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
                .filter(LowerCaser)
                .filter(Stemmer::new(Language::English))
                .build(),
            Self::Whitespace => TextAnalyzer::builder(WhitespaceTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
                .filter(LowerCaser)
                .build(),
        }
    }

    /// Register this analyzer on an index handle
    pub fn register(&self, index: &Index) {
        index.tokenizers().register(WIKI_TOKENIZER, self.build());
    }
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Analyzer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "standard" | "default" => Ok(Self::Standard),
            "english" | "en_stem" => Ok(Self::English),
            "whitespace" => Ok(Self::Whitespace),
            other => Err(format!("Unknown analyzer '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::tokenizer::TokenStream;

    fn tokens(analyzer: Analyzer, text: &str) -> Vec<String> {
        let mut pipeline = analyzer.build();
        let mut stream = pipeline.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    #[test]
    fn test_from_config_fallback() {
        assert_eq!(Analyzer::from_config("english"), Analyzer::English);
        assert_eq!(Analyzer::from_config("EN_STEM"), Analyzer::English);
        assert_eq!(Analyzer::from_config(""), Analyzer::Standard);
        assert_eq!(
            Analyzer::from_config("org.apache.lucene.analysis.Bogus"),
            Analyzer::Standard
        );
    }

    #[test]
    fn test_standard_lowercases_and_splits() {
        assert_eq!(
            tokens(Analyzer::Standard, "XWiki.Alice wrote Hello"),
            vec!["xwiki", "alice", "wrote", "hello"]
        );
    }

    #[test]
    fn test_english_stems() {
        assert_eq!(tokens(Analyzer::English, "Running pages"), vec!["run", "page"]);
    }

    #[test]
    fn test_whitespace_keeps_punctuation() {
        assert_eq!(tokens(Analyzer::Whitespace, "XWiki.Alice"), vec!["xwiki.alice"]);
    }
}
