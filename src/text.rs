//! Word tokenization and stemming for narrative matching.
//!
//! The reference [`EnglishNormalizer`] runs tantivy's tokenizer pipeline:
//! alphanumeric word splitting, lowercasing, and the Snowball (Porter2)
//! English stemmer. Strong verb forms such as "stole" or "slain" are mapped
//! to their base form before stemming so that they share a stem with the
//! present tense.

use tantivy::tokenizer::{
    Language, LowerCaser, RawTokenizer, SimpleTokenizer, Stemmer, TextAnalyzer, TokenStream,
};

/// Splits text into word tokens and reduces tokens to a stem.
pub trait TextNormalizer: Send + Sync {
    /// Lowercased word tokens in narrative order.
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Stem of a single token. The token is taken whole, never re-split.
    fn stem(&self, token: &str) -> String;
}

#[derive(Clone)]
pub struct EnglishNormalizer {
    words: TextAnalyzer,
    stemmer: TextAnalyzer,
}

impl EnglishNormalizer {
    pub fn new() -> Self {
        let words = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .build();
        let stemmer = TextAnalyzer::builder(RawTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();

        Self { words, stemmer }
    }
}

impl Default for EnglishNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer for EnglishNormalizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        run_analyzer(&self.words, text)
    }

    fn stem(&self, token: &str) -> String {
        let lower = token.to_lowercase();
        if lower.is_empty() {
            return lower;
        }

        let base = irregular_base(&lower).unwrap_or(&lower);
        run_analyzer(&self.stemmer, base)
            .into_iter()
            .next()
            .unwrap_or_else(|| base.to_string())
    }
}

fn run_analyzer(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
    // token_stream needs &mut; analyzers are cheap to clone.
    let mut analyzer = analyzer.clone();
    let mut stream = analyzer.token_stream(text);
    let mut out = Vec::new();
    while stream.advance() {
        out.push(stream.token().text.clone());
    }
    out
}

/// Base form for the strong-verb forms used by catalog keywords that a
/// suffix stemmer cannot reach. Forms that double as common nouns ("bit",
/// "shot", "lost") are left out.
fn irregular_base(word: &str) -> Option<&'static str> {
    let base = match word {
        "stole" | "stolen" => "steal",
        "beaten" => "beat",
        "slain" | "slew" => "slay",
        _ => return None,
    };
    Some(base)
}
