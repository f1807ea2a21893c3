// ============================================================
// Layer 3 — Gloss Vocabulary
// ============================================================
// Bidirectional mapping between gloss tokens and integer ids.
//
//   idx2gloss: ["-", "ICH", "HEUTE", ...]     (index → gloss)
//   gloss2idx: {"-": 0, "ICH": 1, ...}        (gloss → index)
//
// Index 0 is reserved for the CTC blank symbol "-". Every other
// index is dense and contiguous, assigned in class-list file order.
//
// The vocabulary is built once from the training class list at
// startup and is read-only afterwards; batching, decoding and the
// segmenter all borrow the same instance.
//
// Class-list format (first line is a header):
//
//   gloss_class count
//   ICH0 1532
//   ICH1 1298        ← sub-state entry, skipped
//   HEUTE0 921
//
// Only entries whose token ends in the terminal marker '0' survive,
// with the marker stripped.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

/// The reserved blank / unknown gloss.
pub const BLANK_GLOSS: &str = "-";

/// Id of the blank gloss.
pub const BLANK_ID: usize = 0;

/// Class-list entries ending in this marker are whole glosses.
const TERMINAL_MARKER: char = '0';

/// Result of encoding a single gloss token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedGloss {
    /// The token is in the vocabulary.
    Known(usize),
    /// The token is unknown and was mapped to the blank id.
    Fallback(String),
}

impl EncodedGloss {
    /// The id a consumer should use for this token.
    pub fn id(&self) -> usize {
        match self {
            EncodedGloss::Known(id) => *id,
            EncodedGloss::Fallback(_) => BLANK_ID,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EncodedGloss::Fallback(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    idx2gloss: Vec<String>,
    gloss2idx: HashMap<String, usize>,
}

impl Default for Vocabulary {
    /// A vocabulary holding only the blank gloss.
    fn default() -> Self {
        let mut gloss2idx = HashMap::new();
        gloss2idx.insert(BLANK_GLOSS.to_string(), BLANK_ID);
        Self {
            idx2gloss: vec![BLANK_GLOSS.to_string()],
            gloss2idx,
        }
    }
}

impl Vocabulary {
    /// Build the vocabulary from a class-list file.
    pub fn build(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open class list '{}'", path.display()))?;
        let vocab = Self::parse(file)
            .with_context(|| format!("Cannot read class list '{}'", path.display()))?;

        tracing::info!("Vocabulary of length {} (blank included)", vocab.len());
        Ok(vocab)
    }

    /// Parse a class list from any reader. The first line is a header.
    pub fn parse(reader: impl Read) -> Result<Self> {
        let mut vocab = Self::default();

        for line in BufReader::new(reader).lines().skip(1) {
            let line = line?;
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            let Some(gloss) = token.strip_suffix(TERMINAL_MARKER) else {
                continue;
            };
            vocab.push(gloss);
        }

        Ok(vocab)
    }

    /// Build a vocabulary directly from a gloss list (index = position + 1).
    pub fn from_glosses<I, S>(glosses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::default();
        for gloss in glosses {
            vocab.push(gloss.as_ref());
        }
        vocab
    }

    fn push(&mut self, gloss: &str) {
        let idx = self.idx2gloss.len();
        self.idx2gloss.push(gloss.to_string());
        // A repeated gloss keeps its first id.
        self.gloss2idx.entry(gloss.to_string()).or_insert(idx);
    }

    /// Number of entries including the blank.
    pub fn len(&self) -> usize {
        self.idx2gloss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2gloss.is_empty()
    }

    /// Gloss string for an id, if it exists.
    pub fn gloss(&self, idx: usize) -> Option<&str> {
        self.idx2gloss.get(idx).map(String::as_str)
    }

    /// Id for a gloss string, if it exists.
    pub fn index(&self, gloss: &str) -> Option<usize> {
        self.gloss2idx.get(gloss).copied()
    }

    /// Encode a whitespace-separated annotation.
    /// Unknown glosses become the blank id.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.encode_tokens(text.split_whitespace())
    }

    /// Encode pre-split tokens. Output length equals input token count.
    pub fn encode_tokens<I, S>(&self, tokens: I) -> Vec<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .map(|t| self.index(t.as_ref()).unwrap_or(BLANK_ID))
            .collect()
    }

    /// Like [`Vocabulary::encode`] but reports which tokens fell back to blank.
    pub fn encode_checked(&self, text: &str) -> Vec<EncodedGloss> {
        text.split_whitespace()
            .map(|t| match self.index(t) {
                Some(id) => EncodedGloss::Known(id),
                None => EncodedGloss::Fallback(t.to_string()),
            })
            .collect()
    }

    pub fn encode_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<usize>> {
        texts.iter().map(|t| self.encode(t.as_ref())).collect()
    }

    /// Map ids back to glosses.
    ///
    /// # Panics
    /// Panics if an id is outside the vocabulary.
    pub fn decode(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| self.idx2gloss[i].clone()).collect()
    }

    pub fn decode_batch(&self, sequences: &[Vec<usize>]) -> Vec<Vec<String>> {
        sequences.iter().map(|s| self.decode(s)).collect()
    }
}
