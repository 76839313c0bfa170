use std::collections::{HashMap, HashSet};

use itertools::Itertools;

/// Lowercased alphanumeric words of `text`
#[inline]
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// TF-IDF index treating every candidate chunk as one document
#[derive(Debug, Clone, Default)]
pub struct TfIdfIndex {
    /// Per document: term -> term frequency
    term_frequencies: Vec<HashMap<String, f64>>,
    document_frequencies: HashMap<String, usize>,
}

impl TfIdfIndex {
    #[inline]
    pub fn new<S: AsRef<str>>(documents: &[S]) -> Self {
        let mut term_frequencies = Vec::with_capacity(documents.len());
        let mut document_frequencies: HashMap<String, usize> = HashMap::new();

        for document in documents {
            let words = terms(document.as_ref());
            let total = words.len().max(1) as f64;
            let counts = words.into_iter().counts();

            let mut frequencies = HashMap::with_capacity(counts.len());
            for (term, count) in counts {
                *document_frequencies.entry(term.clone()).or_default() += 1;
                frequencies.insert(term, count as f64 / total);
            }
            term_frequencies.push(frequencies);
        }

        Self {
            term_frequencies,
            document_frequencies,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.term_frequencies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.term_frequencies.is_empty()
    }

    /// Smoothed inverse document frequency: `ln((1 + N) / (1 + df)) + 1`
    #[inline]
    pub fn idf(&self, term: &str) -> f64 {
        let df = self.document_frequencies.get(term).copied().unwrap_or(0) as f64;
        ((1.0 + self.len() as f64) / (1.0 + df)).ln() + 1.0
    }

    /// Score every document against the distinct terms of `query`
    #[inline]
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_terms: Vec<String> = terms(query).into_iter().unique().collect();
        let weights: Vec<(String, f64)> = query_terms
            .into_iter()
            .map(|term| {
                let idf = self.idf(&term);
                (term, idf)
            })
            .collect();

        self.term_frequencies
            .iter()
            .map(|frequencies| {
                weights
                    .iter()
                    .filter_map(|(term, idf)| frequencies.get(term).map(|tf| tf * idf))
                    .sum()
            })
            .collect()
    }
}

/// Distinct lowercased words longer than three characters
#[inline]
pub fn content_terms(text: &str) -> HashSet<String> {
    terms(text)
        .into_iter()
        .filter(|term| term.chars().count() > 3)
        .collect()
}
