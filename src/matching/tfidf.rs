// src/matching/tfidf.rs - Character n-gram TF-IDF with chunked cosine scoring
use ndarray::{s, Array2, ArrayView1};
use std::collections::{BTreeSet, HashMap};

pub const NGRAM_RANGE: (usize, usize) = (2, 3);

/// Sparse row: (term index, weight), sorted by term index.
pub type SparseVector = Vec<(usize, f64)>;

/// Lowercases and collapses whitespace, then emits every character n-gram
/// for n in `min_n..=max_n`. No word-boundary padding.
pub fn char_ngrams(doc: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let cleaned = doc.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = cleaned.chars().collect();
    let mut grams = Vec::new();
    for n in min_n..=max_n {
        if chars.len() < n {
            continue;
        }
        for window in chars.windows(n) {
            grams.push(window.iter().collect());
        }
    }
    grams
}

#[derive(Debug, Clone)]
pub struct CharNgramTfidf {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl CharNgramTfidf {
    /// Learns the vocabulary and smoothed IDF weights from `docs`.
    pub fn fit(docs: &[String]) -> Self {
        let per_doc: Vec<BTreeSet<String>> = docs
            .iter()
            .map(|d| char_ngrams(d, NGRAM_RANGE.0, NGRAM_RANGE.1).into_iter().collect())
            .collect();

        let terms: BTreeSet<&String> = per_doc.iter().flatten().collect();
        let vocabulary: HashMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for grams in &per_doc {
            for g in grams {
                if let Some(&i) = vocabulary.get(g) {
                    df[i] += 1;
                }
            }
        }
        let n = docs.len() as f64;
        let idf = df
            .into_iter()
            .map(|d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// L2-normalized TF-IDF row for `doc`. Unknown n-grams are ignored; a
    /// document with none known yields an empty vector.
    pub fn transform(&self, doc: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for gram in char_ngrams(doc, NGRAM_RANGE.0, NGRAM_RANGE.1) {
            if let Some(&i) = self.vocabulary.get(&gram) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }
        let mut row: SparseVector = counts
            .into_iter()
            .map(|(i, tf)| (i, tf * self.idf[i]))
            .collect();
        row.sort_by_key(|(i, _)| *i);

        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in row.iter_mut() {
                *w /= norm;
            }
        }
        row
    }
}

/// Fitted corpus with an inverted index for sparse dot products.
#[derive(Debug, Clone)]
pub struct TfidfIndex {
    vectorizer: CharNgramTfidf,
    /// term -> (document, weight), documents ascending.
    postings: Vec<Vec<(usize, f64)>>,
    documents: usize,
}

impl TfidfIndex {
    pub fn build(corpus: &[String]) -> Self {
        let vectorizer = CharNgramTfidf::fit(corpus);
        let mut postings = vec![Vec::new(); vectorizer.vocabulary_len()];
        for (doc, text) in corpus.iter().enumerate() {
            for (term, weight) in vectorizer.transform(text) {
                postings[term].push((doc, weight));
            }
        }
        Self {
            vectorizer,
            postings,
            documents: corpus.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    pub fn vectorize(&self, doc: &str) -> SparseVector {
        self.vectorizer.transform(doc)
    }

    /// Cosine similarity of each query against every document, one row per
    /// query. Each cell accumulates in term order, so a query's row does not
    /// depend on which other queries share its block.
    pub fn score_block(&self, queries: &[SparseVector]) -> Array2<f64> {
        let mut scores = Array2::<f64>::zeros((queries.len(), self.documents));
        for (row, query) in queries.iter().enumerate() {
            let mut out = scores.slice_mut(s![row, ..]);
            for &(term, q_weight) in query {
                for &(doc, d_weight) in &self.postings[term] {
                    out[doc] += q_weight * d_weight;
                }
            }
        }
        scores
    }
}

/// Highest-scoring column; ties go to the lowest index.
pub fn best_candidate(row: ArrayView1<f64>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in row.iter().enumerate() {
        match best {
            Some((_, b)) if score <= b => {}
            _ => best = Some((i, score)),
        }
    }
    best
}

/// The `n` highest-scoring columns, best first, ties by index.
pub fn top_candidates(row: ArrayView1<f64>, n: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = row.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}
