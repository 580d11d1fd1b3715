//! Inverted index over catalog entries with prefix and fuzzy term matching.

use std::collections::{BTreeMap, HashMap};

/// Field names indexed for every keyword.
pub const DOTTED_NAME_FIELD: &str = "dottedname";
pub const NAME_FIELD: &str = "name";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    pub term: String,
    pub wildcard: bool,
    pub edit_distance: u8,
}

/// A disjunction of term clauses built from user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    /// Builds a trailing-wildcard query from a needle; `None` when the needle
    /// holds no searchable term.
    pub fn parse(needle: &str) -> Option<Self> {
        let clauses: Vec<Clause> = needle
            .split(is_separator)
            .map(trim_term)
            .filter(|term| !term.is_empty())
            .map(|term| Clause {
                term,
                wildcard: true,
                edit_distance: 0,
            })
            .collect();
        if clauses.is_empty() {
            None
        } else {
            Some(Self { clauses })
        }
    }

    /// Same terms matched as whole tokens only.
    pub fn exact(&self) -> Self {
        Self {
            clauses: self
                .clauses
                .iter()
                .map(|clause| Clause {
                    wildcard: false,
                    ..clause.clone()
                })
                .collect(),
        }
    }

    /// Same terms matched within the given edit distance.
    pub fn fuzzy(&self, distance: u8) -> Self {
        Self {
            clauses: self
                .clauses
                .iter()
                .map(|clause| Clause {
                    wildcard: false,
                    edit_distance: distance,
                    term: clause.term.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub reference: String,
    pub score: f64,
}

#[derive(Clone, Debug)]
struct Posting {
    slot: usize,
    field: usize,
    frequency: u32,
}

#[derive(Clone, Debug)]
struct DocRecord {
    reference: String,
    terms: Vec<String>,
}

/// Rebuildable inverted index keyed by reference.
///
/// Every reference owns one slot; re-indexing a reference keeps its slot so
/// result order stays stable, and drops all postings written for it before.
#[derive(Clone, Debug)]
pub struct SearchIndex {
    fields: Vec<(String, f64)>,
    docs: Vec<Option<DocRecord>>,
    slots: HashMap<String, usize>,
    postings: BTreeMap<String, Vec<Posting>>,
}

impl SearchIndex {
    pub fn new(fields: &[(&str, f64)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, boost)| (name.to_string(), *boost))
                .collect(),
            docs: Vec::new(),
            slots: HashMap::new(),
            postings: BTreeMap::new(),
        }
    }

    /// Index with the catalog's `dottedname` and `name` fields.
    pub fn for_keywords() -> Self {
        Self::new(&[(DOTTED_NAME_FIELD, 1.0), (NAME_FIELD, 1.5)])
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.slots.contains_key(reference)
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        self.slots.clear();
        self.postings.clear();
    }

    /// Adds or refreshes a document. Unknown field names are ignored.
    pub fn upsert(&mut self, reference: &str, values: &[(&str, &str)]) {
        let slot = match self.slots.get(reference) {
            Some(&slot) => {
                self.drop_postings(slot);
                slot
            }
            None => {
                self.docs.push(None);
                let slot = self.docs.len() - 1;
                self.slots.insert(reference.to_string(), slot);
                slot
            }
        };

        let mut terms = Vec::new();
        for (field_name, text) in values {
            let Some(field) = self.fields.iter().position(|(name, _)| name == field_name) else {
                continue;
            };
            let mut counts: BTreeMap<String, u32> = BTreeMap::new();
            for term in tokenize(text) {
                *counts.entry(term).or_default() += 1;
            }
            for (term, frequency) in counts {
                self.postings.entry(term.clone()).or_default().push(Posting {
                    slot,
                    field,
                    frequency,
                });
                terms.push(term);
            }
        }
        terms.sort();
        terms.dedup();
        self.docs[slot] = Some(DocRecord {
            reference: reference.to_string(),
            terms,
        });
    }

    pub fn remove(&mut self, reference: &str) {
        if let Some(slot) = self.slots.remove(reference) {
            self.drop_postings(slot);
            self.docs[slot] = None;
        }
    }

    fn drop_postings(&mut self, slot: usize) {
        let Some(record) = self.docs[slot].take() else {
            return;
        };
        for term in record.terms {
            if let Some(list) = self.postings.get_mut(&term) {
                list.retain(|posting| posting.slot != slot);
                if list.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
    }

    /// Scores documents matching any clause; best first, ties in slot order.
    pub fn search(&self, query: &Query) -> Vec<SearchHit> {
        let total = self.len().max(1) as f64;
        let mut scores: BTreeMap<usize, f64> = BTreeMap::new();

        for clause in &query.clauses {
            for (postings, weight) in self.matching_terms(clause) {
                let idf = (1.0 + total / postings.len() as f64).ln();
                for posting in postings {
                    let boost = self.fields[posting.field].1;
                    *scores.entry(posting.slot).or_default() +=
                        f64::from(posting.frequency) * idf * boost * weight;
                }
            }
        }

        let mut hits: Vec<(usize, f64)> = scores.into_iter().collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.into_iter()
            .filter_map(|(slot, score)| {
                self.docs[slot].as_ref().map(|doc| SearchHit {
                    reference: doc.reference.clone(),
                    score,
                })
            })
            .collect()
    }

    fn matching_terms<'a>(
        &'a self,
        clause: &'a Clause,
    ) -> Box<dyn Iterator<Item = (&'a Vec<Posting>, f64)> + 'a> {
        if clause.edit_distance > 0 {
            let max = usize::from(clause.edit_distance);
            return Box::new(self.postings.iter().filter_map(move |(term, postings)| {
                let distance = levenshtein(term, &clause.term);
                (distance <= max).then(|| (postings, 1.0 / (1.0 + distance as f64)))
            }));
        }
        if clause.wildcard {
            return Box::new(
                self.postings
                    .range(clause.term.clone()..)
                    .take_while(move |(term, _)| term.starts_with(&clause.term))
                    .map(move |(term, postings)| {
                        let weight = if *term == clause.term { 1.0 } else { 0.5 };
                        (postings, weight)
                    }),
            );
        }
        Box::new(
            self.postings
                .get_key_value(&clause.term)
                .into_iter()
                .map(|(_, postings)| (postings, 1.0)),
        )
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '-' || c == '_'
}

fn trim_term(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Lower-cased terms of a field value; dotted terms are also indexed by
/// their parts so `Collections.Get` is found by `get` and `collections`.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for raw in text.split(is_separator) {
        let term = trim_term(raw);
        if term.is_empty() {
            continue;
        }
        if term.contains('.') {
            for part in term.split('.').map(trim_term).filter(|p| !p.is_empty()) {
                terms.push(part);
            }
        }
        terms.push(term);
    }
    terms
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
