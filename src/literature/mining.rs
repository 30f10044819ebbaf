//! Variant mention extraction and functional-evidence scoring
//!
//! Mining is pattern based. Four notations are recognised:
//!
//! | Notation | Example |
//! |----------|---------|
//! | protein HGVS | `p.Arg273His`, `p.(R273H)` |
//! | coding HGVS | `c.818G>A`, `c.215delC` |
//! | genomic HGVS | `g.7577120C>T` |
//! | dbSNP | `rs28934576` |
//!
//! Protein changes are compared in one-letter form, so `p.Arg273His`
//! and `R273H` refer to the same variant.

use std::cmp::Ordering;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{LiteratureEntry, MentionContext, NotationKind, RawPublication, SearchParams};
use crate::reference::AminoAcid;

/// Longest snippet kept for a mention
pub const MAX_SNIPPET_CHARS: usize = 300;
/// Sentences kept in a functional summary
pub const SUMMARY_SENTENCES: usize = 3;

const QUERIED_VARIANT_MENTION: f64 = 3.0;
const OTHER_MENTION: f64 = 1.0;
const GENE_IN_TITLE: f64 = 2.0;
const VARIANT_IN_TITLE: f64 = 2.0;
const FUNCTIONAL_EVIDENCE: f64 = 1.5;

const EFFECT_HIT: f64 = 5.0;
const GENE_HINT_HIT: f64 = 2.0;
const VARIANT_HINT_HIT: f64 = 3.0;
const NEGATION_PENALTY: f64 = 2.0;
const SHORT_SENTENCE_BONUS: f64 = 0.5;
const SHORT_SENTENCE_CHARS: usize = 350;

const AA: &str = r"(?:[A-Z][a-z]{2}|[A-Z*])";
const NT_EDIT: &str = r"(?:[ACGT]+>[ACGT]+|delins[ACGT]+|del[ACGT]*|dup[ACGT]*|ins[ACGT]+)";

static PROTEIN_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"\bp\.\(?{AA}\d+(?:_{AA}\d+)?(?:delins{AA}+|del|dup|ins{AA}+|fs(?:Ter|\*)?\d*|[A-Z][a-z]{{2}}|[A-Z*=])?\)?"
    );
    Regex::new(&pattern).expect("valid protein pattern")
});

static CODING_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"\bc\.[-*]?\d+(?:[+-]\d+)?(?:_[-*]?\d+(?:[+-]\d+)?)?{NT_EDIT}");
    Regex::new(&pattern).expect("valid coding pattern")
});

static GENOMIC_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"\bg\.\d+(?:_\d+)?{NT_EDIT}");
    Regex::new(&pattern).expect("valid genomic pattern")
});

static RSID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brs\d+\b").expect("valid rsid pattern"));

static PROTEIN_SHORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:p\.)?\(?([A-Z][a-z]{2}|[A-Z*])(\d+)([A-Z][a-z]{2}|[A-Z*=])\)?$")
        .expect("valid short protein pattern")
});

const EFFECT_VERBS: &str = "(?:increase|decrease|reduce|impair|disrupt|abolish|enhance|alter|affect|modulat|activate|inhibit|stabiliz|destabiliz|misfold|aggregate|bind|binding|splice|truncat|frameshift|clearance)";
const EFFECT_TARGETS: &str = "(?:activity|function|functional|binding|affinity|expression|splicing|stability|structure|folding|aggregation|localization|trafficking|receptor|clearance|lipid|cholesterol|signaling|uptake)";

/// Effect verb (any inflection) followed by a functional target within six words
static EFFECT_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?i){EFFECT_VERBS}\w*(?:\W+\w+){{0,6}}\W+{EFFECT_TARGETS}");
    Regex::new(&pattern).expect("valid effect pattern")
});

static NEGATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:no effect|does not|did not|not associated|unchanged)")
        .expect("valid negation pattern")
});

/// Split prose into sentences
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace and then an
/// upper-case letter or an opening parenthesis. `p.Arg273His` is not split.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if matches!(c, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && (chars[j].1.is_ascii_uppercase() || chars[j].1 == '(') {
                let sentence = text[start..pos + c.len_utf8()].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = chars[j].0;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Every variant mention in `text`, in sentence order
pub fn find_mentions(text: &str) -> Vec<MentionContext> {
    let patterns: [(&Regex, NotationKind); 4] = [
        (&PROTEIN_RE, NotationKind::ProteinHgvs),
        (&CODING_RE, NotationKind::CodingHgvs),
        (&GENOMIC_RE, NotationKind::GenomicHgvs),
        (&RSID_RE, NotationKind::Rsid),
    ];

    let mut mentions = Vec::new();
    for sentence in split_sentences(text) {
        for (re, notation) in &patterns {
            for m in re.find_iter(sentence) {
                mentions.push(MentionContext {
                    snippet: truncate_chars(sentence, MAX_SNIPPET_CHARS),
                    matched: m.as_str().to_string(),
                    notation: *notation,
                });
            }
        }
    }
    mentions
}

/// Comparable form of a variant identifier
///
/// Simple protein substitutions become one-letter `R273H`; anything else is
/// trimmed and lower-cased.
pub fn canonical_variant(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if let Some(caps) = PROTEIN_SHORT_RE.captures(trimmed) {
        let reference = one_letter(&caps[1]);
        let alternate = one_letter(&caps[3]);
        if let (Some(r), Some(a)) = (reference, alternate) {
            return format!("{}{}{}", r, &caps[2], a);
        }
    }
    trimmed.to_ascii_lowercase()
}

fn one_letter(code: &str) -> Option<char> {
    match code {
        "=" => Some('='),
        c if c.len() == 1 => c
            .chars()
            .next()
            .and_then(AminoAcid::from_one_letter)
            .map(AminoAcid::to_one_letter),
        c => AminoAcid::from_three_letter(c).map(AminoAcid::to_one_letter),
    }
}

/// Score one sentence for functional-effect evidence
pub fn functional_score(sentence: &str, gene_hint: Option<&str>, variant_hint: Option<&str>) -> f64 {
    let lower = sentence.to_lowercase();
    let mut score = 0.0;
    if EFFECT_RE.is_match(sentence) {
        score += EFFECT_HIT;
    }
    if let Some(gene) = gene_hint.filter(|g| !g.is_empty()) {
        if lower.contains(&gene.to_lowercase()) {
            score += GENE_HINT_HIT;
        }
    }
    if let Some(variant) = variant_hint.filter(|v| !v.is_empty()) {
        if mentions_variant(sentence, variant) {
            score += VARIANT_HINT_HIT;
        }
    }
    if NEGATION_RE.is_match(sentence) {
        score -= NEGATION_PENALTY;
    }
    if sentence.chars().count() < SHORT_SENTENCE_CHARS {
        score += SHORT_SENTENCE_BONUS;
    }
    score
}

/// Best functional-effect sentences of `text`, in reading order
///
/// Returns `None` when no sentence pairs an effect verb with a functional
/// target.
pub fn summarize_functional_effect(
    text: &str,
    max_sentences: usize,
    gene_hint: Option<&str>,
    variant_hint: Option<&str>,
) -> Option<String> {
    let sentences = split_sentences(text);
    if !sentences.iter().any(|s| EFFECT_RE.is_match(s)) {
        return None;
    }

    let mut scored: Vec<(f64, usize, &str)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (functional_score(s, gene_hint, variant_hint), i, *s))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut top: Vec<(f64, usize, &str)> = scored
        .into_iter()
        .filter(|(score, _, _)| *score > 0.0)
        .take(max_sentences)
        .collect();
    top.sort_by_key(|(_, i, _)| *i);

    let summary = top
        .iter()
        .map(|(_, _, s)| {
            if s.ends_with(['.', '!', '?']) {
                s.to_string()
            } else {
                format!("{s}.")
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Some(summary)
}

/// Turn a raw publication into a scored entry
pub fn mine_publication(
    raw: RawPublication,
    gene: &str,
    variant: Option<&str>,
    params: &SearchParams,
) -> LiteratureEntry {
    let mut body = String::new();
    for part in [raw.abstract_text.as_deref(), raw.full_text.as_deref().filter(|_| params.include_full_text)]
        .into_iter()
        .flatten()
    {
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(part.trim());
    }

    let mut seen = HashSet::new();
    let mentions: Vec<MentionContext> = find_mentions(&raw.title)
        .into_iter()
        .chain(find_mentions(&body))
        .filter(|m| seen.insert((m.matched.clone(), m.notation, m.snippet.clone())))
        .collect();

    let functional_summary = summarize_functional_effect(&body, SUMMARY_SENTENCES, Some(gene), variant);
    let relevance = relevance(&raw.title, &mentions, gene, variant, functional_summary.is_some());

    LiteratureEntry {
        pmid: raw.pmid,
        pmcid: raw.pmcid,
        title: raw.title,
        authors: raw.authors,
        year: raw.year,
        journal: raw.journal,
        mentions,
        relevance,
        functional_summary,
    }
}

/// Mine, de-duplicate and order a batch of publications
pub fn mine(
    publications: Vec<RawPublication>,
    gene: &str,
    variant: Option<&str>,
    params: &SearchParams,
) -> Vec<LiteratureEntry> {
    let mut seen = HashSet::new();
    let mut entries: Vec<LiteratureEntry> = publications
        .into_iter()
        .filter(|p| seen.insert(publication_identity(p)))
        .map(|p| mine_publication(p, gene, variant, params))
        .collect();
    sort_entries(&mut entries);
    entries
}

/// Relevance desc, year desc, PMID asc; fully deterministic
pub fn sort_entries(entries: &mut [LiteratureEntry]) {
    entries.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| b.year.cmp(&a.year))
            .then_with(|| compare_pmid(a.pmid.as_deref(), b.pmid.as_deref()))
            .then_with(|| a.title.cmp(&b.title))
    });
}

fn compare_pmid(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Combine entries mined under several keys
///
/// A publication found more than once keeps its most relevant entry.
pub fn merge_entries<I>(lists: I) -> Vec<LiteratureEntry>
where
    I: IntoIterator<Item = Vec<LiteratureEntry>>,
{
    let mut entries: Vec<LiteratureEntry> = lists.into_iter().flatten().collect();
    sort_entries(&mut entries);
    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert(identity(e.pmid.as_deref(), e.pmcid.as_deref(), &e.title)));
    entries
}

fn publication_identity(p: &RawPublication) -> String {
    identity(p.pmid.as_deref(), p.pmcid.as_deref(), &p.title)
}

fn identity(pmid: Option<&str>, pmcid: Option<&str>, title: &str) -> String {
    match (pmid, pmcid) {
        (Some(pmid), _) => format!("pmid:{pmid}"),
        (None, Some(pmcid)) => format!("pmc:{}", pmcid.to_ascii_uppercase()),
        (None, None) => format!("title:{}", title.trim().to_lowercase()),
    }
}

fn relevance(
    title: &str,
    mentions: &[MentionContext],
    gene: &str,
    variant: Option<&str>,
    has_functional_evidence: bool,
) -> f64 {
    let wanted = variant.map(canonical_variant);
    let mut score = 0.0;

    for m in mentions {
        if wanted.as_deref() == Some(canonical_variant(&m.matched).as_str()) {
            score += QUERIED_VARIANT_MENTION;
        } else {
            score += OTHER_MENTION;
        }
    }
    if contains_word(title, gene) {
        score += GENE_IN_TITLE;
    }
    if let Some(v) = variant {
        if mentions_variant(title, v) {
            score += VARIANT_IN_TITLE;
        }
    }
    if has_functional_evidence {
        score += FUNCTIONAL_EVIDENCE;
    }
    (score * 1000.0).round() / 1000.0
}

/// Whether `text` names `variant`, literally or as an equivalent protein change
fn mentions_variant(text: &str, variant: &str) -> bool {
    if text.to_lowercase().contains(&variant.trim().to_lowercase()) {
        return true;
    }
    let wanted = canonical_variant(variant);
    PROTEIN_RE
        .find_iter(text)
        .any(|m| canonical_variant(m.as_str()) == wanted)
}

fn contains_word(text: &str, word: &str) -> bool {
    let word = word.trim();
    !word.is_empty()
        && text
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w.eq_ignore_ascii_case(word))
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
