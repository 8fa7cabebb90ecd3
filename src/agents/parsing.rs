//! Parsing of raw model output into quiz questions.
//!
//! Everything here is pure and line-oriented so a stricter parser can replace
//! it without touching the pipeline.

use crate::models::{Mcq, McqOptions, OptionLetter, MISSING_OPTION};
use std::collections::HashMap;

const QUESTION_PREFIX: &str = "question:";
const CORRECT_ANSWER_PREFIX: &str = "correct answer:";
const INTERROGATIVES: [&str; 6] = ["what", "who", "when", "where", "why", "how"];

/// Case-insensitive ASCII prefix strip.
fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

/// `A.` / `b)` style option line. Returns the letter and the option text.
fn parse_option_line(line: &str) -> Option<(OptionLetter, &str)> {
    let mut chars = line.chars();
    let letter = OptionLetter::from_char(chars.next()?)?;
    match chars.next()? {
        '.' | ')' => Some((letter, line[2..].trim())),
        _ => None,
    }
}

/// The first A-D letter after `Correct Answer:`, tolerating `[B]`, `(B)` or `B. text`.
fn parse_correct_letter(rest: &str) -> Option<OptionLetter> {
    let rest = rest.trim_start().trim_start_matches(['[', '(', '*']);
    let mut chars = rest.chars();
    let letter = OptionLetter::from_char(chars.next()?)?;
    match chars.next() {
        None => Some(letter),
        Some(c) if !c.is_alphanumeric() => Some(letter),
        _ => None,
    }
}

/// Parse the first complete `Question:` / `A.`-`D.` / `Correct Answer:` block.
///
/// The reply is split at every `Question:` line and each block is parsed on
/// its own, so fields from different blocks are never combined. A block is
/// complete when it has a question, at least one option and a correct
/// letter. Missing options are filled with [`MISSING_OPTION`]; within a
/// block the first occurrence of each field wins.
pub fn parse_mcq_output(raw: &str) -> Option<Mcq> {
    question_blocks(raw).into_iter().find_map(parse_mcq_block)
}

/// Group trimmed, non-empty lines into blocks that each start at a `Question:` line.
/// Lines before the first `Question:` are dropped.
fn question_blocks(raw: &str) -> Vec<Vec<&str>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if strip_prefix_ci(line, QUESTION_PREFIX).is_some() {
            blocks.push(vec![line]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }
    blocks
}

fn parse_mcq_block(lines: Vec<&str>) -> Option<Mcq> {
    let mut question: Option<String> = None;
    let mut options: HashMap<OptionLetter, String> = HashMap::new();
    let mut correct: Option<OptionLetter> = None;

    for line in lines {
        if let Some(rest) = strip_prefix_ci(line, QUESTION_PREFIX) {
            let text = rest.trim();
            if question.is_none() && !text.is_empty() {
                question = Some(text.to_string());
            }
        } else if let Some(rest) = strip_prefix_ci(line, CORRECT_ANSWER_PREFIX) {
            if correct.is_none() {
                correct = parse_correct_letter(rest);
            }
        } else if let Some((letter, text)) = parse_option_line(line) {
            if !text.is_empty() {
                options.entry(letter).or_insert_with(|| text.to_string());
            }
        }
    }

    let question = question?;
    let correct_option = correct?;
    if options.is_empty() {
        return None;
    }

    let mut take = |letter: OptionLetter| {
        options
            .remove(&letter)
            .unwrap_or_else(|| MISSING_OPTION.to_string())
    };

    Some(Mcq {
        question,
        options: McqOptions {
            a: take(OptionLetter::A),
            b: take(OptionLetter::B),
            c: take(OptionLetter::C),
            d: take(OptionLetter::D),
        },
        correct_option,
    })
}

fn strip_question_prefix(text: &str) -> &str {
    strip_prefix_ci(text, QUESTION_PREFIX)
        .map(str::trim)
        .unwrap_or(text)
}

fn is_option_line(line: &str) -> bool {
    ["A.", "B.", "C.", "D."].iter().any(|p| line.starts_with(p))
}

fn contains_interrogative(text: &str) -> bool {
    let lower = text.to_lowercase();
    INTERROGATIVES.iter().any(|w| lower.contains(w))
}

/// Pull free-text questions out of raw model output.
///
/// Lines with a `?` that are not option lines contribute everything up to
/// and including the first `?`. If none exist, lines containing an
/// interrogative word are taken whole. `Question:` prefixes are stripped and
/// exact duplicates dropped, keeping first-seen order.
pub fn extract_questions(raw: &str) -> Vec<String> {
    let mut questions: Vec<String> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if !trimmed.contains('?') || is_option_line(trimmed) {
            continue;
        }
        if let Some(end) = trimmed.find('?') {
            let candidate = strip_question_prefix(trimmed[..=end].trim());
            if !candidate.is_empty() {
                questions.push(candidate.to_string());
            }
        }
    }

    if questions.is_empty() {
        for line in raw.lines() {
            if contains_interrogative(line) {
                let candidate = strip_question_prefix(line.trim());
                if !candidate.is_empty() {
                    questions.push(candidate.to_string());
                }
            }
        }
    }

    dedup_preserving_order(questions)
}

pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|q| seen.insert(q.clone())).collect()
}

/// Loose check used before answering: ends with `?` or mentions an interrogative.
pub fn looks_like_question(text: &str) -> bool {
    text.ends_with('?') || contains_interrogative(text)
}
