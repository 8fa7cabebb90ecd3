use crate::types::{AppError, AppResult};

const QUESTION_TEMPLATE: &str = r#"You are creating quiz questions based on the text.

CONTENT:
{text}

INSTRUCTIONS:
- Create 1-2, short multiple-choice questions only
- KEEP UNDER 200 TOKENS total response
- Brief and focused questions
- 4 answer options (A-D)
- Only ONE option correct
- Mark correct answer

FORMAT:
Question: [Question text]
A. [Option A]
B. [Option B]
C. [Option C]
D. [Option D]

Correct Answer: [Letter]
"#;

const ANSWER_TEMPLATE: &str = r#"Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:"#;

/// A prompt with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    placeholders: Vec<String>,
}

impl PromptTemplate {
    /// Build a template, checking every required placeholder appears in it.
    pub fn new(template: impl Into<String>, placeholders: &[&str]) -> AppResult<Self> {
        let template = template.into();
        for name in placeholders {
            if !template.contains(&format!("{{{}}}", name)) {
                return Err(AppError::InvalidRequest(format!(
                    "prompt template is missing placeholder {{{}}}",
                    name
                )));
            }
        }
        Ok(Self {
            template,
            placeholders: placeholders.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Quiz generation prompt with a single `{text}` placeholder.
    pub fn question() -> Self {
        Self {
            template: QUESTION_TEMPLATE.to_string(),
            placeholders: vec!["text".to_string()],
        }
    }

    /// Retrieval answering prompt with `{context}` and `{question}`.
    pub fn answer() -> Self {
        Self {
            template: ANSWER_TEMPLATE.to_string(),
            placeholders: vec!["context".to_string(), "question".to_string()],
        }
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Substitute values in a single pass, so placeholder-looking text inside
    /// a value is never expanded again.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let replaced = after.find('}').and_then(|close| {
                let name = &after[..close];
                values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (close, *value))
            });
            match replaced {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
