//! Prompt templates with named `{field}` placeholders.
//!
//! Templates are parsed once. Rendering substitutes values in a single
//! pass, so braces inside a retrieved passage are never treated as
//! placeholders. `{{` and `}}` produce literal braces.

use crate::error::{RagError, Result};

/// The sentence the model must answer with when the context is not enough.
pub const REFUSAL_SENTENCE: &str = "Sağlanan bağlamda bu soruya ilişkin bilgi bulunamadı.";

const LEGAL_QA_TEMPLATE: &str = "Sen Türk Hukuku alanında uzman bir yapay zeka asistanısın. \
Soruyu yalnızca aşağıdaki bağlamda verilen bilgilere dayanarak Türkçe yanıtla. \
Bağlamda olmayan bilgileri ekleme ve tahmin yürütme. \
Bağlam soruyu yanıtlamak için yeterli değilse yalnızca şu cümleyi yaz: \"{refusal}\"
Bağlam:
{context}
Soru:
{question}
Yanıt:
";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed template.
///
/// # Example
///
/// ```rust,ignore
/// use hukuk_rag::PromptTemplate;
///
/// let template = PromptTemplate::legal_qa();
/// let prompt = template.render(&[("context", "Metin: ..."), ("question", "Anayasa nedir?")])?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `template`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PromptError`] for an unclosed `{`, a stray `}`,
    /// or an empty field name.
    pub fn new(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(RagError::PromptError(format!(
                                    "unclosed placeholder '{{{name}'"
                                )));
                            }
                        }
                    }
                    let name = name.trim().to_string();
                    if name.is_empty() {
                        return Err(RagError::PromptError("empty placeholder '{}'".into()));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name));
                }
                '}' => return Err(RagError::PromptError("unmatched '}' in template".into())),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// The grounding template for Turkish legal questions.
    ///
    /// Fields: `context`, `question`. The refusal sentence is already filled in.
    pub fn legal_qa() -> Self {
        let segments = Self::new(LEGAL_QA_TEMPLATE)
            .map(|t| t.segments)
            .unwrap_or_default()
            .into_iter()
            .map(|segment| match segment {
                Segment::Field(name) if name == "refusal" => {
                    Segment::Literal(REFUSAL_SENTENCE.to_string())
                }
                other => other,
            })
            .collect();
        Self { segments }
    }

    /// Field names in order of first appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Field(name) = segment {
                if !fields.contains(&name.as_str()) {
                    fields.push(name);
                }
            }
        }
        fields
    }

    /// Substitute every field with its value from `values`.
    ///
    /// Values for names the template does not use are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PromptError`] if a field has no value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            RagError::PromptError(format!("no value for field '{name}'"))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::legal_qa()
    }
}
