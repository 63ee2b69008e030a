use crate::config::ConfigError;

/// Default prompt used to answer a question from retrieved context.
pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "Answer the question based only on the following context:\n{context}\n\nQuestion: {question}";

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

/// A validated retrieval prompt with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Result<Self, ConfigError> {
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(ConfigError::Invalid(format!(
                    "prompt template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Fills both placeholders.
    ///
    /// The question is substituted after the context, so a context that happens
    /// to contain `{question}` is left as is.
    pub fn render(&self, context: &str, question: &str) -> String {
        match self.template.split_once(CONTEXT_PLACEHOLDER) {
            Some((before, after)) => format!(
                "{}{}{}",
                before.replace(QUESTION_PLACEHOLDER, question),
                context,
                after.replace(QUESTION_PLACEHOLDER, question)
            ),
            None => self.template.replace(QUESTION_PLACEHOLDER, question),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}
