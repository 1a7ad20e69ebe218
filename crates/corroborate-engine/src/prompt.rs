//! LLM prompt engineering for decomposition, extraction and equivalence

use corroborate_domain::{RetrievedItem, VerifiedClaim};

/// Prior claims included as refinement context
const MAX_CONTEXT_CLAIMS: usize = 5;

/// Characters of item text sent for extraction
const MAX_ITEM_CHARS: usize = 4_000;

/// Builds prompts asking the LLM to split a question into sub-questions
pub struct DecompositionPrompt {
    question: String,
    max_sub_questions: usize,
    refining: Option<String>,
    known_claims: Vec<(String, f64)>,
}

impl DecompositionPrompt {
    /// Create a prompt for a top-level question
    pub fn new(question: impl Into<String>, max_sub_questions: usize) -> Self {
        Self {
            question: question.into(),
            max_sub_questions: max_sub_questions.max(2),
            refining: None,
            known_claims: Vec::new(),
        }
    }

    /// Ask for a refinement of one weakly supported sub-question
    pub fn refining(mut self, sub_question: impl Into<String>) -> Self {
        self.refining = Some(sub_question.into());
        self
    }

    /// Add what is already known, best claims first
    pub fn with_known_claims(mut self, claims: &[&VerifiedClaim]) -> Self {
        self.known_claims = claims
            .iter()
            .take(MAX_CONTEXT_CLAIMS)
            .map(|c| (c.claim.statement.clone(), c.confidence))
            .collect();
        self
    }

    /// Build the complete decomposition prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(DECOMPOSITION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        prompt.push_str("MAIN QUESTION:\n");
        prompt.push_str(&self.question);
        prompt.push_str("\n\n");

        if let Some(sub_question) = &self.refining {
            prompt.push_str("SUB-QUESTION TO REFINE (evidence so far is weak):\n");
            prompt.push_str(sub_question);
            prompt.push_str("\n\n");
            prompt.push_str(
                "Break the sub-question above into narrower questions that sources are more \
                 likely to answer directly. Treat it as COMPLEX.\n\n",
            );
        }

        if !self.known_claims.is_empty() {
            prompt.push_str("Already established (do not ask again):\n");
            for (statement, confidence) in &self.known_claims {
                prompt.push_str(&format!("- {} ({:.2})\n", statement, confidence));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "If the question is COMPLEX, break it into 2-{} focused sub-questions.\n\n",
            self.max_sub_questions
        ));
        prompt.push_str(DECOMPOSITION_FORMAT);
        prompt
    }
}

/// Builds the claim extraction prompt for one retrieved item
pub struct ExtractionPrompt<'a> {
    question: &'a str,
    item: &'a RetrievedItem,
}

impl<'a> ExtractionPrompt<'a> {
    /// Create a new extraction prompt
    pub fn new(question: &'a str, item: &'a RetrievedItem) -> Self {
        Self { question, item }
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        prompt.push_str(&format!("Question being researched: {}\n", self.question));
        prompt.push_str(&format!("Source: {} ({})\n", self.item.origin, self.item.kind));
        if let Some(title) = &self.item.title {
            prompt.push_str(&format!("Title: {}\n", title));
        }
        prompt.push('\n');

        prompt.push_str("Text to analyze:\n");
        prompt.push_str("---\n");
        prompt.push_str(truncate(&self.item.text, MAX_ITEM_CHARS));
        prompt.push_str("\n---\n\n");

        prompt.push_str(EXTRACTION_FORMAT);
        prompt
    }
}

/// Prompt asking whether two statements express the same proposition
pub fn equivalence_prompt(first: &str, second: &str) -> String {
    format!(
        "Do these two statements assert the same fact? Ignore wording, focus on meaning. \
         Statements that differ in a number, date, entity or negation are NOT the same.\n\n\
         A: {}\nB: {}\n\n\
         Respond with a JSON object only: {{\"equivalent\": true}} or {{\"equivalent\": false}}",
        first, second
    )
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

const DECOMPOSITION_INSTRUCTIONS: &str = r#"You are a query analysis expert. Analyze the complexity of a user's question and break it down if necessary.

Complex questions need multiple pieces of information, compare several concepts, or have several aspects. Simple questions ask for one fact.

Examples of COMPLEX questions:
- "What is quantum computing and how does it differ from classical computing?"
- "Compare the economic policies of the US and China and their impact on global trade"

Examples of SIMPLE questions:
- "Who is the president of France?"
- "When was the Eiffel Tower built?""#;

const DECOMPOSITION_FORMAT: &str = r#"Each sub-question must:
1. Address one specific aspect
2. Be answerable independently
3. Together with the others, answer the main question
4. Appear in logical order (definitions before comparisons, causes before effects)

Respond with a JSON object only:
{
  "is_complex": true/false,
  "reasoning": "Brief explanation of why it is/isn't complex",
  "sub_questions": ["sub-question 1", "sub-question 2"]
}

If is_complex is false, sub_questions should be an empty list."#;

const EXTRACTION_INSTRUCTIONS: &str = r#"Extract discrete, atomic factual claims from the following text that are relevant to the question.

Rules:
- One fact per claim, stated as a complete sentence that stands on its own
- Only state what the text says; do not add outside knowledge
- Resolve pronouns to the entity they refer to
- If the text denies a fact, state the fact positively and set "negated" to true
- Skip opinions, questions and navigation text"#;

const EXTRACTION_FORMAT: &str = r#"Output format (JSON array only, no additional text):
[
  { "statement": "complete factual sentence", "negated": false }
]

Return an empty array if the text contains no relevant facts."#;
