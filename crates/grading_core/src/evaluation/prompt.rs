//! crates/grading_core/src/evaluation/prompt.rs
//!
//! Assembles the grading instructions and the content parts sent to the oracle.

use super::wire::{ContentPart, ImageUrl, MessageContent, OracleMessage, OracleRequest};

pub const TEMPERATURE: f32 = 0.3;
pub const MAX_TOKENS: u32 = 1000;

/// Models known to accept `image_url` content parts.
pub const MULTIMODAL_MODELS: &[&str] = &[
    "google/gemini-flash-1.5",
    "google/gemini-1.5-flash",
    "google/gemini-1.5-pro",
    "google/gemini-2.0-flash-001",
    "google/gemini-2.0-flash-exp:free",
    "google/gemini-2.5-flash",
    "openai/gpt-4o",
    "openai/gpt-4o-mini",
    "anthropic/claude-3-haiku",
];

pub fn supports_images(model: &str) -> bool {
    MULTIMODAL_MODELS.contains(&model)
}

const EVALUATION_TEMPLATE: &str = r#"You are an expert judge of olympiad-style problems. Grade the user's solution to the problem below against the official solution.

{problem_section}

{solution_section}

# USER SOLUTION
{user_answer}

# EVALUATION RUBRIC
Score the user solution on four criteria, 100 points in total:

1. **Correctness (0-40 points)**: Are the answers and identified patterns correct?
2. **Reasoning (0-30 points)**: Is the reasoning sound and explained?
3. **Coverage (0-20 points)**: Does it address every part of the problem?
4. **Clarity (0-10 points)**: Is the write-up clear and well organized?

# CONFIDENCE
Report how certain you are of your own grade:
- **high**: the answer can be checked objectively and is clearly right or clearly wrong
- **medium**: some subjective elements, but the main points are clear
- **low**: ambiguous or subjective; a human expert should decide

# GUIDELINES
1. Be generous: a solution that shows understanding in different words or with a different method than the official one still earns points.
2. Accept any logically sound alternative approach.
3. Small notation or formatting slips should barely affect the score.
4. When unsure whether an answer is right, lower your confidence instead of scoring harshly.
5. Give partial credit for partially correct work. Award 0 only when the answer is entirely wrong.

# RESPONSE FORMAT
Reply with one JSON object and nothing else (no markdown):

{
  "scores": {
    "correctness": <0-40>,
    "reasoning": <0-30>,
    "coverage": <0-20>,
    "clarity": <0-10>
  },
  "confidence": "<low|medium|high>",
  "feedback": "<2-3 sentences of constructive feedback>",
  "errors": ["<specific error>"],
  "strengths": ["<strength>"],
  "suggestions": ["<improvement>"]
}

Full marks are for truly excellent work. Typical good solutions score 70-85."#;

/// Everything the oracle needs to grade one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationInput {
    pub problem_text: String,
    pub reference_solution: String,
    pub user_answer: String,
    pub problem_media_url: Option<String>,
    pub solution_media_url: Option<String>,
}

/// Builds the scoring request for `model`.
///
/// Rendered problem/solution images are attached only when the model is on
/// [`MULTIMODAL_MODELS`]; other models get the text prompt alone.
pub fn build_request(input: &EvaluationInput, model: &str) -> OracleRequest {
    let with_images = supports_images(model);
    let problem_media = input.problem_media_url.as_deref().filter(|_| with_images);
    let solution_media = input.solution_media_url.as_deref().filter(|_| with_images);

    if !with_images && (input.problem_media_url.is_some() || input.solution_media_url.is_some()) {
        tracing::warn!(model, "Model is not multimodal; sending the text prompt only.");
    }

    let prompt = render_prompt(input, problem_media.is_some(), solution_media.is_some());

    let images: Vec<ContentPart> = [problem_media, solution_media]
        .into_iter()
        .flatten()
        .map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.to_string(),
            },
        })
        .collect();

    let content = if images.is_empty() {
        MessageContent::Text(prompt)
    } else {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(ContentPart::Text { text: prompt });
        parts.extend(images);
        MessageContent::Parts(parts)
    };

    OracleRequest {
        model: model.to_string(),
        messages: vec![OracleMessage {
            role: "user".to_string(),
            content,
        }],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

fn render_prompt(
    input: &EvaluationInput,
    problem_attached: bool,
    solution_attached: bool,
) -> String {
    let problem_section = if problem_attached {
        format!(
            "# PROBLEM\nThe attached problem rendering has the full details. The statement is repeated below for reference:\n{}",
            input.problem_text
        )
    } else {
        format!("# PROBLEM\n{}", input.problem_text)
    };

    let solution_section = if solution_attached {
        "# OFFICIAL SOLUTION\nRefer to the attached solution rendering for the complete official solution.".to_string()
    } else {
        format!("# OFFICIAL SOLUTION\n{}", input.reference_solution)
    };

    EVALUATION_TEMPLATE
        .replace("{problem_section}", &problem_section)
        .replace("{solution_section}", &solution_section)
        .replace("{user_answer}", &input.user_answer)
}
