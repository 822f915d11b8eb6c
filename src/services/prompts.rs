//! 提示词模板
//!
//! 四个流程（PDF 出题、相似题、题目修改、图片识别）使用的指令文本

use crate::models::{QuestionKind, RefinementTurn};

/// PDF 出题的系统提示词
pub fn pdf_generation(count: u32, kind: QuestionKind) -> String {
    format!(
        r#"You are an expert educational content creator specializing in generating high-quality assessment questions.

Your task is to analyze the provided text and generate {count} {label} questions that:
1. Are directly relevant to the content
2. Test understanding at various cognitive levels
3. Include detailed, pedagogically sound explanations
4. Are appropriate for the target difficulty level

For MCQ questions:
- Provide 4 options (A, B, C, D)
- Ensure distractors (wrong answers) are plausible but clearly incorrect
- The correct answer must be unambiguous
- Explanation should clarify why the correct answer is right and why others are wrong

For Open-Ended questions:
- Frame questions that require critical thinking or application
- Provide a comprehensive sample answer
- Include grading criteria in the explanation

IMPORTANT: For each question, provide a confidence_score (0.0 to 1.0) that indicates:
- How well the question aligns with the source material (0.9-1.0: Perfect alignment)
- The quality and clarity of the question (0.7-0.9: Good quality)
- Whether there's sufficient context to answer (0.5-0.7: Adequate)
- Below 0.5 indicates the question may need revision

Generate unique IDs for each question (e.g., "q1", "q2", etc.).
Ensure variety in topics and difficulty levels across the questions.

You MUST respond with valid JSON matching the provided schema. Do not include any text outside the JSON structure."#,
        label = kind.label()
    )
}

/// PDF 出题的用户消息，原文逐字附在末尾
pub fn pdf_user_message(count: u32, kind: QuestionKind, text: &str) -> String {
    format!("Generate {count} {kind} questions from this text:\n\n{text}")
}

/// 相似题的系统提示词
pub fn similarity_generation(count: u32) -> String {
    format!(
        r#"You are an expert at analyzing educational questions and creating similar variations.

Your task is to:
1. Carefully analyze the provided question to understand:
   - The topic and subject area
   - The difficulty level
   - The question format and structure
   - The cognitive skills being tested
   - The language of the question (Turkish, English, etc.)

2. Generate {count} new questions that are "twins" of the original:
   - Same topic and difficulty level
   - Same question format (MCQ or open-ended)
   - Same cognitive level (recall, understanding, application, analysis, etc.)
   - Different specific content (different numbers, contexts, examples)
   - IMPORTANT: Use the SAME LANGUAGE as the original question

For MCQ questions:
   - ALWAYS include 4 options (A, B, C, D) even if original has fewer
   - Keep similar distractor patterns
   - Ensure the same level of ambiguity (or lack thereof)
   - Make sure to include the "options" field with all choices
   - Clearly mark the correct_answer

For Open-Ended questions:
   - Maintain similar scope and expected answer length
   - Keep the same type of thinking required

CRITICAL: If the original question is in Turkish, generate questions in Turkish.
If the original is in English, generate in English. Match the language exactly.

Generate unique IDs for each question.
You MUST respond with valid JSON matching the provided schema."#
    )
}

/// 相似题的用户消息
///
/// `language` 为 None 时要求与原题语言一致。
pub fn similarity_user_message(original: &str, count: u32, language: Option<&str>) -> String {
    let language_line = match language {
        Some(lang) => format!("Questions MUST be written in {lang}"),
        None => "Questions MUST use the same language as the original question".to_string(),
    };

    format!(
        r#"Original question:
{original}

IMPORTANT INSTRUCTIONS:
- Generate {count} similar MULTIPLE CHOICE questions
- {language_line}
- Each question MUST contain EXACTLY 4 options (A, B, C, D)
- Put all 4 options in the 'options' field
- Mark the correct answer clearly
- If the original question references an image or graph, the new questions must reference the same image"#
    )
}

/// 题目修改的系统提示词
pub fn refinement(current_question: &str, instruction: &str, history: &str) -> String {
    format!(
        r#"You are an expert educational content editor helping to refine assessment questions.

Context:
- Current question: {current_question}
- User's refinement request: {instruction}

Your task is to:
1. Understand the user's intent from their natural language request
2. Make the requested changes to the question
3. Ensure the modified question remains pedagogically sound
4. Maintain consistency (e.g., if changing the correct answer, update the explanation)

Common refinement requests:
- "Change the correct answer to [option]" - Update correct_answer and explanation
- "Make option [X] harder/easier" - Modify the specified distractor
- "Make the question more difficult" - Increase cognitive complexity
- "Change the numbers to create an integer result" - Adjust numerical values
- "Add more context" - Expand the question stem

You MUST:
- Preserve the question ID and type
- Return the complete modified question
- Provide a clear description of changes made
- Respond with valid JSON matching the provided schema

Previous conversation history:
{history}"#
    )
}

/// 题目修改的用户消息
pub fn refinement_user_message(instruction: &str) -> String {
    format!("Please refine the question according to this instruction: {instruction}")
}

/// 把历史修改渲染成 User/Assistant 交替的文本
pub fn render_history(history: &[RefinementTurn]) -> String {
    if history.is_empty() {
        return "No previous refinements".to_string();
    }
    history
        .iter()
        .map(|turn| format!("User: {}\nAssistant: {}", turn.instruction, turn.response))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 图片识别提示词
pub const OCR_ANALYSIS_PROMPT: &str = r#"You are analyzing an image of an educational question.

Your task is to:
1. Extract all text from the image
2. Identify the question type (MCQ or open-ended)
3. Extract all components (question text, options if MCQ, etc.)
4. Determine the topic and difficulty level

Provide the extracted question in structured format so it can be used for similarity generation."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_prompt_uses_kind_label() {
        let prompt = pdf_generation(5, QuestionKind::OpenEnded);
        assert!(prompt.contains("generate 5 Open-Ended Questions questions"));

        let message = pdf_user_message(2, QuestionKind::Mcq, "source text");
        assert_eq!(message, "Generate 2 mcq questions from this text:\n\nsource text");
    }

    #[test]
    fn test_similarity_language_line() {
        let fixed = similarity_user_message("Soru?", 3, Some("Turkish"));
        assert!(fixed.contains("Questions MUST be written in Turkish"));
        assert!(fixed.contains("Generate 3 similar MULTIPLE CHOICE questions"));

        let mirrored = similarity_user_message("Question?", 3, None);
        assert!(mirrored.contains("same language as the original question"));
    }

    #[test]
    fn test_render_history() {
        assert_eq!(render_history(&[]), "No previous refinements");

        let history = vec![
            RefinementTurn {
                instruction: "make it harder".to_string(),
                response: "raised difficulty".to_string(),
            },
            RefinementTurn {
                instruction: "use integers".to_string(),
                response: "changed numbers".to_string(),
            },
        ];
        assert_eq!(
            render_history(&history),
            "User: make it harder\nAssistant: raised difficulty\nUser: use integers\nAssistant: changed numbers"
        );
    }
}
