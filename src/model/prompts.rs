//! Prompt builders for answer generation and grading.

pub fn generation_prompt(question: &str) -> String {
    format!("Answer the following question concisely and accurately: {question}")
}

pub fn evaluation_prompt(question: &str, expected_answer: &str, actual_answer: &str) -> String {
    format!(
        r#"You are an expert grader assessing the quality of answers to questions.
Question: {question}
Expected answer: {expected_answer}
Actual answer: {actual_answer}

Grade the actual answer against the expected answer on:
1. Similarity (0-100): how semantically close is the actual answer to the expected one?
2. Correctness (0-100): is the information in the actual answer factually correct?
3. Completeness (0-100): does the actual answer cover every key point of the expected answer?
Compute an overall score (0-100) from these metrics.
Give a short explanation of your grading (at most 100 words).
Format your reply as a JSON object with these fields:
- score: the overall score (number)
- explanation: your explanation (string)
- similarity: similarity score (number)
- correctness: correctness score (number)
- completeness: completeness score (number)
Example reply:
{{
    "score": 95,
    "explanation": "The answer is correct and complete",
    "similarity": 90,
    "correctness": 100,
    "completeness": 95
}}"#
    )
}
