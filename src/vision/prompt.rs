use crate::textbook::ProblemId;

pub fn problem_number_prompt(group: &str) -> String {
    format!(
        "This image shows an engineering drawing exercise.\n\
         Read the problem number printed on it.\n\n\
         Answer with the number only, in the form \"{group}-N\" \
         (for example \"{group}-1\" or \"{group}-12\").\n\
         If no problem number is visible, answer \"UNKNOWN\".\n"
    )
}

pub fn analysis_prompt(textbook_context: &str, problem: Option<&ProblemId>) -> String {
    let problem_note = problem
        .map(|p| format!(" (Problem {p})"))
        .unwrap_or_default();

    format!(
        r#"You are an engineering drawing tutor working on projections of planes{problem_note}.

RULES
1. Answer strictly from the textbook excerpt below.
2. Do not bring in outside knowledge.
3. If the excerpt does not cover something, say "Not covered in provided textbook".
4. Write for a student: clear, patient, encouraging.

--- TEXTBOOK EXCERPT BEGIN ---
{textbook_context}
--- TEXTBOOK EXCERPT END ---

TASK
The attached drawing is an unfinished exercise. Explain, step by step, how to complete it.

Reply with a single JSON object of exactly this shape:
{{
  "problem_identification": "short description of the exercise",
  "given_information": ["each given fact, e.g. circular plate of 50 mm diameter"],
  "required_output": "what has to be drawn or completed",
  "key_concept": "the textbook concept being applied",
  "construction_steps": [
    {{"step": 1, "instruction": "what to do", "explanation": "why, citing the principle"}}
  ],
  "common_mistakes": ["typical student errors"]
}}

Give between 4 and 6 construction_steps in drawing order, using the textbook's terminology.
Return only the JSON object: no markdown, no code fences."#
    )
}
