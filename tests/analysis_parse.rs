use drawing_mentor::vision::parse_analysis;

#[test]
fn parses_fenced_reply_and_keeps_extra_fields() {
    let reply = r#"```json
{
  "problem_identification": "Circular plate resting on HP",
  "given_information": ["50 mm diameter"],
  "key_concept": "Change of position method",
  "construction_steps": [
    {"step": 1, "instruction": "Draw the circle", "explanation": "True shape in TV"},
    {"step": 2, "instruction": "Project to FV", "explanation": "Edge view"}
  ],
  "common_mistakes": ["Forgetting hidden lines"]
}
```"#;
    let analysis = parse_analysis(reply);

    assert_eq!(analysis.problem_identification, "Circular plate resting on HP");
    assert_eq!(analysis.construction_steps.len(), 2);
    assert_eq!(analysis.construction_steps[1].step, 2);
    assert_eq!(analysis.construction_steps[1].instruction, "Project to FV");
    assert!(analysis.error.is_none());
    assert_eq!(analysis.extra["key_concept"], "Change of position method");
    assert_eq!(analysis.extra["given_information"][0], "50 mm diameter");
}

#[test]
fn fills_missing_fields() {
    let reply = r#"{"construction_steps": [{"instruction": "Only an instruction"}, {}]}"#;
    let analysis = parse_analysis(reply);

    assert_eq!(analysis.problem_identification, "Not provided");
    let steps = &analysis.construction_steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].step, 1);
    assert_eq!(steps[0].instruction, "Only an instruction");
    assert_eq!(steps[0].explanation, "Explanation not provided");
    assert_eq!(steps[1].step, 2);
    assert_eq!(steps[1].instruction, "Step instruction not provided");
}

#[test]
fn non_list_steps_become_empty() {
    let analysis = parse_analysis(r#"{"problem_identification": "x", "construction_steps": "draw it"}"#);
    assert!(analysis.construction_steps.is_empty());
    assert_eq!(analysis.problem_identification, "x");
}

#[test]
fn invalid_json_is_reported_with_raw_reply() {
    let analysis = parse_analysis("Sorry, I cannot help with that.");
    assert_eq!(analysis.problem_identification, "Parse error");
    assert_eq!(analysis.error.as_deref(), Some("Failed to parse AI response"));
    assert_eq!(
        analysis.raw_response.as_deref(),
        Some("Sorry, I cannot help with that.")
    );
    assert!(analysis.construction_steps.is_empty());
}

#[test]
fn serializes_flat() {
    let analysis = parse_analysis(r#"{"problem_identification": "p", "construction_steps": [], "key_concept": "k"}"#);
    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["key_concept"], "k");
    assert_eq!(json["problem_identification"], "p");
    assert!(json.get("error").is_none());
    assert!(json.get("extra").is_none());
}
