/// Strip markdown code fences from a model response so JSON payloads can be
/// decoded whether or not the model wrapped them.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
