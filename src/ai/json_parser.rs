//! Unwrapping of structured-output replies
//!
//! Requests use a strict `json_schema` response format, so the reply body is
//! the object itself. Some models still wrap it in a markdown fence; that one
//! wrapper is tolerated and anything else is rejected.

/// Return the JSON object carried by a structured-output reply
pub fn extract_json_object(text: &str) -> Result<&str, String> {
    let body = strip_fence(text.trim())?;
    if body.starts_with('{') && body.ends_with('}') {
        Ok(body)
    } else {
        Err("reply is not a single JSON object".to_string())
    }
}

/// Remove a surrounding ``` or ```json fence, if there is one
fn strip_fence(text: &str) -> Result<&str, String> {
    let Some(rest) = text.strip_prefix("```") else {
        return Ok(text);
    };
    // The info string (`json`, or nothing) runs to the end of the first line
    let (_, inner) = rest
        .split_once('\n')
        .ok_or_else(|| "fenced reply has no body".to_string())?;
    inner
        .trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .ok_or_else(|| "unterminated code fence".to_string())
}
