use serde_json::Value;

use super::humanize_topic;
use crate::ai::TextGenerator;
use crate::error::{AppError, Result};
use crate::models::{DraftRequest, GeneratedContent, SiteProfile};

const SYSTEM_PROMPT: &str = r#"You are an SEO and GEO copywriter for local businesses.
You write accurate, helpful articles that search engines and AI assistants can quote.
You never invent prices, certifications or customer reviews.
You answer with a single JSON object and nothing else."#;

pub(super) async fn build(
    generator: &dyn TextGenerator,
    profile: &SiteProfile,
    request: &DraftRequest,
) -> Result<GeneratedContent> {
    let prompt = build_prompt(profile, request);
    let raw = generator.complete(SYSTEM_PROMPT, &prompt).await?;

    let mut content = parse_generated(&raw)?;
    let meta = content.meta.take().unwrap_or_else(|| serde_json::json!({}));
    content.meta = Some(serde_json::json!({
        "builder": "llm",
        "model": generator.model_version(),
        "topic_key": request.topic_key,
        "generated": meta,
    }));
    Ok(content)
}

fn or_unknown(value: &str) -> &str {
    match value.trim() {
        "" => "not specified",
        v => v,
    }
}

fn build_prompt(profile: &SiteProfile, request: &DraftRequest) -> String {
    let services = if profile.services.is_empty() {
        "not specified".to_string()
    } else {
        profile.services.join(", ")
    };
    let frequency = request.frequency.as_deref().unwrap_or("1_per_week");

    format!(
        r#"Write one blog article for the company below.

Company: {company}
Description: {description}
Service area: {area}
Audience: {audience}
Services: {services}
Language: {language}
Tone: {tone}
Topic: {topic} (topic key: {topic_key})
Publishing frequency: {frequency}. Avoid repeating angles a reader of this cadence has already seen.

Requirements:
- 700 to 1100 words, written in the language above.
- Use <h2> section headings and <p> paragraphs; no <h1>, no inline styles, no images.
- Mention the service area naturally when it is specified.
- End with a short FAQ section of three questions.

Output format (strict): a single JSON object with the keys
"title" (string), "excerpt" (string, at most 160 characters),
"content_html" (string of HTML) and optionally "meta" (object with
"keywords" as an array of strings). No markdown fences, no commentary."#,
        company = profile.display_name(),
        description = or_unknown(&profile.description),
        area = or_unknown(&profile.service_area),
        audience = or_unknown(&profile.audience),
        services = services,
        language = profile.language_or_default(),
        tone = match profile.tone.trim() {
            "" => "professional and friendly",
            tone => tone,
        },
        topic = humanize_topic(&request.topic_key),
        topic_key = request.topic_key,
        frequency = frequency,
    )
}

/// Parses generator output into content, accepting JSON wrapped in prose or
/// code fences. Fails instead of returning empty content.
pub(crate) fn parse_generated(raw: &str) -> Result<GeneratedContent> {
    let value = match serde_json::from_str::<Value>(strip_code_blocks(raw)) {
        Ok(value) if value.is_object() => value,
        _ => {
            let span = extract_json_object(raw).ok_or_else(|| {
                AppError::Generation("generator output contains no JSON object".to_string())
            })?;
            serde_json::from_str::<Value>(span).map_err(|e| {
                AppError::Generation(format!("generator output is not valid JSON: {}", e))
            })?
        }
    };

    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };

    let title = field("title");
    if title.is_empty() {
        return Err(AppError::GenerationIncomplete("title"));
    }
    let content_html = field("content_html");
    if content_html.is_empty() {
        return Err(AppError::GenerationIncomplete("content_html"));
    }

    Ok(GeneratedContent {
        title,
        excerpt: field("excerpt"),
        content_html,
        meta: value.get("meta").filter(|m| !m.is_null()).cloned(),
        images: Vec::new(),
    })
}

fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// First balanced `{...}` span, ignoring braces inside JSON strings.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + idx]);
                }
            }
            _ => {}
        }
    }

    None
}
