//! Image payload extraction from heterogeneous completion responses.
//!
//! Providers disagree on where a generated image lives. Each known layout is a
//! [`ResponseShape`] with a pure matcher; [`extract_image`] tries them in
//! priority order and returns the first base64 payload found.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Shortest base64 run accepted when no data URL is present.
pub const MIN_BASE64_RUN: usize = 200;

/// Widest line treated as wrapped base64 (RFC 2045 uses 76).
const MAX_WRAP_WIDTH: usize = 76;

static DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)data:image/(?:png|jpeg|jpg);base64,([A-Za-z0-9+/=]+(?:\r?\n[A-Za-z0-9+/=]+)*)")
        .expect("data url pattern is valid")
});

static BASE64_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"[A-Za-z0-9+/=]{{{},}}", MIN_BASE64_RUN))
        .expect("base64 run pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `choices[0].message.images[]`
    ImageList,
    /// Message content as an array of typed blocks.
    ContentBlocks,
    /// Message content as a single object.
    ContentObject,
    /// Message content as prose that may embed the payload.
    ContentString,
}

impl ResponseShape {
    pub const PRIORITY: [ResponseShape; 4] = [
        ResponseShape::ImageList,
        ResponseShape::ContentBlocks,
        ResponseShape::ContentObject,
        ResponseShape::ContentString,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::ImageList => "image_list",
            ResponseShape::ContentBlocks => "content_blocks",
            ResponseShape::ContentObject => "content_object",
            ResponseShape::ContentString => "content_string",
        }
    }

    pub fn extract(&self, response: &Value) -> Option<String> {
        match self {
            ResponseShape::ImageList => from_image_list(response),
            ResponseShape::ContentBlocks => from_content_blocks(response),
            ResponseShape::ContentObject => from_content_object(response),
            ResponseShape::ContentString => from_content_string(response),
        }
    }
}

/// First payload found across all shapes, with the shape that matched.
pub fn extract_image(response: &Value) -> Option<(ResponseShape, String)> {
    ResponseShape::PRIORITY
        .iter()
        .find_map(|shape| shape.extract(response).map(|payload| (*shape, payload)))
}

/// Pull a base64 payload out of a string that may carry surrounding text.
pub fn extract_base64_from_str(s: &str) -> Option<String> {
    if let Some(payload) = DATA_URL.captures(s).and_then(|caps| caps.get(1)) {
        return Some(trim_wrapped_payload(payload.as_str()));
    }

    BASE64_RUN
        .find(s)
        .map(|run| strip_whitespace(run.as_str()))
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Join line-wrapped base64 (MIME-style fixed-width lines). Anything after the
/// first line is kept only while the lines share the wrap width; the last
/// wrapped line may be shorter. A payload on one long line ends at the newline.
fn trim_wrapped_payload(payload: &str) -> String {
    let mut lines = payload.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return String::new();
    };

    let width = first.len();
    let mut joined = first.to_string();
    if width > MAX_WRAP_WIDTH || width % 4 != 0 || first.contains('=') {
        return joined;
    }

    for line in lines {
        if line.len() > width {
            break;
        }
        if line.len() < width {
            if (joined.len() + line.len()) % 4 == 0 {
                joined.push_str(line);
            }
            break;
        }
        joined.push_str(line);
        if line.contains('=') {
            break;
        }
    }

    joined
}

fn first_message(response: &Value) -> Option<&Value> {
    response.pointer("/choices/0/message")
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// `choices[0].message.content`, then `candidates[0].content`, then `output[0].content`.
fn message_content(response: &Value) -> Option<&Value> {
    let from_choices = first_message(response).and_then(|m| m.get("content"));
    let from_candidates = response
        .get("candidates")
        .or_else(|| response.get("output"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"));

    from_choices
        .filter(|v| is_present(v))
        .or(from_candidates.filter(|v| is_present(v)))
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn first_hit<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find_map(extract_base64_from_str)
}

fn from_image_list(response: &Value) -> Option<String> {
    let images = first_message(response)?.get("images")?.as_array()?;

    images.iter().find_map(|image| match image {
        Value::String(s) => extract_base64_from_str(s),
        Value::Object(_) => first_hit([
            str_at(image, "/image_url/url"),
            str_at(image, "/url"),
            str_at(image, "/data"),
            str_at(image, "/base64"),
        ]),
        _ => None,
    })
}

fn from_block(block: &Value) -> Option<String> {
    let image_url = if block.get("type").and_then(Value::as_str) == Some("image_url") {
        str_at(block, "/image_url/url")
    } else {
        None
    };

    first_hit([
        image_url,
        str_at(block, "/inlineData/data"),
        str_at(block, "/inline_data/data"),
        str_at(block, "/data"),
    ])
}

fn from_content_blocks(response: &Value) -> Option<String> {
    message_content(response)?
        .as_array()?
        .iter()
        .find_map(from_block)
}

fn from_content_object(response: &Value) -> Option<String> {
    let content = message_content(response)?;
    if !content.is_object() {
        return None;
    }

    from_block(content).or_else(|| {
        content
            .get("parts")?
            .as_array()?
            .iter()
            .find_map(from_block)
    })
}

fn from_content_string(response: &Value) -> Option<String> {
    message_content(response)?
        .as_str()
        .and_then(extract_base64_from_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn b64_run(len: usize) -> String {
        "QUJD".repeat(len / 4)
    }

    #[test]
    fn test_image_list_nested_image_url() {
        let response = json!({
            "choices": [{ "message": {
                "content": "",
                "images": [{ "type": "image_url", "image_url": { "url": "data:image/png;base64,QUJD" } }]
            }}]
        });

        assert_eq!(
            extract_image(&response),
            Some((ResponseShape::ImageList, "QUJD".to_string()))
        );
    }

    #[test]
    fn test_image_list_top_level_fields() {
        let payload = b64_run(240);
        let response = json!({
            "choices": [{ "message": { "images": [
                { "url": "https://cdn.example/not-inline.png" },
                { "base64": payload.clone() }
            ]}}]
        });

        assert_eq!(ResponseShape::ImageList.extract(&response), Some(payload));
    }

    #[test]
    fn test_content_string_with_prose() {
        let payload = b64_run(300);
        let text = format!("Here is your image: data:image/jpeg;base64,{}\nEnjoy!", payload);
        let response = json!({ "choices": [{ "message": { "content": text } }] });

        let (shape, extracted) = extract_image(&response).unwrap();
        assert_eq!(shape, ResponseShape::ContentString);
        assert_eq!(extracted.len(), 300);
        assert_eq!(extracted, payload);
    }

    #[test]
    fn test_wrapped_data_url_is_joined() {
        let first = b64_run(76);
        let second = b64_run(76);
        let text = format!("data:image/png;base64,{}\n{}\n", first, second);

        assert_eq!(
            extract_base64_from_str(&text),
            Some(format!("{}{}", first, second))
        );
    }

    #[test]
    fn test_trailing_prose_line_is_dropped() {
        let payload = b64_run(300);
        for tail in ["Enjoy!", "Have fun!", "Cool!", "Hope this helps", "Done"] {
            let text = format!("Here it is: data:image/png;base64,{}\n{}", payload, tail);
            let response = json!({ "choices": [{ "message": { "content": text } }] });

            let (_, extracted) = extract_image(&response).unwrap();
            assert_eq!(extracted, payload, "tail {:?} leaked into the payload", tail);
        }
    }

    #[test]
    fn test_wrapped_payload_with_short_last_line_and_prose() {
        let full = b64_run(76);
        let last = "QUJDQUJD";
        let text = format!(
            "data:image/png;base64,{}\n{}\n{}\nCool\nbye",
            full, full, last
        );

        assert_eq!(
            extract_base64_from_str(&text),
            Some(format!("{}{}{}", full, full, last))
        );
    }

    #[test]
    fn test_long_run_without_data_url() {
        let payload = b64_run(256);
        let text = format!("The model says: {} (end)", payload);
        assert_eq!(extract_base64_from_str(&text), Some(payload));

        assert_eq!(extract_base64_from_str("short QUJD text"), None);
    }

    #[test]
    fn test_content_blocks() {
        let response = json!({
            "choices": [{ "message": { "content": [
                { "type": "text", "text": "rendered" },
                { "type": "image_url", "image_url": { "url": "data:image/jpg;base64,QUJD" } }
            ]}}]
        });
        assert_eq!(
            extract_image(&response),
            Some((ResponseShape::ContentBlocks, "QUJD".to_string()))
        );

        let inline = json!({
            "choices": [{ "message": { "content": [
                { "inlineData": { "mimeType": "image/png", "data": "data:image/png;base64,QUJD" } }
            ]}}]
        });
        assert_eq!(ResponseShape::ContentBlocks.extract(&inline), Some("QUJD".to_string()));
    }

    #[test]
    fn test_candidates_content_object_with_parts() {
        let payload = b64_run(400);
        let response = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": payload.clone() } }
            ]}}]
        });

        assert_eq!(
            extract_image(&response),
            Some((ResponseShape::ContentObject, payload))
        );
    }

    #[test]
    fn test_priority_prefers_image_list() {
        let response = json!({
            "choices": [{ "message": {
                "content": format!("data:image/png;base64,{}", b64_run(8)),
                "images": ["data:image/png;base64,QUJD"]
            }}]
        });

        assert_eq!(
            extract_image(&response).map(|(shape, _)| shape),
            Some(ResponseShape::ImageList)
        );
    }

    #[test]
    fn test_no_recognizable_shape() {
        let response = json!({
            "choices": [{ "message": { "content": "I cannot generate images today." } }]
        });
        assert_eq!(extract_image(&response), None);
        assert_eq!(extract_image(&json!({ "id": "gen-1" })), None);
    }
}
