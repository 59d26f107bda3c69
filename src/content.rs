//! Rich content blocks.
//!
//! Blocks arrive as loosely-typed JSON objects with a `type` discriminator and
//! are validated into [`ContentBlock`]. Storage flattens them back into one
//! wide row ([`BlockColumns`]).

use serde::Deserialize;

use crate::db::models::BlockType;
use crate::error::ApiError;

/// Words per minute used for the derived read time.
pub const WORDS_PER_MINUTE: usize = 200;

/// A block as posted by the editor. Every field except `type` is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub image_caption: Option<String>,
    #[serde(default)]
    pub image_alignment: Option<String>,
    #[serde(default)]
    pub callout_type: Option<String>,
    #[serde(default)]
    pub quote_author: Option<String>,
    #[serde(default)]
    pub list_style: Option<String>,
    #[serde(default)]
    pub list_items: Option<Vec<String>>,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAlignment {
    Left,
    Center,
    Right,
    Full,
}

impl ImageAlignment {
    fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("center") => Ok(ImageAlignment::Center),
            Some("left") => Ok(ImageAlignment::Left),
            Some("right") => Ok(ImageAlignment::Right),
            Some("full") => Ok(ImageAlignment::Full),
            Some(other) => Err(ApiError::validation(format!(
                "Invalid image alignment: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageAlignment::Left => "left",
            ImageAlignment::Center => "center",
            ImageAlignment::Right => "right",
            ImageAlignment::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Paragraph { text: String },
    Heading { text: String, level: i32 },
    Code { code: String, language: Option<String> },
    Image {
        url: String,
        alt: Option<String>,
        caption: Option<String>,
        alignment: ImageAlignment,
    },
    Callout { text: String, tone: Option<String> },
    Quote { text: String, author: Option<String> },
    List { items: Vec<String>, ordered: bool },
    Video { url: String, caption: Option<String> },
}

/// A validated block with its display position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedBlock {
    pub client_id: Option<String>,
    pub order: i32,
    pub block: ContentBlock,
}

/// Flat column values for one stored block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockColumns {
    pub content: Option<String>,
    pub level: Option<i32>,
    pub language: Option<String>,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
    pub image_caption: Option<String>,
    pub image_alignment: Option<String>,
    pub callout_type: Option<String>,
    pub quote_author: Option<String>,
    pub list_style: Option<String>,
    pub list_items: Option<serde_json::Value>,
    pub video_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, what: &str, position: usize) -> Result<String, ApiError> {
    non_blank(value).ok_or_else(|| {
        ApiError::validation(format!("Content block {} is missing {}", position + 1, what))
    })
}

impl ContentBlock {
    pub fn block_type(&self) -> BlockType {
        match self {
            ContentBlock::Paragraph { .. } => BlockType::Paragraph,
            ContentBlock::Heading { .. } => BlockType::Heading,
            ContentBlock::Code { .. } => BlockType::Code,
            ContentBlock::Image { .. } => BlockType::Image,
            ContentBlock::Callout { .. } => BlockType::Callout,
            ContentBlock::Quote { .. } => BlockType::Quote,
            ContentBlock::List { .. } => BlockType::List,
            ContentBlock::Video { .. } => BlockType::Video,
        }
    }

    /// Validate one input block; `position` is only used in error messages.
    pub fn from_input(input: ContentBlockInput, position: usize) -> Result<Self, ApiError> {
        let block_type = BlockType::parse(&input.block_type).ok_or_else(|| {
            ApiError::validation(format!(
                "Content block {} has unknown type {}",
                position + 1,
                input.block_type
            ))
        })?;

        let block = match block_type {
            BlockType::Paragraph => ContentBlock::Paragraph {
                text: ammonia::clean(input.content.as_deref().unwrap_or_default()),
            },
            BlockType::Heading => {
                let level = input.level.unwrap_or(2);
                if !(1..=6).contains(&level) {
                    return Err(ApiError::validation(format!(
                        "Content block {} has invalid heading level {}",
                        position + 1,
                        level
                    )));
                }
                ContentBlock::Heading {
                    text: required(input.content, "heading text", position)?,
                    level,
                }
            }
            BlockType::Code => ContentBlock::Code {
                code: input.content.unwrap_or_default(),
                language: non_blank(input.language),
            },
            BlockType::Image => ContentBlock::Image {
                url: required(input.image_url, "an image URL", position)?,
                alt: non_blank(input.image_alt),
                caption: non_blank(input.image_caption),
                alignment: ImageAlignment::parse(input.image_alignment.as_deref())?,
            },
            BlockType::Callout => ContentBlock::Callout {
                text: ammonia::clean(&required(input.content, "callout text", position)?),
                tone: non_blank(input.callout_type),
            },
            BlockType::Quote => ContentBlock::Quote {
                text: ammonia::clean(&required(input.content, "quote text", position)?),
                author: non_blank(input.quote_author),
            },
            BlockType::List => ContentBlock::List {
                items: input
                    .list_items
                    .unwrap_or_default()
                    .into_iter()
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
                ordered: input.list_style.as_deref() == Some("ordered"),
            },
            BlockType::Video => ContentBlock::Video {
                url: required(input.video_url, "a video URL", position)?,
                caption: non_blank(input.image_caption),
            },
        };

        Ok(block)
    }

    pub fn columns(&self) -> BlockColumns {
        match self {
            ContentBlock::Paragraph { text } => BlockColumns {
                content: Some(text.clone()),
                ..Default::default()
            },
            ContentBlock::Heading { text, level } => BlockColumns {
                content: Some(text.clone()),
                level: Some(*level),
                ..Default::default()
            },
            ContentBlock::Code { code, language } => BlockColumns {
                content: Some(code.clone()),
                language: language.clone(),
                ..Default::default()
            },
            ContentBlock::Image {
                url,
                alt,
                caption,
                alignment,
            } => BlockColumns {
                image_url: Some(url.clone()),
                image_alt: alt.clone(),
                image_caption: caption.clone(),
                image_alignment: Some(alignment.as_str().to_string()),
                ..Default::default()
            },
            ContentBlock::Callout { text, tone } => BlockColumns {
                content: Some(text.clone()),
                callout_type: tone.clone(),
                ..Default::default()
            },
            ContentBlock::Quote { text, author } => BlockColumns {
                content: Some(text.clone()),
                quote_author: author.clone(),
                ..Default::default()
            },
            ContentBlock::List { items, ordered } => BlockColumns {
                list_style: Some(if *ordered { "ordered" } else { "unordered" }.to_string()),
                list_items: Some(serde_json::json!(items)),
                ..Default::default()
            },
            ContentBlock::Video { url, caption } => BlockColumns {
                video_url: Some(url.clone()),
                image_caption: caption.clone(),
                ..Default::default()
            },
        }
    }

    /// Text a reader actually reads, for word counting.
    fn readable_text(&self) -> String {
        match self {
            ContentBlock::Paragraph { text }
            | ContentBlock::Heading { text, .. }
            | ContentBlock::Callout { text, .. }
            | ContentBlock::Quote { text, .. } => strip_tags(text),
            ContentBlock::List { items, .. } => items.join(" "),
            ContentBlock::Image { caption, .. } | ContentBlock::Video { caption, .. } => {
                caption.clone().unwrap_or_default()
            }
            ContentBlock::Code { .. } => String::new(),
        }
    }
}

/// Plain text of already sanitized HTML. Tags are dropped, their text kept.
fn strip_tags(html: &str) -> String {
    // Adjacent elements must not glue words together.
    ammonia::Builder::empty()
        .clean(&html.replace('<', " <"))
        .to_string()
}

/// Validate every block. A missing `order` falls back to the array index.
pub fn validate_blocks(inputs: Vec<ContentBlockInput>) -> Result<Vec<OrderedBlock>, ApiError> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let client_id = non_blank(input.id.clone());
            let order = input.order.unwrap_or(index as i32);
            Ok(OrderedBlock {
                client_id,
                order,
                block: ContentBlock::from_input(input, index)?,
            })
        })
        .collect()
}

/// Assessments only carry paragraphs and headings.
pub fn validate_assessment_blocks(
    inputs: Vec<ContentBlockInput>,
) -> Result<Vec<OrderedBlock>, ApiError> {
    let blocks = validate_blocks(inputs)?;
    if let Some(bad) = blocks.iter().find(|b| {
        !matches!(
            b.block,
            ContentBlock::Paragraph { .. } | ContentBlock::Heading { .. }
        )
    }) {
        return Err(ApiError::validation(format!(
            "Assessment content blocks must be paragraphs or headings, got {}",
            bad.block.block_type().as_str()
        )));
    }
    Ok(blocks)
}

/// Word count and read time (minutes, at least 1) over all blocks.
pub fn read_metrics(blocks: &[OrderedBlock]) -> (i32, i32) {
    let words: usize = blocks
        .iter()
        .map(|b| b.block.readable_text().split_whitespace().count())
        .sum();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    (words as i32, minutes as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(block_type: &str) -> ContentBlockInput {
        ContentBlockInput {
            block_type: block_type.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_heading_requires_valid_level() {
        let mut heading = input("HEADING");
        heading.content = Some("Intro".to_string());
        heading.level = Some(9);
        assert!(ContentBlock::from_input(heading.clone(), 0).is_err());

        heading.level = Some(3);
        let block = ContentBlock::from_input(heading, 0).unwrap();
        assert_eq!(
            block,
            ContentBlock::Heading {
                text: "Intro".to_string(),
                level: 3
            }
        );
        assert_eq!(block.columns().level, Some(3));
    }

    #[test]
    fn test_image_requires_url_and_uses_image_columns_only() {
        assert!(ContentBlock::from_input(input("IMAGE"), 0).is_err());

        let mut image = input("image");
        image.image_url = Some("https://cdn.example/a.png".to_string());
        image.image_alignment = Some("LEFT".to_string());
        image.content = Some("ignored".to_string());
        let columns = ContentBlock::from_input(image, 0).unwrap().columns();
        assert_eq!(columns.image_url.as_deref(), Some("https://cdn.example/a.png"));
        assert_eq!(columns.image_alignment.as_deref(), Some("left"));
        assert_eq!(columns.content, None);
        assert_eq!(columns.level, None);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = ContentBlock::from_input(input("CAROUSEL"), 4).unwrap_err();
        assert!(err.to_string().contains("Content block 5"));
    }

    #[test]
    fn test_paragraph_html_is_sanitized() {
        let mut paragraph = input("PARAGRAPH");
        paragraph.content = Some("<p>Hi<script>alert(1)</script></p>".to_string());
        match ContentBlock::from_input(paragraph, 0).unwrap() {
            ContentBlock::Paragraph { text } => {
                assert!(!text.contains("script"));
                assert!(text.contains("Hi"));
            }
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn test_order_defaults_to_index() {
        let mut first = input("PARAGRAPH");
        first.order = Some(10);
        let blocks = validate_blocks(vec![first, input("PARAGRAPH")]).unwrap();
        assert_eq!(blocks[0].order, 10);
        assert_eq!(blocks[1].order, 1);
    }

    #[test]
    fn test_assessment_blocks_reject_code() {
        let mut code = input("CODE");
        code.content = Some("fn main() {}".to_string());
        assert!(validate_assessment_blocks(vec![input("PARAGRAPH"), code]).is_err());
    }

    #[test]
    fn test_list_columns_hold_items_as_json() {
        let mut list = input("LIST");
        list.list_items = Some(vec!["one".to_string(), " ".to_string(), "two".to_string()]);
        list.list_style = Some("ordered".to_string());
        let columns = ContentBlock::from_input(list, 0).unwrap().columns();
        assert_eq!(columns.list_items, Some(serde_json::json!(["one", "two"])));
        assert_eq!(columns.list_style.as_deref(), Some("ordered"));
    }

    #[test]
    fn test_read_metrics() {
        let mut paragraph = input("PARAGRAPH");
        paragraph.content = Some(format!("<p>{}</p>", "word ".repeat(450)));
        let blocks = validate_blocks(vec![paragraph]).unwrap();
        assert_eq!(read_metrics(&blocks), (450, 3));
        assert_eq!(read_metrics(&[]), (0, 1));
    }

    #[test]
    fn test_word_count_ignores_markup() {
        let mut paragraph = input("PARAGRAPH");
        paragraph.content = Some("<p>Hello <b>big</b> world</p><p>again</p>".to_string());
        let mut quote = input("QUOTE");
        quote.content = Some("a <a href=\"https://x.example\" title=\"not counted\">link</a>".to_string());
        let blocks = validate_blocks(vec![paragraph, quote]).unwrap();
        assert_eq!(read_metrics(&blocks), (6, 1));
    }
}
