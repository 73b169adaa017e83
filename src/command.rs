use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::imgflip::CaptionRequest;

const MEME_LIST_TRIGGER: &str = "memelist";
const MAKE_MEME_TRIGGER: &str = "makememe";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no meme template id found in message: {0:?}")]
    MissingTemplateId(String),
}

/// Commands found in a message. Both may be set at once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Triggers {
    pub meme_list: bool,
    pub make_meme: bool,
}

impl Triggers {
    pub fn any(&self) -> bool {
        self.meme_list || self.make_meme
    }
}

/// Case-insensitive substring match for both command words.
pub fn detect(text: &str) -> Triggers {
    let lowered = text.to_lowercase();
    Triggers {
        meme_list: lowered.contains(MEME_LIST_TRIGGER),
        make_meme: lowered.contains(MAKE_MEME_TRIGGER),
    }
}

fn template_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("template id pattern is valid"))
}

fn caption_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("\u{201C}(.*?)\u{201D}").expect("caption pattern is valid"))
}

/// Extracts the template id (first digit run) and the captions wrapped in
/// curly quotes, left to right.
pub fn parse_caption_request(text: &str) -> Result<CaptionRequest, CommandError> {
    let template_id = template_id_regex()
        .find(text)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CommandError::MissingTemplateId(text.to_string()))?;

    let texts = caption_regex()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();

    Ok(CaptionRequest { template_id, texts })
}
