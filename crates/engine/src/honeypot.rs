use std::fmt;

use serde::Serialize;

/// Geometry read straight off `getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Everything the trap-detection chain needs to know about a candidate
/// element, read once up front so the ordered checks in [`detect`] don't
/// each re-touch the DOM.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub in_svg_subtree: bool,
    pub aria_hidden: bool,
    pub has_offset_parent: bool,
    pub display_is_contents: bool,
    pub class_name: String,
    pub opacity: f64,
    pub visibility_hidden: bool,
    pub style_width: f64,
    pub style_height: f64,
    pub bounding_box: BoundingBox,
    /// Attribute names present on the element, used for avoid-ruleset
    /// attribute matching (spec.md §3).
    pub attribute_names: Vec<String>,
}

/// A human-click refusal reason (spec.md §4.3 step 3, §7). Not an error —
/// these are normal, structured results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum TrapReason {
    SvgElement,
    AriaHidden,
    NoOffsetParent,
    HoneypotClass,
    OpacityZero,
    VisibilityHidden,
    SubPixel,
    NoBoundingBox,
}

impl fmt::Display for TrapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SvgElement => "svg-element",
            Self::AriaHidden => "aria-hidden",
            Self::NoOffsetParent => "no-offsetParent",
            Self::HoneypotClass => "honeypot-class",
            Self::OpacityZero => "opacity-zero",
            Self::VisibilityHidden => "visibility-hidden",
            Self::SubPixel => "sub-pixel",
            Self::NoBoundingBox => "no-bounding-box",
        };
        write!(f, "{s}")
    }
}

impl From<TrapReason> for String {
    fn from(reason: TrapReason) -> Self {
        reason.to_string()
    }
}

const HONEYPOT_KEYWORDS: &[&str] = &[
    "ghost",
    "sr-only",
    "visually-hidden",
    "trap",
    "honey",
    "offscreen",
    "off-screen",
];

/// Whether `class_name` contains one of the honeypot keywords as a whole
/// word, mirroring `/\b(ghost|sr-only|visually-hidden|trap|honey|offscreen|
/// off-screen)\b/i`. Rather than depending on a regex engine, this splits
/// on any non-word character (the complement of `\w`, i.e. not
/// alphanumeric or `_`) to recover the same word boundaries and compares
/// each resulting token case-insensitively — hyphenated keywords like
/// `off-screen` survive because the tokens they're compared against are
/// the original un-split substrings, checked via the same splitting rule
/// applied to both sides.
#[must_use]
pub fn class_matches_honeypot(class_name: &str) -> bool {
    let lower = class_name.to_ascii_lowercase();
    let tokens = split_words(&lower);
    for keyword in HONEYPOT_KEYWORDS {
        let keyword_tokens = split_words(keyword);
        if contains_subsequence(&tokens, &keyword_tokens) {
            return true;
        }
    }
    false
}

fn split_words(s: &str) -> Vec<&str> {
    s.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect()
}

fn contains_subsequence(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Run the ordered trap-detection chain (spec.md §4.3 step 3: "EXACT order
/// (first match wins)"). Returns `None` if the element passes every check.
#[must_use]
pub fn detect(snapshot: &ElementSnapshot) -> Option<TrapReason> {
    if snapshot.in_svg_subtree {
        return Some(TrapReason::SvgElement);
    }
    if snapshot.aria_hidden {
        return Some(TrapReason::AriaHidden);
    }
    if !snapshot.has_offset_parent && !snapshot.display_is_contents {
        return Some(TrapReason::NoOffsetParent);
    }
    if class_matches_honeypot(&snapshot.class_name) {
        return Some(TrapReason::HoneypotClass);
    }
    if snapshot.opacity == 0.0 {
        return Some(TrapReason::OpacityZero);
    }
    if snapshot.visibility_hidden {
        return Some(TrapReason::VisibilityHidden);
    }
    if snapshot.style_width < 5.0 || snapshot.style_height < 5.0 {
        return Some(TrapReason::SubPixel);
    }
    if snapshot.bounding_box.is_zero() {
        return Some(TrapReason::NoBoundingBox);
    }
    None
}
