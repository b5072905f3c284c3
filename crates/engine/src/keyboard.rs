//! Keyboard event synthesis and modifier-state tracking (spec.md §4.3:
//! "dom.keyPress, dom.keyDown, dom.keyUp dispatch synthesised events with
//! the fully populated key/code/keyCode/charCode/modifier set").

use crate::dom::{DomAccess, KeyEvent, KeyEventKind, Modifiers};

/// Tracks `Meta`/`Control`/`Shift`/`Alt` state across a sequence of key
/// actions within one content-script instance, so every dispatched event
/// carries the correct modifier set (spec.md §4.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifierTracker {
    state: Modifiers,
}

impl ModifierTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Modifiers {
        self.state
    }

    /// Apply a `keyDown`/`keyUp` for one of the four modifier names,
    /// updating tracked state. Returns `false` if `key` isn't a modifier.
    pub fn apply(&mut self, key: &str, down: bool) -> bool {
        match key {
            "Shift" => self.state.shift = down,
            "Control" => self.state.control = down,
            "Alt" => self.state.alt = down,
            "Meta" => self.state.meta = down,
            _ => return false,
        }
        true
    }
}

/// One token from a tokenised `human.type`/`dom.type` input: either a
/// single printable character or a named special key (`{Enter}`,
/// `{ArrowDown}`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Char(char),
    Special(String),
}

/// Split `text` into tokens, treating any `{KeyName}` substring as a
/// single special-key token (spec.md §4.3).
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == '}' {
                    closed = true;
                    break;
                }
                name.push(next);
            }
            if closed && !name.is_empty() {
                tokens.push(Token::Special(name));
            } else {
                tokens.push(Token::Char('{'));
                for c in name.chars() {
                    tokens.push(Token::Char(c));
                }
            }
        } else {
            tokens.push(Token::Char(c));
        }
    }
    tokens
}

/// Resolve a token to the `(key, code, keyCode)` triple used to populate a
/// synthesized event.
#[must_use]
pub fn key_descriptor(token: &Token) -> (String, String, u32) {
    match token {
        Token::Char(c) => (c.to_string(), char_code_name(*c), *c as u32),
        Token::Special(name) => {
            let code = special_key_code(name);
            (name.clone(), format!("{name}Key"), code)
        }
    }
}

fn char_code_name(c: char) -> String {
    if c.is_ascii_alphabetic() {
        format!("Key{}", c.to_ascii_uppercase())
    } else if c.is_ascii_digit() {
        format!("Digit{c}")
    } else if c == ' ' {
        "Space".to_string()
    } else {
        "Unidentified".to_string()
    }
}

fn special_key_code(name: &str) -> u32 {
    match name {
        "Enter" => 13,
        "Tab" => 9,
        "Escape" => 27,
        "Backspace" => 8,
        "Delete" => 46,
        "ArrowUp" => 38,
        "ArrowDown" => 40,
        "ArrowLeft" => 37,
        "ArrowRight" => 39,
        "Shift" => 16,
        "Control" => 17,
        "Alt" => 18,
        "Meta" => 91,
        _ => 0,
    }
}

/// Dispatch the `keydown [keypress] keyup` sequence for one token at the
/// current focus owner, given the currently tracked modifiers. Value
/// mutation and the `input` event are the caller's responsibility (spec.md
/// §4.3: the type pipeline tracks the accumulated value and caret itself).
pub async fn dispatch_token<D: DomAccess>(dom: &D, token: &Token, modifiers: Modifiers) {
    let (key, code, key_code) = key_descriptor(token);
    let char_code = if let Token::Char(c) = token { *c as u32 } else { 0 };

    dom.dispatch_key_event(KeyEvent {
        kind: KeyEventKind::Down,
        key: key.clone(),
        code: code.clone(),
        key_code,
        char_code,
        modifiers,
    })
    .await;

    if matches!(token, Token::Char(_)) {
        dom.dispatch_key_event(KeyEvent {
            kind: KeyEventKind::Press,
            key: key.clone(),
            code: code.clone(),
            key_code,
            char_code,
            modifiers,
        })
        .await;
    }

    dom.dispatch_key_event(KeyEvent {
        kind: KeyEventKind::Up,
        key,
        code,
        key_code,
        char_code,
        modifiers,
    })
    .await;
}

/// `Ctrl/Cmd+A` select-all.
#[must_use]
pub fn is_select_all(modifiers: Modifiers, token: &Token) -> bool {
    matches!(token, Token::Char('a' | 'A')) && (modifiers.control || modifiers.meta)
}
