//! Address matching and token extraction.
//!
//! A message addresses the router when it starts with a mention of the bot
//! (`<@id>` or `<@!id>`) or with the configured prefix. What follows is split
//! on whitespace runs: the first token, lower-cased, is the command key and
//! the rest are its arguments.

/// The part of a message that addressed the router, and what came after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address<'a> {
    /// The matched mention or prefix text.
    pub matched: &'a str,
    /// Everything after it.
    pub rest: &'a str,
}

/// A command key and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The first token, lower-cased.
    pub key: String,
    /// The remaining tokens, untouched.
    pub args: Vec<String>,
}

/// Finds the address at the start of `content`.
///
/// The mention is tried first. An empty prefix never matches, so a router
/// without a prefix can only be addressed by mention.
pub fn match_address<'a>(
    content: &'a str,
    prefix: &str,
    mention_id: Option<&str>,
) -> Option<Address<'a>> {
    if let Some(id) = mention_id {
        for mention in [format!("<@{id}>"), format!("<@!{id}>")] {
            if let Some(rest) = content.strip_prefix(mention.as_str()) {
                return Some(Address {
                    matched: &content[..mention.len()],
                    rest,
                });
            }
        }
    }

    if prefix.is_empty() {
        return None;
    }
    content.strip_prefix(prefix).map(|rest| Address {
        matched: &content[..prefix.len()],
        rest,
    })
}

/// Splits the text after the address into a key and arguments.
///
/// Returns `None` when nothing but whitespace follows the address.
pub fn tokenize(rest: &str) -> Option<Invocation> {
    let mut tokens = rest.split_whitespace();
    let key = tokens.next()?.to_lowercase();
    Some(Invocation {
        key,
        args: tokens.map(str::to_string).collect(),
    })
}
