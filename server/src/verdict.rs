//! Mapping the scanner's verdict onto an ordered sequence of milter replies.
//!
//! The verdict is a schema-less JSON tree. Its `action` string picks the
//! overall outcome; the optional `milter` sub-object carries fine-grained
//! directives (header removals and additions, sender change, reject policy,
//! probe mode) that are applied first, in a fixed order.

use serde_json::Value;

use spamgate_common::replies::Reply;
use spamgate_utils::debug;

use crate::session::Session;
use crate::MilterConfig;

const RCODE_REJECT: &str = "554";
const XCODE_REJECT: &str = "5.7.1";
const RCODE_TEMPFAIL: &str = "451";
const XCODE_TEMPFAIL: &str = "4.7.1";
const REJECT_MESSAGE: &str = "Spam message rejected";
const TEMPFAIL_MESSAGE: &str = "Try again later";
const DKIM_HEADER: &str = "DKIM-Signature";
/// Records the suppressed action when the session runs in probe mode
const ACTION_HEADER: &str = "X-Spamgate-Action";

/// Scanner actions this endpoint knows how to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerdictAction {
    Reject,
    SoftReject,
    RewriteSubject,
    AddHeader,
    Greylist,
    NoAction,
}

impl VerdictAction {
    /// Both the spaced and the underscored spellings occur in the wild.
    /// Anything unrecognized maps to the harshest action.
    fn from_str(action: &str) -> Self {
        match action {
            "soft reject" | "soft_reject" => Self::SoftReject,
            "rewrite subject" | "rewrite_subject" => Self::RewriteSubject,
            "add header" | "add_header" => Self::AddHeader,
            "greylist" => Self::Greylist,
            "no action" | "no_action" => Self::NoAction,
            _ => Self::Reject,
        }
    }
}

/// Translate scan `results` into the reply sequence for the MTA
pub(crate) fn apply(
    session: &mut Session,
    config: &MilterConfig,
    results: Option<&Value>,
) -> Vec<Reply> {
    let mut replies = Vec::new();

    let Some(results) = results else {
        debug!("no scan results, tempfailing");
        replies.push(Reply::Tempfail);
        return replies;
    };

    let Some(action_str) = results.get("action").and_then(Value::as_str) else {
        debug!("scan results carry no action, tempfailing");
        replies.push(Reply::Tempfail);
        return replies;
    };
    let action = VerdictAction::from_str(action_str);

    let reply_text = results
        .get("messages")
        .and_then(|messages| messages.get("smtp_message"))
        .and_then(Value::as_str);

    if let Some(block) = results.get("milter") {
        if process_milter_block(session, config, &mut replies, block, action) {
            return replies;
        }
    }

    if let Some(signature) = results.get("dkim-signature").and_then(Value::as_str) {
        replies.push(Reply::InsHeader {
            index: 1,
            name: DKIM_HEADER.to_string(),
            value: signature.to_string(),
        });
    }

    if session.no_action {
        debug!("not applying action '{}', probe mode", action_str);
        replies.push(Reply::AddHeader {
            name: ACTION_HEADER.to_string(),
            value: action_str.to_string(),
        });
        replies.push(Reply::Accept);
        return replies;
    }

    match action {
        VerdictAction::Reject => {
            if session.discard_on_reject {
                replies.push(Reply::Discard);
            } else {
                replies.push(Reply::ReplyCode {
                    rcode: RCODE_REJECT.to_string(),
                    xcode: XCODE_REJECT.to_string(),
                    message: reply_text.unwrap_or(REJECT_MESSAGE).to_string(),
                });
                replies.push(Reply::Reject);
            }
        }
        VerdictAction::SoftReject => {
            replies.push(Reply::ReplyCode {
                rcode: RCODE_TEMPFAIL.to_string(),
                xcode: XCODE_TEMPFAIL.to_string(),
                message: reply_text.unwrap_or(TEMPFAIL_MESSAGE).to_string(),
            });
            replies.push(Reply::Reject);
        }
        VerdictAction::RewriteSubject => {
            if let Some(subject) = results.get("subject").and_then(Value::as_str) {
                replies.push(Reply::ChgHeader {
                    index: 1,
                    name: "Subject".to_string(),
                    value: subject.to_string(),
                });
            }
            replies.push(Reply::Accept);
        }
        VerdictAction::AddHeader => {
            remove_header_safe(session, &mut replies, &config.spam_header, 0);
            replies.push(Reply::ChgHeader {
                index: 1,
                name: config.spam_header.clone(),
                value: "Yes".to_string(),
            });
            replies.push(Reply::Accept);
        }
        VerdictAction::Greylist | VerdictAction::NoAction => {
            replies.push(Reply::Accept);
        }
    }

    replies
}

/// Apply the `milter` sub-object of a verdict.
///
/// Returns true when the block already settled the final action (the
/// terminal `spam_header` form), in which case the caller must not apply
/// the action mapping on top.
fn process_milter_block(
    session: &mut Session,
    config: &MilterConfig,
    replies: &mut Vec<Reply>,
    block: &Value,
    action: VerdictAction,
) -> bool {
    // remove_headers: {"name": position, ...}; position 0 clears them all,
    // negative positions count from the end.
    if let Some(removals) = block.get("remove_headers").and_then(Value::as_object) {
        for (name, position) in removals {
            if let Some(position) = position.as_i64() {
                remove_header_safe(session, replies, name, position);
            }
        }
    }

    // add_headers: {"name": "value"} or {"name": {"value": ..,
    // "order": ..}}, possibly an array of either per name.
    if let Some(additions) = block.get("add_headers").and_then(Value::as_object) {
        for (name, entry) in additions {
            match entry {
                Value::Array(entries) => {
                    for entry in entries {
                        push_added_header(replies, name, entry);
                    }
                }
                single => push_added_header(replies, name, single),
            }
        }
    }

    if let Some(from) = block.get("change_from").and_then(Value::as_str) {
        replies.push(Reply::ChgFrom(from.to_string()));
    }

    if let Some(mode) = block.get("reject").and_then(Value::as_str) {
        session.discard_on_reject = mode == "discard";
        if session.discard_on_reject {
            debug!("discarding messages instead of rejecting");
        }
    }

    if let Some(probe) = block.get("no_action").and_then(Value::as_bool) {
        session.no_action = probe;
    }

    if action == VerdictAction::AddHeader {
        match block.get("spam_header") {
            Some(Value::String(value)) => {
                remove_header_safe(session, replies, &config.spam_header, 0);
                replies.push(Reply::ChgHeader {
                    index: 1,
                    name: config.spam_header.clone(),
                    value: value.clone(),
                });
                replies.push(Reply::Accept);
                return true;
            }
            Some(Value::Object(headers)) => {
                for (name, value) in headers {
                    remove_header_safe(session, replies, name, 0);
                    replies.push(Reply::ChgHeader {
                        index: 1,
                        name: name.clone(),
                        value: value.as_str().unwrap_or_default().to_string(),
                    });
                }
                replies.push(Reply::Accept);
                return true;
            }
            _ => {}
        }
    }

    false
}

fn push_added_header(replies: &mut Vec<Reply>, name: &str, entry: &Value) {
    match entry {
        Value::String(value) => replies.push(Reply::AddHeader {
            name: name.to_string(),
            value: value.clone(),
        }),
        Value::Object(fields) => {
            let Some(value) = fields.get("value").and_then(Value::as_str) else {
                return;
            };

            let order = fields
                .get("order")
                .or_else(|| fields.get("index"))
                .and_then(Value::as_i64);

            match order {
                Some(order) if order >= 0 => replies.push(Reply::InsHeader {
                    index: order as u32,
                    name: name.to_string(),
                    value: value.to_string(),
                }),
                _ => replies.push(Reply::AddHeader {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }
        _ => {}
    }
}

/// Emit removals for header `name` following the verdict's position
/// convention: `position >= 1` removes that occurrence, `0` removes every
/// occurrence, negative positions count from the last occurrence backwards.
///
/// Removal is a CHGHEADER with an empty value. Positions are based on the
/// counts the MTA delivered; nothing is emitted for unseen headers or
/// positions further negative than the count.
fn remove_header_safe(session: &Session, replies: &mut Vec<Reply>, name: &str, position: i64) {
    let seen = i64::from(session.header_count(name));
    if seen == 0 {
        return;
    }

    let removal = |index: i64| Reply::ChgHeader {
        index: index as u32,
        name: name.to_string(),
        value: String::new(),
    };

    if position >= 1 {
        replies.push(removal(position));
    } else if position == 0 {
        for index in 1..=seen {
            replies.push(removal(index));
        }
    } else if position >= -seen {
        replies.push(removal(seen + position + 1));
    }
}
