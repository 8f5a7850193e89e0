//! Content tree traversal: locate attachments and inline bodies in one pass.

use crate::model::message::ContentNode;

use super::body::decode_text;

/// Maximum nesting depth followed during traversal (guards against adversarial trees).
pub const MAX_DEPTH: usize = 64;

/// An attachment leaf found in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    pub filename: String,
    pub attachment_id: String,
    pub mime_type: Option<String>,
    pub part_id: Option<String>,
    /// Size reported by Gmail (bytes, decoded).
    pub size: u64,
}

/// Everything the walker extracts from one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkResult {
    /// Attachment candidates in pre-order.
    pub attachments: Vec<AttachmentCandidate>,
    /// First decodable `text/plain` body.
    pub text: Option<String>,
    /// First decodable `text/html` body.
    pub html: Option<String>,
}

impl WalkResult {
    /// Classify a single node and merge what it contributes.
    fn visit(&mut self, node: &ContentNode) {
        if let Some(filename) = node.filename() {
            if let Some(attachment_id) = node.attachment_id() {
                self.attachments.push(AttachmentCandidate {
                    filename: filename.to_string(),
                    attachment_id: attachment_id.to_string(),
                    mime_type: node.mime_type.clone(),
                    part_id: node.part_id.clone(),
                    size: node.body.as_ref().map(|b| b.size).unwrap_or(0),
                });
            }
            return;
        }

        let slot = match node.mime_essence().as_str() {
            "text/plain" => &mut self.text,
            "text/html" => &mut self.html,
            _ => return,
        };
        if slot.is_some() {
            return;
        }
        if let Some(data) = node.inline_data() {
            *slot = decode_text(data, node.charset().as_deref());
        }
    }
}

/// Walk a message's content tree in pre-order.
///
/// Children are visited for every node, including attachment leaves, so a
/// malformed tree that nests parts under an attachment still yields them.
pub fn walk(root: &ContentNode) -> WalkResult {
    let mut result = WalkResult::default();
    let mut stack: Vec<(&ContentNode, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        result.visit(node);

        if node.parts.is_empty() {
            continue;
        }
        if depth >= MAX_DEPTH {
            tracing::warn!(
                depth,
                part_id = node.part_id.as_deref().unwrap_or(""),
                "Content tree too deep, skipping nested parts"
            );
            continue;
        }
        // Reverse so the leftmost child is popped first.
        for child in node.parts.iter().rev() {
            stack.push((child, depth + 1));
        }
    }

    result
}
