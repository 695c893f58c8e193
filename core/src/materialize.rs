/// Materialization of response trees into typed records
///
/// Decoding never fails. Unknown tags are skipped and absent or malformed
/// fields come back as empty strings or zero, so newer server documents with
/// extra fields keep decoding.
use crate::xml::XmlNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// A remote account as it appears inside a listing or a status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub display_name: String,
    pub handle: String,
}

/// One timeline entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// 0 when the document carried no usable id
    pub id: u64,
    pub created_at: String,
    pub text: String,
    pub author: User,
}

impl Status {
    /// Parse `created_at` ("Wed Aug 27 13:08:45 +0000 2008")
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_str(self.created_at.trim(), CREATED_AT_FORMAT)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// What a listing holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Status,
    User,
    OpaqueId,
}

/// Decoded items of one response; one variant per list, never mixed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItems {
    Statuses(Vec<Status>),
    Users(Vec<User>),
    /// Raw id tokens, exactly as they appeared in the document
    Ids(Vec<String>),
}

/// One materialized response page
///
/// Statuses and users are front-inserted while decoding, so they come out in
/// reverse document order. Ids keep document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseList {
    pub items: ListItems,
    pub continuation_cursor: Option<u64>,
}

impl ResponseList {
    pub fn empty(kind: ListKind) -> Self {
        let items = match kind {
            ListKind::Status => ListItems::Statuses(Vec::new()),
            ListKind::User => ListItems::Users(Vec::new()),
            ListKind::OpaqueId => ListItems::Ids(Vec::new()),
        };
        Self {
            items,
            continuation_cursor: None,
        }
    }

    pub fn kind(&self) -> ListKind {
        match self.items {
            ListItems::Statuses(_) => ListKind::Status,
            ListItems::Users(_) => ListKind::User,
            ListItems::Ids(_) => ListKind::OpaqueId,
        }
    }

    pub fn len(&self) -> usize {
        match &self.items {
            ListItems::Statuses(v) => v.len(),
            ListItems::Users(v) => v.len(),
            ListItems::Ids(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursor for the next page, if the server announced one
    pub fn next_cursor(&self) -> Option<u64> {
        self.continuation_cursor.filter(|c| *c > 0)
    }
}

/// Decode `<user>`: `name` and `screen_name`, everything else skipped
pub fn decode_user(node: &XmlNode) -> User {
    let mut user = User::default();
    for child in &node.children {
        if child.is("name") {
            user.display_name = child.text.clone();
        } else if child.is("screen_name") {
            user.handle = child.text.clone();
        }
    }
    user
}

/// Decode `<status>`: `text`, `created_at`, `user`, `id`
pub fn decode_status(node: &XmlNode) -> Status {
    let mut status = Status::default();
    for child in &node.children {
        if child.is("text") {
            status.text = child.text.clone();
        } else if child.is("created_at") {
            status.created_at = child.text.clone();
        } else if child.is("user") {
            status.author = decode_user(child);
        } else if child.is("id") {
            status.id = parse_decimal(&child.text);
        }
    }
    status
}

/// Decode `<next_cursor>`; anything but base-10 digits is 0
pub fn decode_cursor(node: &XmlNode) -> u64 {
    parse_decimal(&node.text)
}

/// Decode a whole listing rooted at `node`
pub fn decode_list(node: &XmlNode, kind: ListKind) -> ResponseList {
    let mut list = ResponseList::empty(kind);
    match &mut list.items {
        ListItems::Statuses(items) => {
            for child in &node.children {
                if child.is("status") {
                    items.push(decode_status(child));
                } else if child.is("next_cursor") {
                    list.continuation_cursor = Some(decode_cursor(child));
                }
            }
            items.reverse();
        }
        ListItems::Users(items) => {
            if node.is("users") {
                collect_users(node, items);
            } else {
                // <user_list><users>...</users><next_cursor/></user_list>
                for child in &node.children {
                    if child.is("users") {
                        collect_users(child, items);
                    } else if child.is("user") {
                        items.push(decode_user(child));
                    } else if child.is("next_cursor") {
                        list.continuation_cursor = Some(decode_cursor(child));
                    }
                }
            }
            items.reverse();
        }
        ListItems::Ids(items) => {
            for child in &node.children {
                if child.is("id") {
                    items.push(child.text.clone());
                } else if child.is("ids") {
                    items.extend(
                        child
                            .children
                            .iter()
                            .filter(|n| n.is("id"))
                            .map(|n| n.text.clone()),
                    );
                } else if child.is("next_cursor") {
                    list.continuation_cursor = Some(decode_cursor(child));
                }
            }
        }
    }
    list
}

fn collect_users(node: &XmlNode, items: &mut Vec<User>) {
    for child in &node.children {
        if child.is("user") {
            items.push(decode_user(child));
        }
    }
}

fn parse_decimal(text: &str) -> u64 {
    let t = text.trim();
    if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    t.parse::<u64>().unwrap_or(0)
}
