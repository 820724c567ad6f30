//! JSON shapes returned by the API.
//!
//! Every entity that can be soft-deleted is converted into a [`Redacted`]
//! value exactly once, when it leaves the store. A deleted record becomes a
//! [`Tombstone`] that carries only its identity, so no handler can leak the
//! body or author of something that was deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{Comment, Post, Role, User};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Redacted<T> {
    Visible(T),
    Deleted(Tombstone),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    pub deleted: bool,
}

impl Tombstone {
    fn user() -> Self {
        Self {
            id: None,
            post_id: None,
            deleted: true,
        }
    }

    fn post(id: i64) -> Self {
        Self {
            id: Some(id),
            post_id: None,
            deleted: true,
        }
    }

    fn comment(id: i64, post_id: i64) -> Self {
        Self {
            id: Some(id),
            post_id: Some(post_id),
            deleted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJson {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub post_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostJson {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author: Redacted<UserJson>,
    pub comment_count: i64,
    pub tags: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentJson {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
    pub author: Redacted<UserJson>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
}

pub type UserView = Redacted<UserJson>;
pub type PostView = Redacted<PostJson>;
pub type CommentView = Redacted<CommentJson>;

impl From<User> for UserView {
    fn from(user: User) -> Self {
        if user.deleted {
            return Redacted::Deleted(Tombstone::user());
        }
        Redacted::Visible(UserJson {
            id: user.id,
            username: user.username,
            role: user.role,
            bio: user.bio,
            avatar: user.avatar,
            post_count: user.post_count,
            comment_count: user.comment_count,
            created_at: user.created_at,
            deleted: false,
        })
    }
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        if post.deleted {
            return Redacted::Deleted(Tombstone::post(post.id));
        }
        Redacted::Visible(PostJson {
            id: post.id,
            tags: parse_tag_ids(&post.tags),
            title: post.title,
            body: post.body,
            author: post.author.into(),
            comment_count: post.comment_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
            deleted: false,
        })
    }
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        if comment.deleted {
            return Redacted::Deleted(Tombstone::comment(comment.id, comment.post_id));
        }
        Redacted::Visible(CommentJson {
            id: comment.id,
            post_id: comment.post_id,
            body: comment.body,
            author: comment.author.into(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            deleted: false,
        })
    }
}

/// Comma-joined ids to a list, skipping fragments that are not integers.
pub fn parse_tag_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}
