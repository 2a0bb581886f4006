use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==================== Polymorphic references ====================

/// Kind of content item a polymorphic reference can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Post,
    Reply,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "Post",
            ContentKind::Reply => "Reply",
        }
    }

    /// Table holding documents of this kind. This is the only place a tag is
    /// resolved to storage.
    pub fn table(&self) -> &'static str {
        match self {
            ContentKind::Post => "posts",
            ContentKind::Reply => "replies",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    /// Accepts both "Post" and "post" since path segments arrive lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Post" | "post" => Ok(ContentKind::Post),
            "Reply" | "reply" => Ok(ContentKind::Reply),
            other => Err(format!("Unknown content type: {}", other)),
        }
    }
}

/// A typed reference to a Post or a Reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: String,
}

impl ContentRef {
    pub fn new(kind: ContentKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self::new(ContentKind::Post, id)
    }

    pub fn reply(id: impl Into<String>) -> Self {
        Self::new(ContentKind::Reply, id)
    }
}

// ==================== Users and follows ====================

/// A registered account. Counters are owned by the counter maintainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub avatar: String,
    pub header: String,
    pub bio: String,
    pub location: String,
    pub post_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh account with zeroed counters; id and timestamps are assigned by the store.
    pub fn new(username: &str, display_name: &str, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            display_name: display_name.to_string(),
            avatar: String::new(),
            header: String::new(),
            bio: String::new(),
            location: String::new(),
            post_count: 0,
            follower_count: 0,
            following_count: 0,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Directed follow edge, unique per ordered pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub id: String,
    pub follower_id: String,
    pub followee_id: String,
    pub created_at: DateTime<Utc>,
}

/// How an author relates to the viewer. "No relationship" is modelled as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    FollowsCurrentUser,
    FollowedByCurrentUser,
    FollowEachOther,
}

// ==================== Content ====================

/// Denormalized aggregate counts cached on a content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCounters {
    pub reply_count: i64,
    pub repost_count: i64,
    pub like_count: i64,
    pub bookmark_count: i64,
    pub view_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub media_file: String,
    #[serde(flatten)]
    pub counters: ContentCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reply to a Post or another Reply. `links` is the ancestor chain from the
/// root post down to the direct parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub media_file: String,
    pub target: ContentRef,
    pub links: Vec<String>,
    #[serde(flatten)]
    pub counters: ContentCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Either kind of content item, for code that handles both alike.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ContentItem {
    Post(Post),
    Reply(Reply),
}

impl ContentItem {
    pub fn id(&self) -> &str {
        match self {
            ContentItem::Post(p) => &p.id,
            ContentItem::Reply(r) => &r.id,
        }
    }

    pub fn author_id(&self) -> &str {
        match self {
            ContentItem::Post(p) => &p.author_id,
            ContentItem::Reply(r) => &r.author_id,
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Post(_) => ContentKind::Post,
            ContentItem::Reply(_) => ContentKind::Reply,
        }
    }

    pub fn counters(&self) -> &ContentCounters {
        match self {
            ContentItem::Post(p) => &p.counters,
            ContentItem::Reply(r) => &r.counters,
        }
    }

    pub fn content_ref(&self) -> ContentRef {
        ContentRef::new(self.kind(), self.id())
    }
}

// ==================== Timeline entries ====================

/// The single activity a timeline entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThreadActivity {
    Post { post: String },
    Reply { reply: String },
    Repost { repost: ContentRef },
}

impl ThreadActivity {
    /// The content this entry shows on a timeline.
    pub fn content_ref(&self) -> ContentRef {
        match self {
            ThreadActivity::Post { post } => ContentRef::post(post.clone()),
            ThreadActivity::Reply { reply } => ContentRef::reply(reply.clone()),
            ThreadActivity::Repost { repost } => repost.clone(),
        }
    }
}

/// "This user's timeline contains this activity."
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserThread {
    pub id: String,
    pub user_id: String,
    pub activity: ThreadActivity,
    pub created_at: DateTime<Utc>,
}

// ==================== Engagement edges ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: String,
    pub author_id: String,
    pub target: ContentRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub target: ContentRef,
    pub created_at: DateTime<Utc>,
}

// ==================== Notifications and messages ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationEvent {
    Mention,
    Repost,
    Reply,
    Follow,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::Mention => "mention",
            NotificationEvent::Repost => "repost",
            NotificationEvent::Reply => "reply",
            NotificationEvent::Follow => "follow",
        }
    }
}

/// What a notification is about; the payload reference depends on the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum NotificationSubject {
    Mention {
        #[serde(rename = "mentionLocation")]
        location: ContentRef,
    },
    Repost {
        repost: ContentRef,
    },
    Reply {
        reply: String,
    },
    Follow,
}

impl NotificationSubject {
    pub fn event(&self) -> NotificationEvent {
        match self {
            NotificationSubject::Mention { .. } => NotificationEvent::Mention,
            NotificationSubject::Repost { .. } => NotificationEvent::Repost,
            NotificationSubject::Reply { .. } => NotificationEvent::Reply,
            NotificationSubject::Follow => NotificationEvent::Follow,
        }
    }

    /// Content referenced by the notification, if any.
    pub fn content_ref(&self) -> Option<ContentRef> {
        match self {
            NotificationSubject::Mention { location } => Some(location.clone()),
            NotificationSubject::Repost { repost } => Some(repost.clone()),
            NotificationSubject::Reply { reply } => Some(ContentRef::reply(reply.clone())),
            NotificationSubject::Follow => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    #[serde(flatten)]
    pub subject: NotificationSubject,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Direct message. Immutable apart from `is_read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "from")]
    pub from_id: String,
    #[serde(rename = "to")]
    pub to_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashtag {
    pub id: String,
    pub name: String,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
}

// ==================== View models ====================

/// A user as seen by the viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,
}

impl AuthorView {
    pub fn new(user: User) -> Self {
        Self { user, relationship: None }
    }
}

/// A content item with its author and the viewer-relative annotations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(flatten)]
    pub item: ContentItem,
    pub author: AuthorView,
    pub is_liked: bool,
    pub is_reposted: bool,
    pub is_bookmarked: bool,
    /// For replies: the populated parent, shown as context and never annotated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ContentView>>,
}

impl ContentView {
    pub fn new(item: ContentItem, author: User) -> Self {
        Self {
            kind: item.kind(),
            item,
            author: AuthorView::new(author),
            is_liked: false,
            is_reposted: false,
            is_bookmarked: false,
            parent: None,
        }
    }

    pub fn id(&self) -> &str {
        self.item.id()
    }

    pub fn author_id(&self) -> &str {
        self.item.author_id()
    }
}

/// A populated timeline entry: exactly one of the three slots is set unless
/// the referenced content has disappeared.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub id: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<ContentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ContentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repost_type: Option<ContentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repost: Option<ContentView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub sender: Option<User>,
    pub recipient_id: String,
    pub event: NotificationEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention_location_type: Option<ContentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention_location: Option<ContentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repost_type: Option<ContentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repost: Option<ContentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ContentView>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkView {
    pub id: String,
    pub user_id: String,
    pub target_type: ContentKind,
    pub target: Option<ContentView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeView {
    pub id: String,
    pub author_id: String,
    pub target_type: ContentKind,
    pub target: Option<ContentView>,
    pub created_at: DateTime<Utc>,
}

/// A chat partner with the full conversation history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    #[serde(flatten)]
    pub user: User,
    pub messages: Vec<Message>,
}

// ==================== Request types ====================

const MAX_PAGE_LIMIT: i64 = 100;
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_LIMIT;

/// Page/limit query parameters shared by every list endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: default_page(), limit: default_limit() }
    }
}

impl Pagination {
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 || self.page > MAX_PAGE {
            return Err(format!("page must be between 1 and {}", MAX_PAGE));
        }
        if self.limit < 1 || self.limit > MAX_PAGE_LIMIT {
            return Err(format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn total_pages(&self, count: i64) -> i64 {
        (count + self.limit - 1) / self.limit
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        let username = self.username.trim();
        if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err("username may only contain letters, digits and underscores".to_string());
        }
        if self.display_name.trim().is_empty() {
            return Err("displayName is required".to_string());
        }
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err("password is required".to_string());
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err("email is not valid".to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub header: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

// Query structs repeat page/limit instead of flattening `Pagination`:
// flattened numbers do not survive urlencoded deserialization.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub search_text: Option<String>,
}

impl UsersQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination { page: self.page, limit: self.limit }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub ignore_current: bool,
    pub search_text: Option<String>,
}

impl PostsQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination { page: self.page, limit: self.limit }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserPostsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub original: bool,
}

impl UserPostsQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination { page: self.page, limit: self.limit }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub media_file: String,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_content(&self.content)
    }
}

fn validate_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("content must not be empty".to_string());
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentRequest {
    pub content: Option<String>,
    pub media_file: Option<String>,
}

impl UpdateContentRequest {
    pub fn validate(&self) -> Result<(), String> {
        match &self.content {
            Some(content) => validate_content(content),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepostRequest {
    pub repost_type: ContentKind,
    pub repost_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoRepostRequest {
    pub repost_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyRequest {
    pub content: String,
    #[serde(default)]
    pub media_file: String,
    pub target_type: ContentKind,
    pub target_id: String,
}

impl CreateReplyRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_content(&self.content)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub target_type: ContentKind,
    pub target: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRequest {
    pub target_type: ContentKind,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub followee_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashtagQuery {
    pub search_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHashtagsRequest {
    pub hashtags: Vec<String>,
    pub post_id: String,
}

impl CreateHashtagsRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.hashtags.iter().any(|h| h.trim().is_empty()) {
            return Err("hashtags must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionRequest {
    pub mention_location_type: ContentKind,
    pub mention_location: String,
    pub mentioned_targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationStatusRequest {
    pub notifs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageStatusRequest {
    pub messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub content: String,
    pub to: String,
}

impl CreateMessageRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_content(&self.content)
    }
}

// ==================== Response envelope ====================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// `{data?, errors?, message?}` envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            errors: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: Some(ErrorBody { message: message.into() }),
            message: Some(category.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_arithmetic() {
        let page = Pagination { page: 3, limit: 10 };
        assert_eq!(page.offset(), 20);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
        assert!(Pagination { page: 0, limit: 10 }.validate().is_err());
        assert!(Pagination { page: 1, limit: 101 }.validate().is_err());
        assert!(Pagination { page: i64::MAX, limit: 100 }.validate().is_err());
        let last = Pagination { page: MAX_PAGE, limit: MAX_PAGE_LIMIT };
        assert!(last.validate().is_ok());
        assert!(last.offset() > 0);
    }

    #[test]
    fn test_content_kind_parsing() {
        assert_eq!("post".parse::<ContentKind>().unwrap(), ContentKind::Post);
        assert_eq!("Reply".parse::<ContentKind>().unwrap(), ContentKind::Reply);
        assert!("Thread".parse::<ContentKind>().is_err());
        assert_eq!(ContentKind::Reply.table(), "replies");
    }

    #[test]
    fn test_notification_serializes_event_tag() {
        let notif = Notification {
            id: "n1".to_string(),
            sender_id: "u1".to_string(),
            recipient_id: "u2".to_string(),
            subject: NotificationSubject::Repost { repost: ContentRef::post("p1") },
            is_read: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&notif).unwrap();
        assert_eq!(value["event"], "repost");
        assert_eq!(value["repost"]["kind"], "Post");
        assert_eq!(value["recipientId"], "u2");
    }

    #[test]
    fn test_register_validation() {
        let mut req = RegisterRequest {
            username: "alice_1".to_string(),
            display_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
        };
        assert!(req.validate().is_ok());
        req.username = "alice!".to_string();
        assert!(req.validate().is_err());
        req.username = "alice".to_string();
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_user_password_is_not_serialized() {
        let user = User::new("bob", "Bob", "bob@example.com", "hash".to_string());
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("isDeleted").is_none());
        assert_eq!(value["displayName"], "Bob");
    }
}
