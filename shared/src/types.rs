use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ========== ROLE ==========
/// Capability attached to a user. Roles are flat: no role implies another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Creator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Creator => "creator",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "creator" => Ok(Self::Creator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Argon2 PHC string. Never serialized into a response.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub favorites: Vec<String>,
    pub avatar: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub token: String,
    pub role: Role,
}

/// Self-service profile changes. Absent fields are left untouched.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateUserRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

// ========== BOOK ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub rating: f64,
    pub image: Option<String>,
    pub teaser: Option<String>,
    pub buy_link: Option<String>,
    pub excerpt: Option<String>,
    pub year: Option<i32>,
    pub pages: Option<u32>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub long_description: Option<String>,
    /// Creator who added the book
    pub user: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Body shared by book creation and update
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub image: Option<String>,
    pub teaser: Option<String>,
    pub buy_link: Option<String>,
    pub excerpt: Option<String>,
    pub year: Option<i32>,
    pub pages: Option<u32>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    pub genres: Option<Vec<String>>,
    pub long_description: Option<String>,
}

// ========== FAVORITE ==========
#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    #[serde(rename = "_id")]
    pub book_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
}

// ========== REVIEW ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub review_id: String,
    pub book_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Public view of a review author
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAuthor {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub first_name: String,
    pub email: String,
}

/// Review with `userId` replaced by the author's public fields
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewWithAuthor {
    #[serde(rename = "_id")]
    pub review_id: String,
    pub book_id: String,
    /// `None` when the author account no longer exists
    pub user_id: Option<ReviewAuthor>,
    pub rating: u8,
    pub comment: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ReviewWithAuthor {
    pub fn new(review: Review, author: Option<&User>) -> Self {
        Self {
            review_id: review.review_id,
            book_id: review.book_id,
            user_id: author.map(|u| ReviewAuthor {
                user_id: u.user_id.clone(),
                first_name: u.first_name.clone(),
                email: u.email.clone(),
            }),
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReviewRequest {
    pub book_id: Option<String>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

// ========== READING HISTORY ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ReadingStatus {
    #[serde(rename = "à-lire")]
    ToRead,
    #[serde(rename = "en-cours")]
    Reading,
    #[serde(rename = "lu")]
    Read,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToRead => "à-lire",
            Self::Reading => "en-cours",
            Self::Read => "lu",
        }
    }
}

impl FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "à-lire" => Ok(Self::ToRead),
            "en-cours" => Ok(Self::Reading),
            "lu" => Ok(Self::Read),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingHistoryEntry {
    #[serde(rename = "_id")]
    pub entry_id: String,
    pub user_id: String,
    pub book_id: String,
    pub status: ReadingStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub rating: Option<u8>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertHistoryRequest {
    pub book_id: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub rating: Option<i64>,
}

// ========== AUDIT ==========
/// Append-only record of a sensitive mutation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    pub entry_id: String,
    pub actor: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub meta: serde_json::Value,
    pub created_at: String,
}
