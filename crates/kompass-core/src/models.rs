//! Core data models for kompass.
//!
//! These types are shared across all kompass crates and represent
//! the core domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ENUMERATIONS
// =============================================================================

/// Kind of page in the content tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    /// Container page whose children are other pages.
    Section,
    /// Leaf page holding blocks.
    Content,
    /// Leaf page backed by a single file attachment.
    File,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Content => "content",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PageType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "section" => Ok(Self::Section),
            "content" => Ok(Self::Content),
            "file" => Ok(Self::File),
            _ => Err(format!("Invalid page type: {}", s)),
        }
    }
}

/// Publication status of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Hidden,
    #[default]
    Visible,
    Deleted,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Visible => "visible",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PageStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hidden" => Ok(Self::Hidden),
            "visible" => Ok(Self::Visible),
            "deleted" => Ok(Self::Deleted),
            _ => Err(format!("Invalid page status: {}", s)),
        }
    }
}

/// Presentation style of a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    #[default]
    Default,
    Accordion,
    Link,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Accordion => "accordion",
            Self::Link => "link",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "accordion" => Ok(Self::Accordion),
            "link" => Ok(Self::Link),
            _ => Err(format!("Invalid block type: {}", s)),
        }
    }
}

/// Subscription tier. Controls which template pages are default content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Conference,
    School,
    Pro,
}

impl Plan {
    /// Every recognized plan.
    pub const ALL: [Plan; 4] = [Plan::Basic, Plan::Conference, Plan::School, Plan::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Conference => "conference",
            Self::School => "school",
            Self::Pro => "pro",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "conference" => Ok(Self::Conference),
            "school" => Ok(Self::School),
            "pro" => Ok(Self::Pro),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// Template category. Each theme has exactly one root page in the template
/// forest and one in every organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Precautions,
    DealWith,
    ERestore,
    EAvoid,
    EGfs,
    ESchool,
}

impl Theme {
    /// Every theme, in root-page sort order.
    pub const ALL: [Theme; 6] = [
        Theme::Precautions,
        Theme::DealWith,
        Theme::ERestore,
        Theme::EAvoid,
        Theme::EGfs,
        Theme::ESchool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Precautions => "precautions",
            Self::DealWith => "deal_with",
            Self::ERestore => "e_restore",
            Self::EAvoid => "e_avoid",
            Self::EGfs => "e_gfs",
            Self::ESchool => "e_school",
        }
    }

    /// Title given to an organization's root page for this theme.
    pub fn root_title(&self) -> &'static str {
        match self {
            Self::Precautions => "Vorsorgen",
            Self::DealWith => "Bewältigen",
            Self::ERestore => "Wiederherstellen",
            Self::EAvoid => "Vermeiden",
            Self::EGfs => "GFS",
            Self::ESchool => "Schulen",
        }
    }

    /// Sort position of the root page (1-based).
    pub fn root_sort(&self) -> i32 {
        Self::ALL
            .iter()
            .position(|t| t == self)
            .map(|i| i as i32 + 1)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "precautions" => Ok(Self::Precautions),
            "deal_with" => Ok(Self::DealWith),
            "e_restore" => Ok(Self::ERestore),
            "e_avoid" => Ok(Self::EAvoid),
            "e_gfs" => Ok(Self::EGfs),
            "e_school" => Ok(Self::ESchool),
            _ => Err(format!("Invalid theme: {}", s)),
        }
    }
}

/// Billing status of an organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    Paid,
    #[default]
    NotPaid,
    Blocked,
}

impl OrganizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::NotPaid => "not_paid",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for OrganizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrganizationStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paid" => Ok(Self::Paid),
            "not_paid" => Ok(Self::NotPaid),
            "blocked" => Ok(Self::Blocked),
            _ => Err(format!("Invalid organization status: {}", s)),
        }
    }
}

/// Role a user holds within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationRole {
    Owner,
    Admin,
    Editor,
    User,
}

impl OrganizationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CONTENT TYPES
// =============================================================================

/// A node of a page tree. Pages without an organization are templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub organization_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub language_tag: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub theme: Theme,
    pub status: PageStatus,
    pub title: String,
    pub image: Option<String>,
    pub image_hover: Option<String>,
    pub sort: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Admin-authored template page (no owning organization).
    pub fn is_template(&self) -> bool {
        self.organization_id.is_none()
    }

    /// Root of a theme tree.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A content block on a `content` page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: i64,
    pub page_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub readmore: Option<String>,
    pub image: Option<String>,
    pub image_hover: Option<String>,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub sort: i32,
}

/// File stored behind a `file` page. Shares its id with the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: i64,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// Membership of a template page in a plan's default content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefaultPage {
    pub page_id: i64,
    pub plan: Plan,
}

// =============================================================================
// ORGANIZATION TYPES
// =============================================================================

/// A tenant owning its own page tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub city: String,
    pub population: i32,
    pub address: String,
    pub invoice_address: String,
    pub plan: Plan,
    pub status: OrganizationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating a new organization.
#[derive(Debug, Clone)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub image: Option<String>,
    pub city: String,
    pub population: i32,
    pub address: String,
    pub invoice_address: String,
    pub plan: Plan,
    /// User that becomes the organization's owner.
    pub owner_user_id: i64,
}

// =============================================================================
// AUTHORING REQUESTS
// =============================================================================

/// Request for creating a page. The page is appended after its last sibling.
#[derive(Debug, Clone)]
pub struct CreatePageRequest {
    pub organization_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub language_tag: String,
    pub page_type: PageType,
    pub theme: Theme,
    pub status: PageStatus,
    pub title: String,
    pub image: Option<String>,
    pub image_hover: Option<String>,
}

/// Request for creating a block. The block is appended after the page's last block.
#[derive(Debug, Clone)]
pub struct CreateBlockRequest {
    pub page_id: i64,
    pub title: String,
    pub block_type: BlockType,
    pub content: Option<String>,
    pub readmore: Option<String>,
    pub image: Option<String>,
    pub image_hover: Option<String>,
}
