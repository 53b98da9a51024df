//! Registry of the tables in schema `app` and their DDL
//!
//! Every table owns exactly one file under `migrations/`, numbered in
//! creation order. The shared schema and trigger function are version 1.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, DatabaseResult};

/// Schema every managed table lives in
pub const SCHEMA: &str = "app";

/// A table in schema `app`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppTable {
    Courses,
    Users,
    UserProfiles,
    Roles,
    UserRoles,
    UserCourses,
    Sessions,
    Accounts,
    AnonymousUserActivity,
    DemoRequests,
    SolaraInterestModal,
    SsaInterestModal,
    CourseWaitlistLeads,
    SolaraWaitlistLeads,
    SsaInquiries,
    CaseStudyRequests,
    PartnerInquiries,
}

impl AppTable {
    /// All tables in creation order: referenced tables come first
    pub const ALL: [Self; 17] = [
        Self::Courses,
        Self::Users,
        Self::UserProfiles,
        Self::Roles,
        Self::UserRoles,
        Self::UserCourses,
        Self::Sessions,
        Self::Accounts,
        Self::AnonymousUserActivity,
        Self::DemoRequests,
        Self::SolaraInterestModal,
        Self::SsaInterestModal,
        Self::CourseWaitlistLeads,
        Self::SolaraWaitlistLeads,
        Self::SsaInquiries,
        Self::CaseStudyRequests,
        Self::PartnerInquiries,
    ];

    /// Tables holding marketing leads captured by the site's forms
    pub const LEADS: [Self; 8] = [
        Self::DemoRequests,
        Self::SolaraInterestModal,
        Self::SsaInterestModal,
        Self::CourseWaitlistLeads,
        Self::SolaraWaitlistLeads,
        Self::SsaInquiries,
        Self::CaseStudyRequests,
        Self::PartnerInquiries,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Users => "users",
            Self::UserProfiles => "user_profiles",
            Self::Roles => "roles",
            Self::UserRoles => "user_roles",
            Self::UserCourses => "user_courses",
            Self::Sessions => "sessions",
            Self::Accounts => "accounts",
            Self::AnonymousUserActivity => "anonymous_user_activity",
            Self::DemoRequests => "demo_requests",
            Self::SolaraInterestModal => "solara_interest_modal",
            Self::SsaInterestModal => "ssa_interest_modal",
            Self::CourseWaitlistLeads => "course_waitlist_leads",
            Self::SolaraWaitlistLeads => "solara_waitlist_leads",
            Self::SsaInquiries => "ssa_inquiries",
            Self::CaseStudyRequests => "case_study_requests",
            Self::PartnerInquiries => "partner_inquiries",
        }
    }

    /// Schema-qualified name, safe to interpolate into SQL
    pub fn qualified(self) -> String {
        format!("{SCHEMA}.{}", self.as_str())
    }

    const fn ddl(self) -> &'static str {
        match self {
            Self::Courses => include_str!("../migrations/0002_courses.sql"),
            Self::Users => include_str!("../migrations/0003_users.sql"),
            Self::UserProfiles => include_str!("../migrations/0004_user_profiles.sql"),
            Self::Roles => include_str!("../migrations/0005_roles.sql"),
            Self::UserRoles => include_str!("../migrations/0006_user_roles.sql"),
            Self::UserCourses => include_str!("../migrations/0007_user_courses.sql"),
            Self::Sessions => include_str!("../migrations/0008_sessions.sql"),
            Self::Accounts => include_str!("../migrations/0009_accounts.sql"),
            Self::AnonymousUserActivity => include_str!("../migrations/0010_anonymous_user_activity.sql"),
            Self::DemoRequests => include_str!("../migrations/0011_demo_requests.sql"),
            Self::SolaraInterestModal => include_str!("../migrations/0012_solara_interest_modal.sql"),
            Self::SsaInterestModal => include_str!("../migrations/0013_ssa_interest_modal.sql"),
            Self::CourseWaitlistLeads => include_str!("../migrations/0014_course_waitlist_leads.sql"),
            Self::SolaraWaitlistLeads => include_str!("../migrations/0015_solara_waitlist_leads.sql"),
            Self::SsaInquiries => include_str!("../migrations/0016_ssa_inquiries.sql"),
            Self::CaseStudyRequests => include_str!("../migrations/0017_case_study_requests.sql"),
            Self::PartnerInquiries => include_str!("../migrations/0018_partner_inquiries.sql"),
        }
    }

    /// The table's provisioning definition
    pub fn definition(self) -> SchemaDefinition {
        SchemaDefinition {
            name: Cow::Borrowed(self.as_str()),
            sql: Cow::Borrowed(self.ddl()),
            target: Some(self),
        }
    }
}

impl fmt::Display for AppTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("app.").unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|table| table.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("unknown table '{s}'"))
    }
}

/// A named block of DDL to apply idempotently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub name: Cow<'static, str>,
    pub sql: Cow<'static, str>,
    /// Table this definition creates, when it belongs to the registry
    pub target: Option<AppTable>,
}

impl SchemaDefinition {
    /// Schema `app` and the shared `set_updated_at()` trigger function
    pub const fn base() -> Self {
        Self {
            name: Cow::Borrowed("base"),
            sql: Cow::Borrowed(include_str!("../migrations/0001_base.sql")),
            target: None,
        }
    }

    /// Base definition followed by every table, in creation order
    pub fn all() -> Vec<Self> {
        std::iter::once(Self::base())
            .chain(AppTable::ALL.into_iter().map(AppTable::definition))
            .collect()
    }

    /// Load an ad-hoc definition from a `.sql` file, named after its stem
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, or `InvalidDefinition` if it is empty
    pub fn from_file(path: &Path) -> DatabaseResult<Self> {
        let sql = std::fs::read_to_string(path).map_err(|source| DatabaseError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("definition")
            .to_string();

        if sql.trim().is_empty() {
            return Err(DatabaseError::InvalidDefinition {
                name,
                message: "file is empty".to_string(),
            });
        }

        let target = name.parse::<AppTable>().ok();
        Ok(Self {
            name: Cow::Owned(name),
            sql: Cow::Owned(sql),
            target,
        })
    }
}
