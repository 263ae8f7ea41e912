//! Role model and invite-code codec.
//!
//! Roles form a total order (`Employee < Manager < BusinessOwner < OrganizationAdmin <
//! SuperAdmin`); every permission check in the crate goes through [`Role::has_role`].
//!
//! Structured invite codes look like `ACME2024-MGR-7QX`: a four-letter organization
//! prefix, the year the code was minted, a three-letter role code and a three-character
//! random suffix. Decoding never fails loudly: anything that does not match the format
//! is simply "not a structured code".

use crate::entities::Role;
use chrono::{Datelike, Utc};
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 3;
const PREFIX_LEN: usize = 4;

static INVITE_CODE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{4})(\d{4})-([A-Z]{3})-([A-Z0-9]{3})$").ok());

impl Role {
    /// Numeric rank, 1 (employee) through 5 (super admin).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Employee => 1,
            Self::Manager => 2,
            Self::BusinessOwner => 3,
            Self::OrganizationAdmin => 4,
            Self::SuperAdmin => 5,
        }
    }

    /// True when `self` is at least as privileged as `required`.
    #[must_use]
    pub const fn has_role(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }

    /// Users and invite codes can be administered from `OrganizationAdmin` up.
    #[must_use]
    pub const fn can_manage_users(self) -> bool {
        self.has_role(Self::OrganizationAdmin)
    }

    /// Import/export is available from `Manager` up.
    #[must_use]
    pub const fn can_access_import_export(self) -> bool {
        self.has_role(Self::Manager)
    }

    /// Businesses and locations can be managed from `BusinessOwner` up.
    #[must_use]
    pub const fn can_manage_businesses(self) -> bool {
        self.has_role(Self::BusinessOwner)
    }

    /// Three-letter code embedded in structured invite codes.
    #[must_use]
    pub const fn invite_code(self) -> &'static str {
        match self {
            Self::Employee => "EMP",
            Self::Manager => "MGR",
            Self::BusinessOwner => "OWN",
            Self::OrganizationAdmin => "ADM",
            Self::SuperAdmin => "SUP",
        }
    }

    /// Inverse of [`Role::invite_code`].
    #[must_use]
    pub fn from_invite_code(code: &str) -> Option<Self> {
        match code {
            "EMP" => Some(Self::Employee),
            "MGR" => Some(Self::Manager),
            "OWN" => Some(Self::BusinessOwner),
            "ADM" => Some(Self::OrganizationAdmin),
            "SUP" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

/// Roles that get a default invite code when an organization is created.
pub const DEFAULT_INVITE_ROLES: [Role; 4] = [
    Role::Employee,
    Role::Manager,
    Role::BusinessOwner,
    Role::OrganizationAdmin,
];

/// The pieces of a structured invite code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInviteCode {
    /// Four-letter organization prefix
    pub organization_prefix: String,
    /// Year the code was minted
    pub year: i32,
    /// Role the code grants
    pub role: Role,
    /// Random suffix
    pub suffix: String,
}

/// Four upper-case letters derived from the organization name, padded with `X`.
#[must_use]
pub fn organization_prefix(organization_name: &str) -> String {
    let mut prefix: String = organization_name
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .take(PREFIX_LEN)
        .collect();
    while prefix.len() < PREFIX_LEN {
        prefix.push('X');
    }
    prefix
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())]))
        .collect()
}

/// Builds a structured invite code for `role` in the named organization, stamped with the
/// current year and a fresh random suffix.
#[must_use]
pub fn generate_invite_code(organization_name: &str, role: Role) -> String {
    format!(
        "{}{}-{}-{}",
        organization_prefix(organization_name),
        Utc::now().year(),
        role.invite_code(),
        random_suffix()
    )
}

/// Decodes a structured invite code, or returns `None` for anything malformed.
#[must_use]
pub fn parse_invite_code(code: &str) -> Option<ParsedInviteCode> {
    let pattern = INVITE_CODE_PATTERN.as_ref()?;
    let captures = pattern.captures(code.trim())?;
    Some(ParsedInviteCode {
        organization_prefix: captures.get(1)?.as_str().to_string(),
        year: captures.get(2)?.as_str().parse().ok()?,
        role: Role::from_invite_code(captures.get(3)?.as_str())?,
        suffix: captures.get(4)?.as_str().to_string(),
    })
}

/// Role encoded in a structured invite code, if it is one.
#[must_use]
pub fn get_role_from_invite_code(code: &str) -> Option<Role> {
    parse_invite_code(code).map(|parsed| parsed.role)
}
