//! The field registry: the closed set of contact fields a suggestion may
//! address.
//!
//! On the wire a field is a dotted path (`title`,
//! `professional_context.goals`). Internally it is a [`FieldPath`], so the
//! merge rules can match exhaustively on it instead of inspecting strings.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator as _};

use crate::Error;

/// Wire prefix of the professional context object.
pub const PROFESSIONAL_CONTEXT: &str = "professional_context";
/// Wire prefix of the personal context object.
pub const PERSONAL_CONTEXT: &str = "personal_context";

// ─── Field kinds ─────────────────────────────────────────────────────────────

/// How a field merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  /// A single optional value.
  Scalar,
  /// A set of strings kept in insertion order.
  OrderedSet,
}

// ─── Top-level fields ────────────────────────────────────────────────────────

/// Scalar fields stored directly on the contact.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum ContactField {
  Name,
  Company,
  Title,
  Location,
  Email,
  Phone,
  LinkedinUrl,
  Notes,
}

// ─── Context sub-fields ──────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum ProfessionalField {
  Goals,
  Skills,
  Projects,
  Expertise,
  CurrentFocus,
  Industry,
  Seniority,
}

impl ProfessionalField {
  pub fn kind(self) -> FieldKind {
    match self {
      Self::Goals | Self::Skills | Self::Projects | Self::Expertise => {
        FieldKind::OrderedSet
      }
      Self::CurrentFocus | Self::Industry | Self::Seniority => FieldKind::Scalar,
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum PersonalField {
  Interests,
  Hobbies,
  Family,
  Values,
  Birthday,
  Hometown,
  RelationshipStatus,
}

impl PersonalField {
  pub fn kind(self) -> FieldKind {
    match self {
      Self::Interests | Self::Hobbies | Self::Family | Self::Values => {
        FieldKind::OrderedSet
      }
      Self::Birthday | Self::Hometown | Self::RelationshipStatus => FieldKind::Scalar,
    }
  }
}

// ─── FieldPath ───────────────────────────────────────────────────────────────

/// A structured address of one contact field.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum FieldPath {
  Top(ContactField),
  Professional(ProfessionalField),
  Personal(PersonalField),
}

impl FieldPath {
  pub fn kind(self) -> FieldKind {
    match self {
      Self::Top(_) => FieldKind::Scalar,
      Self::Professional(f) => f.kind(),
      Self::Personal(f) => f.kind(),
    }
  }

  /// Every path in the registry, in declaration order.
  pub fn all() -> impl Iterator<Item = FieldPath> {
    ContactField::iter()
      .map(Self::Top)
      .chain(ProfessionalField::iter().map(Self::Professional))
      .chain(PersonalField::iter().map(Self::Personal))
  }
}

impl fmt::Display for FieldPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Top(field) => f.write_str(field.as_ref()),
      Self::Professional(field) => {
        write!(f, "{PROFESSIONAL_CONTEXT}.{}", field.as_ref())
      }
      Self::Personal(field) => write!(f, "{PERSONAL_CONTEXT}.{}", field.as_ref()),
    }
  }
}

impl FromStr for FieldPath {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let unknown = || Error::UnknownFieldPath(s.to_owned());
    match s.split_once('.') {
      None => ContactField::from_str(s).map(Self::Top).map_err(|_| unknown()),
      Some((PROFESSIONAL_CONTEXT, sub)) => ProfessionalField::from_str(sub)
        .map(Self::Professional)
        .map_err(|_| unknown()),
      Some((PERSONAL_CONTEXT, sub)) => PersonalField::from_str(sub)
        .map(Self::Personal)
        .map_err(|_| unknown()),
      Some(_) => Err(unknown()),
    }
  }
}

impl TryFrom<String> for FieldPath {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<FieldPath> for String {
  fn from(path: FieldPath) -> Self { path.to_string() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_registered_path_survives_its_wire_form() {
    for path in FieldPath::all() {
      let wire = path.to_string();
      assert_eq!(wire.parse::<FieldPath>().unwrap(), path, "{wire}");
    }
  }

  #[test]
  fn context_paths_use_dotted_prefix() {
    let path: FieldPath = "professional_context.goals".parse().unwrap();
    assert_eq!(path, FieldPath::Professional(ProfessionalField::Goals));
    assert_eq!(path.kind(), FieldKind::OrderedSet);

    let path: FieldPath = "personal_context.hometown".parse().unwrap();
    assert_eq!(path.kind(), FieldKind::Scalar);

    let path: FieldPath = "linkedin_url".parse().unwrap();
    assert_eq!(path, FieldPath::Top(ContactField::LinkedinUrl));
  }

  #[test]
  fn unknown_paths_are_rejected() {
    for bad in [
      "",
      "nickname",
      "professional_context",
      "professional_context.",
      "professional_context.hobbies",
      "work_context.goals",
      "title.extra",
    ] {
      assert!(
        matches!(bad.parse::<FieldPath>(), Err(Error::UnknownFieldPath(_))),
        "{bad:?} should not parse"
      );
    }
  }

  #[test]
  fn serde_uses_the_dotted_string() {
    let path = FieldPath::Personal(PersonalField::Interests);
    let json = serde_json::to_string(&path).unwrap();
    assert_eq!(json, "\"personal_context.interests\"");
    let back: FieldPath = serde_json::from_str(&json).unwrap();
    assert_eq!(back, path);
    assert!(serde_json::from_str::<FieldPath>("\"bogus\"").is_err());
  }
}
