//! Contact, the mutable aggregate that reviewed suggestions are merged into.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::field::{ContactField, FieldPath, PersonalField, ProfessionalField};

// ─── Context records ─────────────────────────────────────────────────────────

/// Work-related context. Set-valued sub-fields keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfessionalContext {
  pub goals:         Vec<String>,
  pub skills:        Vec<String>,
  pub projects:      Vec<String>,
  pub expertise:     Vec<String>,
  pub current_focus: Option<String>,
  pub industry:      Option<String>,
  pub seniority:     Option<String>,
}

/// Personal context. Set-valued sub-fields keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalContext {
  pub interests:           Vec<String>,
  pub hobbies:             Vec<String>,
  pub family:              Vec<String>,
  pub values:              Vec<String>,
  pub birthday:            Option<String>,
  pub hometown:            Option<String>,
  pub relationship_status: Option<String>,
}

// ─── Contact ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id:           Uuid,
  pub user_id:              Uuid,
  pub name:                 String,
  pub company:              Option<String>,
  pub title:                Option<String>,
  pub location:             Option<String>,
  pub email:                Option<String>,
  pub phone:                Option<String>,
  pub linkedin_url:         Option<String>,
  pub notes:                Option<String>,
  pub professional_context: ProfessionalContext,
  pub personal_context:     PersonalContext,
  /// Field path → the artifact that most recently supplied or altered it.
  pub field_sources:        BTreeMap<FieldPath, Uuid>,
  /// Incremented by the store on every write; used for compare-and-swap.
  pub revision:             i64,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

/// Mutable access to the storage behind one [`FieldPath`].
pub enum FieldSlot<'a> {
  /// The contact's name, which can be replaced but never cleared.
  Required(&'a mut String),
  Scalar(&'a mut Option<String>),
  OrderedSet(&'a mut Vec<String>),
}

impl Contact {
  /// Resolve a path to its storage. Total over the field registry.
  pub fn slot_mut(&mut self, path: FieldPath) -> FieldSlot<'_> {
    use FieldSlot::{OrderedSet, Required, Scalar};

    match path {
      FieldPath::Top(field) => match field {
        ContactField::Name => Required(&mut self.name),
        ContactField::Company => Scalar(&mut self.company),
        ContactField::Title => Scalar(&mut self.title),
        ContactField::Location => Scalar(&mut self.location),
        ContactField::Email => Scalar(&mut self.email),
        ContactField::Phone => Scalar(&mut self.phone),
        ContactField::LinkedinUrl => Scalar(&mut self.linkedin_url),
        ContactField::Notes => Scalar(&mut self.notes),
      },
      FieldPath::Professional(field) => {
        let ctx = &mut self.professional_context;
        match field {
          ProfessionalField::Goals => OrderedSet(&mut ctx.goals),
          ProfessionalField::Skills => OrderedSet(&mut ctx.skills),
          ProfessionalField::Projects => OrderedSet(&mut ctx.projects),
          ProfessionalField::Expertise => OrderedSet(&mut ctx.expertise),
          ProfessionalField::CurrentFocus => Scalar(&mut ctx.current_focus),
          ProfessionalField::Industry => Scalar(&mut ctx.industry),
          ProfessionalField::Seniority => Scalar(&mut ctx.seniority),
        }
      }
      FieldPath::Personal(field) => {
        let ctx = &mut self.personal_context;
        match field {
          PersonalField::Interests => OrderedSet(&mut ctx.interests),
          PersonalField::Hobbies => OrderedSet(&mut ctx.hobbies),
          PersonalField::Family => OrderedSet(&mut ctx.family),
          PersonalField::Values => OrderedSet(&mut ctx.values),
          PersonalField::Birthday => Scalar(&mut ctx.birthday),
          PersonalField::Hometown => Scalar(&mut ctx.hometown),
          PersonalField::RelationshipStatus => {
            Scalar(&mut ctx.relationship_status)
          }
        }
      }
    }
  }

  /// The artifact credited with the current value of `path`, if any.
  pub fn source_of(&self, path: FieldPath) -> Option<Uuid> {
    self.field_sources.get(&path).copied()
  }
}

// ─── NewContact ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactStore::add_contact`].
#[derive(Debug, Clone)]
pub struct NewContact {
  pub user_id:      Uuid,
  pub name:         String,
  pub company:      Option<String>,
  pub title:        Option<String>,
  pub location:     Option<String>,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub linkedin_url: Option<String>,
  pub notes:        Option<String>,
}

impl NewContact {
  pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
    Self {
      user_id,
      name: name.into(),
      company: None,
      title: None,
      location: None,
      email: None,
      phone: None,
      linkedin_url: None,
      notes: None,
    }
  }

  pub fn into_contact(self, now: DateTime<Utc>) -> Contact {
    Contact {
      contact_id:           Uuid::new_v4(),
      user_id:              self.user_id,
      name:                 self.name,
      company:              self.company,
      title:                self.title,
      location:             self.location,
      email:                self.email,
      phone:                self.phone,
      linkedin_url:         self.linkedin_url,
      notes:                self.notes,
      professional_context: ProfessionalContext::default(),
      personal_context:     PersonalContext::default(),
      field_sources:        BTreeMap::new(),
      revision:             0,
      created_at:           now,
      updated_at:           now,
    }
  }
}
