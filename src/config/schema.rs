//! Shape descriptions for configuration sections.
//!
//! Each provider section declares its fields here so the validator can
//! report every missing, unknown or mistyped field in one pass before the
//! section is deserialized.

/// The value type a field must have.
#[derive(Clone, Copy)]
pub enum FieldKind {
    /// A string.
    Text,
    /// A non-negative integer.
    Count,
    /// A boolean.
    Flag,
    /// A list of strings.
    TextList,
    /// A string restricted to a closed set.
    Choice {
        /// Returns true if the value is accepted.
        accepts: fn(&str) -> bool,
        /// Values listed in the error message.
        expected: &'static [&'static str],
    },
    /// A nested mapping, checked when the section is deserialized.
    Table,
}

/// A single field of a configuration section.
#[derive(Clone, Copy)]
pub struct FieldSpec {
    /// Key in the document.
    pub name: &'static str,
    /// Expected value type.
    pub kind: FieldKind,
    /// Whether the key must be present.
    pub required: bool,
}

impl FieldSpec {
    /// A field that must be present.
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// A field that may be omitted.
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Implemented by every provider section and credential type.
pub trait Schema {
    /// Human-readable variant name used in messages.
    const VARIANT: &'static str;
    /// Every accepted field.
    const FIELDS: &'static [FieldSpec];
    /// Keys that identify this variant when the document is ambiguous.
    const MARKERS: &'static [&'static str];
    /// Alternate spellings accepted for a field, as `(alias, field)`.
    const ALIASES: &'static [(&'static str, &'static str)] = &[];
}
