//! The fixed-schema contact record extracted from a business card.

use serde::{Deserialize, Serialize};

/// Structured contents of one business card.
///
/// Scalar fields are `None` when the card did not show them; phone numbers and
/// e-mail addresses are ordered lists that are empty when absent. Field order
/// here is the order used by every exporter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactRecord {
    pub name: Option<String>,
    /// Phonetic reading of the name (furigana).
    pub name_kana: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub phone: Vec<String>,
    pub mobile: Option<String>,
    pub fax: Option<String>,
    pub email: Vec<String>,
    pub website: Option<String>,
    /// Postal address including the postcode.
    pub address: Option<String>,
}

/// One field of [`ContactRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactField {
    Name,
    NameKana,
    Company,
    Department,
    Title,
    Phone,
    Mobile,
    Fax,
    Email,
    Website,
    Address,
}

/// Schema order shared by the prompt, the CSV columns and the JSON output.
pub const FIELD_ORDER: [ContactField; 11] = [
    ContactField::Name,
    ContactField::NameKana,
    ContactField::Company,
    ContactField::Department,
    ContactField::Title,
    ContactField::Phone,
    ContactField::Mobile,
    ContactField::Fax,
    ContactField::Email,
    ContactField::Website,
    ContactField::Address,
];

impl ContactField {
    /// JSON key.
    pub fn key(self) -> &'static str {
        match self {
            ContactField::Name => "name",
            ContactField::NameKana => "name_kana",
            ContactField::Company => "company",
            ContactField::Department => "department",
            ContactField::Title => "title",
            ContactField::Phone => "phone",
            ContactField::Mobile => "mobile",
            ContactField::Fax => "fax",
            ContactField::Email => "email",
            ContactField::Website => "website",
            ContactField::Address => "address",
        }
    }

    /// Localized column / form label.
    pub fn label(self) -> &'static str {
        match self {
            ContactField::Name => "氏名",
            ContactField::NameKana => "氏名（フリガナ）",
            ContactField::Company => "会社名",
            ContactField::Department => "部署",
            ContactField::Title => "役職",
            ContactField::Phone => "電話番号",
            ContactField::Mobile => "携帯電話",
            ContactField::Fax => "FAX",
            ContactField::Email => "メール",
            ContactField::Website => "Webサイト",
            ContactField::Address => "住所",
        }
    }

    /// Phone and e-mail hold several values.
    pub fn is_list(self) -> bool {
        matches!(self, ContactField::Phone | ContactField::Email)
    }
}

/// Borrowed view of a single field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    List(&'a [String]),
}

impl ContactRecord {
    pub fn get(&self, field: ContactField) -> FieldValue<'_> {
        match field {
            ContactField::Name => FieldValue::Text(self.name.as_deref()),
            ContactField::NameKana => FieldValue::Text(self.name_kana.as_deref()),
            ContactField::Company => FieldValue::Text(self.company.as_deref()),
            ContactField::Department => FieldValue::Text(self.department.as_deref()),
            ContactField::Title => FieldValue::Text(self.title.as_deref()),
            ContactField::Phone => FieldValue::List(&self.phone),
            ContactField::Mobile => FieldValue::Text(self.mobile.as_deref()),
            ContactField::Fax => FieldValue::Text(self.fax.as_deref()),
            ContactField::Email => FieldValue::List(&self.email),
            ContactField::Website => FieldValue::Text(self.website.as_deref()),
            ContactField::Address => FieldValue::Text(self.address.as_deref()),
        }
    }

    pub(crate) fn text_slot(&mut self, field: ContactField) -> Option<&mut Option<String>> {
        match field {
            ContactField::Name => Some(&mut self.name),
            ContactField::NameKana => Some(&mut self.name_kana),
            ContactField::Company => Some(&mut self.company),
            ContactField::Department => Some(&mut self.department),
            ContactField::Title => Some(&mut self.title),
            ContactField::Mobile => Some(&mut self.mobile),
            ContactField::Fax => Some(&mut self.fax),
            ContactField::Website => Some(&mut self.website),
            ContactField::Address => Some(&mut self.address),
            ContactField::Phone | ContactField::Email => None,
        }
    }

    pub(crate) fn list_slot(&mut self, field: ContactField) -> Option<&mut Vec<String>> {
        match field {
            ContactField::Phone => Some(&mut self.phone),
            ContactField::Email => Some(&mut self.email),
            _ => None,
        }
    }

    /// Single-line rendering of a field: lists joined with ", ", absent as "".
    pub fn display_value(&self, field: ContactField) -> String {
        match self.get(field) {
            FieldValue::Text(v) => v.unwrap_or_default().to_string(),
            FieldValue::List(items) => items
                .iter()
                .filter(|s| !s.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Overwrite a field from user-edited text.
    ///
    /// List fields split on commas; blank input clears the field.
    pub fn set_from_text(&mut self, field: ContactField, text: &str) {
        if let Some(list) = self.list_slot(field) {
            *list = Self::split_list(text);
        } else if let Some(slot) = self.text_slot(field) {
            let trimmed = text.trim();
            *slot = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
    }

    /// Split a comma-separated edit back into list items.
    pub fn split_list(text: &str) -> Vec<String> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_serializes_nulls_and_empty_lists_in_order() {
        let json = serde_json::to_string(&ContactRecord::default()).unwrap();
        assert_eq!(
            json,
            r#"{"name":null,"name_kana":null,"company":null,"department":null,"title":null,"phone":[],"mobile":null,"fax":null,"email":[],"website":null,"address":null}"#
        );
    }

    #[test]
    fn field_order_matches_struct_order() {
        let json = serde_json::to_string(&ContactRecord::default()).unwrap();
        let positions: Vec<usize> = FIELD_ORDER
            .iter()
            .map(|f| json.find(&format!("\"{}\":", f.key())).expect("key present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }

    #[test]
    fn display_value_joins_lists() {
        let r = ContactRecord {
            phone: vec!["03-1111-2222".into(), String::new(), "03-3333-4444".into()],
            title: Some("部長".into()),
            ..Default::default()
        };
        assert_eq!(r.display_value(ContactField::Phone), "03-1111-2222, 03-3333-4444");
        assert_eq!(r.display_value(ContactField::Title), "部長");
        assert_eq!(r.display_value(ContactField::Fax), "");
    }

    #[test]
    fn edit_round_trip() {
        let mut r = ContactRecord::default();
        r.set_from_text(ContactField::Email, " a@example.com ,, b@example.com ");
        r.set_from_text(ContactField::Company, "  Acme  ");
        r.set_from_text(ContactField::Website, "   ");
        assert_eq!(r.email, vec!["a@example.com", "b@example.com"]);
        assert_eq!(r.company.as_deref(), Some("Acme"));
        assert_eq!(r.website, None);
    }

    #[test]
    fn only_phone_and_email_are_lists() {
        let lists: Vec<_> = FIELD_ORDER.iter().filter(|f| f.is_list()).collect();
        assert_eq!(lists, vec![&ContactField::Phone, &ContactField::Email]);
    }
}
