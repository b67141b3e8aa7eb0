use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Idle,
    AwaitingDealType,
    AwaitingLanguage,
    AwaitingMetadata,
    CollectingPhotos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    Sale,
    Rent,
    Presentation,
}

impl DealType {
    pub const ALL: [DealType; 3] = [DealType::Sale, DealType::Rent, DealType::Presentation];

    pub fn code(self) -> &'static str {
        match self {
            DealType::Sale => "sale",
            DealType::Rent => "rent",
            DealType::Presentation => "presentation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DealType::Sale => "Продажа",
            DealType::Rent => "Аренда",
            DealType::Presentation => "Презентация",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        DealType::ALL
            .into_iter()
            .find(|deal| deal.code() == code.trim())
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            DealType::Sale => &["продажа", "sale", "sell", "prodaja"],
            DealType::Rent => &["аренда", "сдача", "rent", "rental", "izdavanje", "najam"],
            DealType::Presentation => &["презентация", "presentation", "prezentacija"],
        }
    }

    /// Whole-message match, used by the plain-text recognizer.
    pub fn from_exact_keyword(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase();
        DealType::ALL
            .into_iter()
            .find(|deal| deal.keywords().contains(&lowered.as_str()))
    }

    /// Loose match used for `/new <deal>` arguments.
    pub fn from_keyword(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        if let Some(deal) = DealType::from_exact_keyword(&lowered) {
            return Some(deal);
        }
        let stems = [
            ("продаж", DealType::Sale),
            ("аренд", DealType::Rent),
            ("презентац", DealType::Presentation),
        ];
        if let Some((_, deal)) = stems.iter().find(|(stem, _)| lowered.contains(stem)) {
            return Some(*deal);
        }
        DealType::ALL.into_iter().find(|deal| {
            deal.keywords()
                .iter()
                .any(|keyword| lowered.contains(keyword))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
    Sr,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Ru, Language::En, Language::Sr];

    pub fn code(self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::En => "en",
            Language::Sr => "sr",
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Language::Ru => "🇷🇺 Русский",
            Language::En => "🇬🇧 English",
            Language::Sr => "🇷🇸 Srpski",
        }
    }

    pub fn english_name(self) -> &'static str {
        match self {
            Language::Ru => "Russian",
            Language::En => "English",
            Language::Sr => "Serbian (Latin script)",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let lowered = code.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|language| language.code() == lowered)
    }
}

/// Listing attributes collected during the dialogue. Every text field is
/// left as an empty string until the metadata message fills it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingPayload {
    pub deal_type: Option<DealType>,
    pub language: Option<Language>,
    pub address: String,
    pub district: String,
    pub area: String,
    pub layout: String,
    pub floor: String,
    pub floor_count: String,
    pub ceiling_height: String,
    pub communications: String,
    pub extras: String,
    pub pets_policy: String,
    pub available_from: String,
    pub price: String,
    pub contact: String,
    pub raw_metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub file_id: String,
    pub unique_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    pub payload: ListingPayload,
    pub photos: Vec<PhotoRef>,
    pub generation: Option<u64>,
}

impl Session {
    pub fn is_busy(&self) -> bool {
        self.generation.is_some()
    }

    /// Appends the photo unless one with the same unique id is already
    /// stored. Returns whether it was added.
    pub fn add_photo(&mut self, photo: PhotoRef) -> bool {
        if self
            .photos
            .iter()
            .any(|existing| existing.unique_id == photo.unique_id)
        {
            return false;
        }
        self.photos.push(photo);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_with_lowercase_choices() {
        let payload = ListingPayload {
            deal_type: Some(DealType::Rent),
            language: Some(Language::Sr),
            price: "500 EUR".to_string(),
            ..ListingPayload::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["deal_type"], "rent");
        assert_eq!(value["language"], "sr");
        assert_eq!(value["price"], "500 EUR");
        assert_eq!(value["address"], "");
    }

    #[test]
    fn fresh_session_is_idle_and_empty() {
        let session = Session::default();
        assert_eq!(session.step, Step::Idle);
        assert_eq!(session.payload, ListingPayload::default());
        assert!(session.photos.is_empty());
        assert!(!session.is_busy());
    }

    #[test]
    fn duplicate_photos_are_ignored() {
        let mut session = Session::default();
        let photo = PhotoRef {
            file_id: "file-a".to_string(),
            unique_id: "uniq-a".to_string(),
        };
        assert!(session.add_photo(photo.clone()));
        assert!(!session.add_photo(PhotoRef {
            file_id: "file-a-resent".to_string(),
            ..photo
        }));
        assert_eq!(session.photos.len(), 1);
    }

    #[test]
    fn deal_keywords_cover_all_languages() {
        assert_eq!(DealType::from_keyword("Продажа"), Some(DealType::Sale));
        assert_eq!(DealType::from_keyword("rent"), Some(DealType::Rent));
        assert_eq!(
            DealType::from_keyword("Prezentacija"),
            Some(DealType::Presentation)
        );
        assert_eq!(DealType::from_keyword("на продажу"), Some(DealType::Sale));
        assert_eq!(DealType::from_keyword("сдача в аренду"), Some(DealType::Rent));
        assert_eq!(DealType::from_keyword("  "), None);
        assert_eq!(DealType::from_keyword("обмен"), None);
    }

    #[test]
    fn exact_keyword_requires_whole_message() {
        assert_eq!(DealType::from_exact_keyword(" Аренда "), Some(DealType::Rent));
        assert_eq!(DealType::from_exact_keyword("аренда на год"), None);
    }

    #[test]
    fn language_codes_are_case_insensitive() {
        assert_eq!(Language::from_code("EN"), Some(Language::En));
        assert_eq!(Language::from_code("de"), None);
    }
}
