//! Label-based extraction of listing attributes from one free-form message.
//!
//! Lines look like `Label: value`. Labels are matched case-insensitively
//! against a closed set of Russian, English and Serbian aliases; bullets,
//! emoji and emphasis markers around the label are ignored. Nothing here
//! fails: unknown or missing labels leave the field empty.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::flow::session::ListingPayload;

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<label>[^:：]{1,64}?)[:：](?P<value>.*)$").expect("valid line regex")
});
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid number regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Address,
    District,
    Area,
    Layout,
    Floor,
    FloorCount,
    CeilingHeight,
    Communications,
    Extras,
    PetsPolicy,
    AvailableFrom,
    Price,
    Contact,
}

impl MetadataField {
    pub const ALL: [MetadataField; 13] = [
        MetadataField::Address,
        MetadataField::District,
        MetadataField::Area,
        MetadataField::Layout,
        MetadataField::Floor,
        MetadataField::FloorCount,
        MetadataField::CeilingHeight,
        MetadataField::Communications,
        MetadataField::Extras,
        MetadataField::PetsPolicy,
        MetadataField::AvailableFrom,
        MetadataField::Price,
        MetadataField::Contact,
    ];

    fn aliases(self) -> &'static [&'static str] {
        match self {
            MetadataField::Address => &["address", "адрес", "adresa"],
            MetadataField::District => &["district", "neighborhood", "район", "микрорайон", "naselje", "kvart", "deo grada"],
            MetadataField::Area => &["area", "size", "площадь", "метраж", "površina", "povrsina", "kvadratura"],
            MetadataField::Layout => &["layout", "rooms", "планировка", "комнаты", "raspored", "struktura"],
            MetadataField::Floor => &["floor", "этаж", "sprat"],
            MetadataField::FloorCount => &["total floors", "floors", "этажность", "этажей", "всего этажей", "spratnost", "broj spratova"],
            MetadataField::CeilingHeight => &["ceiling height", "ceilings", "высота потолков", "потолки", "visina plafona"],
            MetadataField::Communications => &["communications", "utilities", "коммуникации", "komunalije", "instalacije"],
            MetadataField::Extras => &["location features", "features", "extras", "особенности", "особенности локации", "локация", "posebnosti", "lokacija"],
            MetadataField::PetsPolicy => &["pet policy", "pets", "животные", "питомцы", "kućni ljubimci", "ljubimci"],
            MetadataField::AvailableFrom => &["available from", "available", "доступно с", "свободна с", "дата заезда", "useljivo od", "dostupno od"],
            MetadataField::Price => &["price", "цена", "стоимость", "cena"],
            MetadataField::Contact => &["contact", "contacts", "контакт", "контакты", "телефон", "kontakt", "telefon"],
        }
    }

    /// Human label used when the payload is serialized for the model.
    pub fn title(self) -> &'static str {
        match self {
            MetadataField::Address => "Address",
            MetadataField::District => "District",
            MetadataField::Area => "Area (m²)",
            MetadataField::Layout => "Layout",
            MetadataField::Floor => "Floor",
            MetadataField::FloorCount => "Total floors",
            MetadataField::CeilingHeight => "Ceiling height",
            MetadataField::Communications => "Communications",
            MetadataField::Extras => "Location features",
            MetadataField::PetsPolicy => "Pet policy",
            MetadataField::AvailableFrom => "Available from",
            MetadataField::Price => "Price",
            MetadataField::Contact => "Contact",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return None;
        }
        MetadataField::ALL
            .into_iter()
            .find(|field| field.aliases().contains(&normalized.as_str()))
    }

    pub fn value(self, payload: &ListingPayload) -> &str {
        match self {
            MetadataField::Address => &payload.address,
            MetadataField::District => &payload.district,
            MetadataField::Area => &payload.area,
            MetadataField::Layout => &payload.layout,
            MetadataField::Floor => &payload.floor,
            MetadataField::FloorCount => &payload.floor_count,
            MetadataField::CeilingHeight => &payload.ceiling_height,
            MetadataField::Communications => &payload.communications,
            MetadataField::Extras => &payload.extras,
            MetadataField::PetsPolicy => &payload.pets_policy,
            MetadataField::AvailableFrom => &payload.available_from,
            MetadataField::Price => &payload.price,
            MetadataField::Contact => &payload.contact,
        }
    }

    fn slot(self, payload: &mut ListingPayload) -> &mut String {
        match self {
            MetadataField::Address => &mut payload.address,
            MetadataField::District => &mut payload.district,
            MetadataField::Area => &mut payload.area,
            MetadataField::Layout => &mut payload.layout,
            MetadataField::Floor => &mut payload.floor,
            MetadataField::FloorCount => &mut payload.floor_count,
            MetadataField::CeilingHeight => &mut payload.ceiling_height,
            MetadataField::Communications => &mut payload.communications,
            MetadataField::Extras => &mut payload.extras,
            MetadataField::PetsPolicy => &mut payload.pets_policy,
            MetadataField::AvailableFrom => &mut payload.available_from,
            MetadataField::Price => &mut payload.price,
            MetadataField::Contact => &mut payload.contact,
        }
    }
}

fn is_emphasis(ch: char) -> bool {
    matches!(ch, '*' | '_' | '~' | '`')
}

fn normalize_label(label: &str) -> String {
    let label = label.trim_start_matches(|ch: char| !ch.is_alphanumeric());
    let label = label
        .split(|ch: char| ch == '(' || ch == ',')
        .next()
        .unwrap_or_default()
        .trim_end_matches(|ch: char| ch.is_whitespace() || is_emphasis(ch))
        .to_lowercase()
        .replace('ё', "е");
    SPACES_RE.replace_all(label.trim(), " ").into_owned()
}

fn clean_value(value: &str) -> String {
    value
        .trim_matches(|ch: char| ch.is_whitespace() || is_emphasis(ch))
        .to_string()
}

/// First decimal number in `value`, with a comma separator turned into a dot.
pub fn extract_number(value: &str) -> String {
    NUMBER_RE
        .find(value)
        .map(|found| found.as_str().replace(',', "."))
        .unwrap_or_default()
}

/// Parses one metadata message. The first occurrence of each label wins;
/// `raw_metadata` keeps the whole message.
pub fn parse_metadata(text: &str) -> ListingPayload {
    let mut payload = ListingPayload {
        raw_metadata: text.trim().to_string(),
        ..ListingPayload::default()
    };

    for line in text.lines() {
        let Some(caps) = LINE_RE.captures(line.trim()) else {
            continue;
        };
        let Some(field) = MetadataField::from_label(&caps["label"]) else {
            continue;
        };
        let slot = field.slot(&mut payload);
        if !slot.is_empty() {
            continue;
        }
        let value = clean_value(&caps["value"]);
        *slot = match field {
            MetadataField::Area => extract_number(&value),
            _ => value,
        };
    }

    payload
}

impl ListingPayload {
    /// Copies every non-empty parsed field over; deal type and language are
    /// chosen with buttons and are left alone.
    pub fn merge_metadata(&mut self, parsed: ListingPayload) {
        for field in MetadataField::ALL {
            let value = field.value(&parsed);
            if !value.is_empty() {
                *field.slot(self) = value.to_string();
            }
        }
        if !parsed.raw_metadata.is_empty() {
            self.raw_metadata = parsed.raw_metadata;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::distributions::{Distribution, Uniform};
    use rand::Rng;

    use super::*;

    #[test]
    fn extracts_integer_area() {
        assert_eq!(parse_metadata("Area: 45").area, "45");
    }

    #[test]
    fn extracts_area_with_comma_separator() {
        assert_eq!(parse_metadata("Площадь: 45,5").area, "45.5");
    }

    #[test]
    fn area_keeps_only_the_number() {
        assert_eq!(parse_metadata("Площадь: ~36 кв м").area, "36");
        assert_eq!(parse_metadata("Površina: oko 52.3m2").area, "52.3");
        assert_eq!(parse_metadata("Area: unknown").area, "");
    }

    #[test]
    fn missing_labels_are_empty() {
        let payload = parse_metadata("Адрес: Main St 1");
        assert_eq!(payload.address, "Main St 1");
        assert_eq!(payload.price, "");
        assert_eq!(payload.contact, "");
        assert_eq!(payload.area, "");
    }

    #[test]
    fn labels_ignore_case_emphasis_and_bullets() {
        let text = "**АДРЕС**: Bulevar oslobođenja 10\n\
                    - _Район_: Лиман\n\
                    📞 Контакты: +381 60 123 4567\n\
                    • Total Floors: 9\n\
                    Floor: 4";
        let payload = parse_metadata(text);
        assert_eq!(payload.address, "Bulevar oslobođenja 10");
        assert_eq!(payload.district, "Лиман");
        assert_eq!(payload.contact, "+381 60 123 4567");
        assert_eq!(payload.floor_count, "9");
        assert_eq!(payload.floor, "4");
    }

    #[test]
    fn value_may_contain_colons_and_first_label_wins() {
        let payload = parse_metadata("Доступно с: 01.09, показы с 10:00\nДоступно с: никогда");
        assert_eq!(payload.available_from, "01.09, показы с 10:00");
    }

    #[test]
    fn full_width_colon_and_label_annotations() {
        let payload = parse_metadata("Цена (EUR)：120 000\nВысота потолков, м: 2,7");
        assert_eq!(payload.price, "120 000");
        assert_eq!(payload.ceiling_height, "2,7");
    }

    #[test]
    fn unlabeled_text_is_kept_raw() {
        let payload = parse_metadata("  Уютная квартира у парка  ");
        assert_eq!(payload.raw_metadata, "Уютная квартира у парка");
        assert_eq!(payload.address, "");
    }

    #[test]
    fn merge_keeps_choices_and_previous_values() {
        let mut payload = ListingPayload {
            price: "100 000".to_string(),
            ..ListingPayload::default()
        };
        payload.deal_type = Some(crate::flow::session::DealType::Sale);
        payload.merge_metadata(parse_metadata("Адрес: Main St 1\nПлощадь: 50"));
        assert_eq!(payload.deal_type, Some(crate::flow::session::DealType::Sale));
        assert_eq!(payload.price, "100 000");
        assert_eq!(payload.address, "Main St 1");
        assert_eq!(payload.area, "50");
    }

    #[test]
    fn parser_never_panics_on_random_input() {
        let mut rng = rand::thread_rng();
        let tokens = [
            "Площадь", "Area", "Адрес", "Price", ":", "：", "45", ",", ".", "5", "\n", "\r\n",
            "**", "_", " ", "абв", "📞", "•", "-", "(", "ё", "\t",
        ];
        let picker = Uniform::from(0..tokens.len());
        for _ in 0..500 {
            let len = rng.gen_range(0..80);
            let text: String = (0..len).map(|_| tokens[picker.sample(&mut rng)]).collect();
            let payload = parse_metadata(&text);
            assert!(payload.area.is_empty() || payload.area.parse::<f64>().is_ok());
        }
        for _ in 0..200 {
            let len = rng.gen_range(0..120);
            let text: String = (0..len).map(|_| rng.gen::<char>()).collect();
            parse_metadata(&text);
        }
    }
}
