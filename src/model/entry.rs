use crate::clock;
use crate::model::Amount;
use serde::{Deserialize, Deserializer, Serialize};

/// Whether money came in or went out.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    #[default]
    Out,
}

serde_plain::derive_display_from_serialize!(Direction);

impl Direction {
    /// Anything other than `in` is treated as outbound.
    pub fn coerce(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("in") {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

/// The columns of the Entries sheet, in storage order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Column {
    Id,
    Date,
    Direction,
    Amount,
    Method,
    Situation,
    Description,
    Who,
    SavedAt,
    ReceiptLink,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Id,
        Column::Date,
        Column::Direction,
        Column::Amount,
        Column::Method,
        Column::Situation,
        Column::Description,
        Column::Who,
        Column::SavedAt,
        Column::ReceiptLink,
    ];

    /// Zero-based position of the column in a row.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn header(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Date => "Date",
            Column::Direction => "Direction",
            Column::Amount => "Amount",
            Column::Method => "Method",
            Column::Situation => "Situation",
            Column::Description => "Description",
            Column::Who => "Who",
            Column::SavedAt => "Saved At",
            Column::ReceiptLink => "Receipt Link",
        }
    }

    /// Default width in pixels used when the sheet is first created.
    pub(crate) const fn width(self) -> u32 {
        match self {
            Column::Id => 130,
            Column::Date => 100,
            Column::Direction => 80,
            Column::Amount => 90,
            Column::Method | Column::Situation | Column::Who => 110,
            Column::Description => 240,
            Column::SavedAt => 150,
            Column::ReceiptLink => 320,
        }
    }
}

/// The header row of the Entries sheet.
pub fn header_row() -> Vec<String> {
    Column::ALL.iter().map(|c| c.header().to_string()).collect()
}

/// One financial transaction as stored in a row of the Entries sheet and served to clients.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub date: String,
    pub direction: Direction,
    pub amount: Amount,
    pub method: String,
    pub situation: String,
    pub desc: String,
    pub who: String,
    pub saved_at: String,
    pub drive_link: String,
}

impl Entry {
    /// Reads an entry from a sheet row. Missing or blank cells take their defaults, so short rows
    /// (the API omits trailing empty cells) are fine.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Self {
        let cell = |c: Column| row.get(c.index()).map(|s| s.as_ref().trim()).unwrap_or("");
        Self {
            id: cell(Column::Id).to_string(),
            date: clock::normalize_date_cell(cell(Column::Date)),
            direction: Direction::coerce(cell(Column::Direction)),
            amount: Amount::coerce(cell(Column::Amount)),
            method: cell(Column::Method).to_string(),
            situation: cell(Column::Situation).to_string(),
            desc: cell(Column::Description).to_string(),
            who: cell(Column::Who).to_string(),
            saved_at: cell(Column::SavedAt).to_string(),
            drive_link: cell(Column::ReceiptLink).to_string(),
        }
    }

    /// Writes the entry as a row of exactly `Column::ALL.len()` cells.
    pub fn to_row(&self) -> Vec<String> {
        Column::ALL
            .iter()
            .map(|c| match c {
                Column::Id => self.id.clone(),
                Column::Date => self.date.clone(),
                Column::Direction => self.direction.to_string(),
                Column::Amount => self.amount.to_string(),
                Column::Method => self.method.clone(),
                Column::Situation => self.situation.clone(),
                Column::Description => self.desc.clone(),
                Column::Who => self.who.clone(),
                Column::SavedAt => self.saved_at.clone(),
                Column::ReceiptLink => self.drive_link.clone(),
            })
            .collect()
    }
}

/// The fields a client supplies when adding an entry. Every field is optional and loosely typed:
/// strings, numbers and booleans are all accepted and coerced.
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub date: String,
    #[serde(default, deserialize_with = "loose_direction")]
    pub direction: Direction,
    #[serde(default)]
    pub amount: Amount,
    #[serde(default, deserialize_with = "loose_string")]
    pub method: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub situation: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub desc: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub who: String,
    /// A base64 image, usually with a `data:image/...;base64,` prefix.
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub receipt_image: Option<String>,
}

/// Converts a scalar JSON value to text the way a form field would read it.
pub(crate) fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            None
        }
    }
}

fn loose_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(json_text(&value).filter(|s| !s.is_empty()))
}

fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_opt_string(deserializer)?.unwrap_or_default())
}

fn loose_direction<'de, D>(deserializer: D) -> Result<Direction, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_opt_string(deserializer)?
        .map(|s| Direction::coerce(&s))
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_row() {
        assert_eq!(
            header_row(),
            vec![
                "ID",
                "Date",
                "Direction",
                "Amount",
                "Method",
                "Situation",
                "Description",
                "Who",
                "Saved At",
                "Receipt Link"
            ]
        );
    }

    #[test]
    fn test_direction_coerce() {
        assert_eq!(Direction::coerce("in"), Direction::In);
        assert_eq!(Direction::coerce(" IN "), Direction::In);
        assert_eq!(Direction::coerce("out"), Direction::Out);
        assert_eq!(Direction::coerce(""), Direction::Out);
        assert_eq!(Direction::coerce("sideways"), Direction::Out);
        assert_eq!(Direction::In.to_string(), "in");
    }

    #[test]
    fn test_from_short_row_uses_defaults() {
        let entry = Entry::from_row(&["7", "2026-01-21"]);
        assert_eq!(entry.id, "7");
        assert_eq!(entry.date, "2026-01-21");
        assert_eq!(entry.direction, Direction::Out);
        assert!(entry.amount.is_zero());
        assert_eq!(entry.desc, "");
        assert_eq!(entry.drive_link, "");
    }

    #[test]
    fn test_row_round_trip_has_ten_cells() {
        let entry = Entry {
            id: "42".to_string(),
            date: "2026-01-21".to_string(),
            direction: Direction::In,
            amount: Amount::coerce("1500"),
            method: "cash".to_string(),
            situation: "work".to_string(),
            desc: "salary".to_string(),
            who: "me".to_string(),
            saved_at: "2026-01-21 09:00:00".to_string(),
            drive_link: String::new(),
        };
        let row = entry.to_row();
        assert_eq!(row.len(), Column::ALL.len());
        assert_eq!(row[Column::Amount.index()], "1500");
        assert_eq!(row[Column::Direction.index()], "in");
        assert_eq!(Entry::from_row(&row), entry);
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = Entry::from_row(&["1", "2026-01-21", "out", "500", "", "", "lunch"]);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["id"], "1");
        assert_eq!(value["amount"], 500);
        assert_eq!(value["desc"], "lunch");
        assert_eq!(value["savedAt"], "");
        assert_eq!(value["driveLink"], "");
    }

    #[test]
    fn test_new_entry_is_loosely_typed() {
        let new: NewEntry = serde_json::from_value(json!({
            "id": 1737430000000u64,
            "date": "2026-01-21",
            "direction": "in",
            "amount": "800",
            "method": 3,
            "desc": null,
            "receiptImage": ""
        }))
        .unwrap();
        assert_eq!(new.id.as_deref(), Some("1737430000000"));
        assert_eq!(new.direction, Direction::In);
        assert_eq!(new.amount, Amount::coerce("800"));
        assert_eq!(new.method, "3");
        assert_eq!(new.desc, "");
        assert_eq!(new.receipt_image, None);
    }

    #[test]
    fn test_new_entry_defaults() {
        let new: NewEntry = serde_json::from_value(json!({})).unwrap();
        assert_eq!(new, NewEntry::default());
        assert_eq!(new.direction, Direction::Out);
    }
}
