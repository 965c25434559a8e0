use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A positional value bound to a `?` placeholder.
///
/// Both the SQL API and the query-request endpoint take bindings as
/// `{"1": {"type": "TEXT", "value": "..."}}`, so one representation serves
/// every session kind. Values always travel as strings; Snowflake casts them
/// according to `type`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type")]
pub enum Binding {
    Boolean { value: String },
    Fixed { value: String },
    Real { value: String },
    Text { value: String },
}

impl Binding {
    /// The string that will be sent for this binding
    pub fn value(&self) -> &str {
        match self {
            Binding::Boolean { value }
            | Binding::Fixed { value }
            | Binding::Real { value }
            | Binding::Text { value } => value,
        }
    }
}

macro_rules! impl_binding {
    ($variant: ident: $($ty: ty),+) => {
        $(
            impl From<$ty> for Binding {
                fn from(value: $ty) -> Self {
                    Binding::$variant {
                        value: value.to_string(),
                    }
                }
            }
        )+
    };
}
impl_binding!(Boolean: bool);
impl_binding!(Fixed: i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
impl_binding!(Real: f32, f64);
impl_binding!(Text: char, String, &str, &String, NaiveDateTime, NaiveDate, NaiveTime);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Binding::from("it's")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "TEXT", "value": "it's"}));
        let json = serde_json::to_value(Binding::from(5usize)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "FIXED", "value": "5"}));
        let json = serde_json::to_value(Binding::from(true)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "BOOLEAN", "value": "true"}));
    }

    #[test]
    fn dates_bind_as_text() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            Binding::from(date),
            Binding::Text {
                value: "2024-03-31".into()
            }
        );
    }
}
