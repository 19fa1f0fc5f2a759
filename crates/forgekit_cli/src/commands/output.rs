use clap::ValueEnum;
use forgekit::reconcile::InfoMapper;
use serde::Serialize;
use serde_json::{Map, Value};
use tabled::Tabled;

/// Output format for listings and reconcile reports.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// One server object: its name plus the set fields of its info.
#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct ObjectRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Details")]
    #[serde(skip)]
    pub details: String,
    #[tabled(skip)]
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ObjectRow {
    pub(crate) fn from_object<O>(object: &O) -> Self
    where
        O: InfoMapper,
        O::Info: Serialize,
    {
        Self::from_info(object.display_name(), &object.to_info())
    }

    pub(crate) fn from_info<I: Serialize>(name: String, info: &I) -> Self {
        let fields = match serde_json::to_value(info) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null() && v.as_array().is_none_or(|a| !a.is_empty()))
                .collect(),
            _ => Map::new(),
        };
        Self {
            name,
            details: details(&fields),
            fields,
        }
    }
}

/// `key=value` pairs, long text cut to its first line.
fn details(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.lines().next().unwrap_or_default().to_string(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.to_string(),
            };
            format!("{key}={text}")
        })
        .collect::<Vec<_>>()
        .join("  ")
}

/// Print rows as a rounded table or pretty JSON.
pub(crate) fn print_rows<T>(rows: &[T], format: OutputFormat) -> Result<(), serde_json::Error>
where
    T: Tabled + Serialize,
{
    match format {
        OutputFormat::Table => {
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
    }
    Ok(())
}

/// Rows for a listing, in server order.
pub(crate) fn object_rows<O>(objects: &[O]) -> Vec<ObjectRow>
where
    O: InfoMapper,
    O::Info: Serialize,
{
    objects.iter().map(ObjectRow::from_object).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn output_format_default_is_table() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[test]
    fn details_joins_fields_and_trims_text() {
        let fields = map(json!({
            "message": "first line\nsecond line",
            "parents": ["a1", "b2"],
            "read_only": true
        }));
        assert_eq!(
            details(&fields),
            "message=first line  parents=a1,b2  read_only=true"
        );
    }

    #[test]
    fn json_output_flattens_fields() {
        let row = ObjectRow {
            name: "infra".to_string(),
            details: "ignored".to_string(),
            fields: map(json!({"visibility": "private"})),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value, json!({"name": "infra", "visibility": "private"}));
    }

    #[test]
    fn print_rows_supports_json_and_table() {
        let rows = vec![ObjectRow {
            name: "main".to_string(),
            details: "sha=abc".to_string(),
            fields: map(json!({"sha": "abc"})),
        }];

        // Smoke tests: this should not panic in either output mode.
        print_rows(&rows, OutputFormat::Json).unwrap();
        print_rows(&rows, OutputFormat::Table).unwrap();
    }
}
