use serde::{Deserialize, Deserializer, Serialize};

/// One entry of the normalized course index. `short` and `page` are always
/// filled (falling back to `title` and the generated course page).
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub short: String,
    pub page: String,
}

/// Per-course detail file (`courses/<id>.yml`). Every field is optional; the
/// data files are hand-written and partially filled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseDetail {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub code: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub ects: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub lecturers: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub scope: Option<String>,
    pub assessment: Vec<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub language: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub description: Option<String>,
    pub notes: Vec<String>,
    pub schedule: Vec<ScheduleEntry>,
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleEntry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub day: Option<String>,
    pub time: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkEntry {
    pub label: Option<String>,
    pub url: Option<String>,
}

/// Accepts any YAML scalar where a string is expected (`ects: 4` is common in
/// the data files) and stringifies it.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::CourseDetail;

    #[test]
    fn detail_accepts_numeric_scalars_and_missing_fields() {
        let raw = "title: Elektromagnetische Felder\nects: 4\nassessment:\n  - Serie\n  - Klausur\n";
        let detail: CourseDetail = serde_yaml::from_str(raw).expect("parse detail");
        assert_eq!(detail.title.as_deref(), Some("Elektromagnetische Felder"));
        assert_eq!(detail.ects.as_deref(), Some("4"));
        assert_eq!(detail.assessment, vec!["Serie", "Klausur"]);
        assert!(detail.lecturers.is_none());
        assert!(detail.schedule.is_empty());
    }

    #[test]
    fn empty_document_is_a_default_detail() {
        let detail: CourseDetail = serde_yaml::from_str("{}").expect("parse empty");
        assert!(detail.title.is_none());
        assert!(detail.notes.is_empty());
    }
}
