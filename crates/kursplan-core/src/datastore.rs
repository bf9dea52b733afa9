use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::course::{Course, CourseDetail};
use crate::datetime::parse_ymd;
use crate::task::{Frequency, TaskDefinition};

pub const TASKS_FILE: &str = "tasks.yml";
pub const COURSES_DIR: &str = "courses";
pub const COURSE_INDEX_FILE: &str = "index.yml";

/// Course index entries claiming this id are never shown.
const RESERVED_COURSE_ID: &str = "admin";

/// The normalized contents of a site data directory.
#[derive(Debug)]
pub struct SiteData {
    pub site_dir: PathBuf,
    pub tasks: Vec<TaskDefinition>,
    pub courses: Vec<Course>,
    pub dropped_tasks: usize,
    pub dropped_courses: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTaskFile {
    tasks: Vec<RawTask>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTask {
    course: Option<String>,
    name: Option<String>,
    description: Option<String>,
    start: Option<String>,
    frequency: Option<String>,
    until: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCourseIndex {
    courses: Vec<RawCourseEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCourseEntry {
    id: Option<String>,
    title: Option<String>,
    short: Option<String>,
    page: Option<String>,
}

impl SiteData {
    /// Loads and normalizes `tasks.yml` and `courses/index.yml`. Individual
    /// malformed records are dropped with a warning; a missing or unreadable
    /// data file is a hard error.
    #[tracing::instrument(skip(site_dir))]
    pub fn load(site_dir: &Path) -> anyhow::Result<Self> {
        let raw_tasks: RawTaskFile = load_yaml(&site_dir.join(TASKS_FILE))?;
        let raw_index: RawCourseIndex =
            load_yaml(&site_dir.join(COURSES_DIR).join(COURSE_INDEX_FILE))?;

        let raw_task_count = raw_tasks.tasks.len();
        let raw_course_count = raw_index.courses.len();

        let tasks = normalize_tasks(raw_tasks.tasks);
        let courses = normalize_courses(raw_index.courses);

        let data = Self {
            site_dir: site_dir.to_path_buf(),
            dropped_tasks: raw_task_count - tasks.len(),
            dropped_courses: raw_course_count - courses.len(),
            tasks,
            courses,
        };

        info!(
            tasks = data.tasks.len(),
            courses = data.courses.len(),
            dropped_tasks = data.dropped_tasks,
            dropped_courses = data.dropped_courses,
            "loaded site data"
        );

        Ok(data)
    }

    /// Loads the detail file for one course id. Callers decide how a missing
    /// or malformed file degrades.
    pub fn course_detail(&self, id: &str) -> anyhow::Result<CourseDetail> {
        load_yaml(
            &self
                .site_dir
                .join(COURSES_DIR)
                .join(format!("{id}.yml")),
        )
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|course| course.id == id)
    }

    /// Display title for a course id: short name, else full title, else the
    /// raw id for tasks pointing at unlisted courses.
    #[must_use]
    pub fn course_title(&self, id: &str) -> String {
        match self.course(id) {
            Some(course) if !course.short.is_empty() => course.short.clone(),
            Some(course) => course.title.clone(),
            None => id.to_string(),
        }
    }
}

fn normalize_tasks(raw: Vec<RawTask>) -> Vec<TaskDefinition> {
    let mut tasks = Vec::new();

    for (index, record) in raw.into_iter().enumerate() {
        let course = trimmed(record.course);
        let name = trimmed(record.name);
        let start_raw = trimmed(record.start);

        if course.is_empty() || name.is_empty() || start_raw.is_empty() {
            warn!(index, "dropping task record missing course, name or start");
            continue;
        }

        let Some(start) = parse_ymd(&start_raw) else {
            warn!(index, start = %start_raw, "dropping task record with unparseable start date");
            continue;
        };

        let until = match trimmed(record.until).as_str() {
            "" => None,
            raw_until => {
                let parsed = parse_ymd(raw_until);
                if parsed.is_none() {
                    warn!(index, until = %raw_until, "ignoring unparseable until date");
                }
                parsed
            }
        };

        let frequency = Frequency::from_keyword(record.frequency.as_deref().unwrap_or_default());
        if frequency == Frequency::Unknown {
            warn!(
                index,
                frequency = %record.frequency.as_deref().unwrap_or_default(),
                "unrecognized frequency; task will produce no occurrences"
            );
        }

        tasks.push(TaskDefinition {
            course,
            name,
            description: record.description.unwrap_or_default(),
            start,
            frequency,
            until,
        });
    }

    tasks
}

fn normalize_courses(raw: Vec<RawCourseEntry>) -> Vec<Course> {
    let mut courses = Vec::new();

    for (index, record) in raw.into_iter().enumerate() {
        let id = trimmed(record.id);
        let title = trimmed(record.title);

        if id.is_empty() || title.is_empty() {
            warn!(index, "dropping course entry missing id or title");
            continue;
        }
        if id == RESERVED_COURSE_ID {
            debug!(index, "skipping reserved course id");
            continue;
        }
        if !valid_course_id(&id) {
            warn!(index, id = %id, "dropping course entry with invalid id");
            continue;
        }

        let short = match trimmed(record.short).as_str() {
            "" => title.clone(),
            short => short.to_string(),
        };
        let page = match trimmed(record.page).as_str() {
            "" => format!("courses/{id}.html"),
            page => page.to_string(),
        };

        courses.push(Course {
            id,
            title,
            short,
            page,
        });
    }

    courses
}

/// Course ids become file names of generated pages, so they are restricted to
/// a plain slug alphabet.
fn valid_course_id(id: &str) -> bool {
    static ID_RE: OnceLock<Option<Regex>> = OnceLock::new();
    ID_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(id))
}

fn trimmed(raw: Option<String>) -> String {
    raw.unwrap_or_default().trim().to_string()
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    debug!(file = %path.display(), "loading yaml");
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{RawCourseEntry, RawTask, normalize_courses, normalize_tasks};
    use crate::task::Frequency;

    fn raw_task(course: &str, name: &str, start: &str) -> RawTask {
        RawTask {
            course: Some(course.to_string()),
            name: Some(name.to_string()),
            start: Some(start.to_string()),
            ..RawTask::default()
        }
    }

    #[test]
    fn drops_tasks_missing_required_fields() {
        let records = vec![
            raw_task("emfw", "Serie 1", "2024-03-01"),
            raw_task("", "Serie 2", "2024-03-01"),
            raw_task("emfw", "", "2024-03-01"),
            raw_task("emfw", "Serie 3", ""),
            raw_task("emfw", "Serie 4", "irgendwann"),
            RawTask::default(),
        ];

        let tasks = normalize_tasks(records);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Serie 1");
        assert_eq!(
            tasks[0].start,
            NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date")
        );
        assert_eq!(tasks[0].frequency, Frequency::Unique);
    }

    #[test]
    fn bad_until_degrades_to_none() {
        let mut record = raw_task("emfw", "Serie", "2024-03-01");
        record.until = Some("bald".to_string());
        record.frequency = Some("weekly".to_string());

        let tasks = normalize_tasks(vec![record]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].until, None);
        assert_eq!(tasks[0].frequency, Frequency::Weekly);
    }

    #[test]
    fn unknown_frequency_is_kept_as_unknown() {
        let mut record = raw_task("emfw", "Serie", "2024-03-01");
        record.frequency = Some("daily".to_string());

        let tasks = normalize_tasks(vec![record]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].frequency, Frequency::Unknown);
    }

    #[test]
    fn course_index_filters_and_fills_fallbacks() {
        let records = vec![
            RawCourseEntry {
                id: Some("emfw".to_string()),
                title: Some("Elektromagnetische Felder".to_string()),
                short: Some("EMF".to_string()),
                page: None,
            },
            RawCourseEntry {
                id: Some("math".to_string()),
                title: Some("Mathematik".to_string()),
                short: None,
                page: Some("extern/math.html".to_string()),
            },
            RawCourseEntry {
                id: Some("admin".to_string()),
                title: Some("Admin".to_string()),
                ..RawCourseEntry::default()
            },
            RawCourseEntry {
                id: Some("../evil".to_string()),
                title: Some("Evil".to_string()),
                ..RawCourseEntry::default()
            },
            RawCourseEntry::default(),
        ];

        let courses = normalize_courses(records);
        assert_eq!(courses.len(), 2);

        assert_eq!(courses[0].id, "emfw");
        assert_eq!(courses[0].short, "EMF");
        assert_eq!(courses[0].page, "courses/emfw.html");

        assert_eq!(courses[1].short, "Mathematik");
        assert_eq!(courses[1].page, "extern/math.html");
    }
}
