use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::config::{self, Config};
use crate::datastore::SiteData;
use crate::datetime::{resolve_timezone, today_in_zone};
use crate::render::{Renderer, TimelineDay, timeline_view};
use crate::schedule::{Window, build_occurrences, group_by_day};

#[instrument(skip(data, cfg, renderer, command, now))]
pub fn dispatch(
    data: &SiteData,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Build { out } => cmd_build(data, cfg, renderer, out.as_deref(), now),
        Command::Timeline { window, json } => {
            cmd_timeline(data, cfg, renderer, window, json, now)
        }
        Command::Courses => cmd_courses(data, renderer),
        Command::Check => cmd_check(data),
    }
}

/// Runs the whole occurrence pipeline for the given window length. `now` is
/// the single reference instant for the invocation.
fn timeline_days(
    data: &SiteData,
    cfg: &Config,
    window_days: u32,
    now: DateTime<Utc>,
) -> Vec<TimelineDay> {
    let tz = resolve_timezone(cfg.timezone.as_deref());
    let today = today_in_zone(now, &tz);
    let window = Window::forward_from(today, window_days);

    info!(
        today = %today,
        window_days,
        window_end = %window.end,
        "computing timeline"
    );

    let occurrences = build_occurrences(&data.tasks, &window);
    let buckets = group_by_day(occurrences);
    timeline_view(&buckets, data)
}

#[instrument(skip(data, cfg, renderer, now))]
fn cmd_build(
    data: &SiteData,
    cfg: &Config,
    renderer: &mut Renderer,
    out_override: Option<&Path>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let days = timeline_days(data, cfg, cfg.window_days, now);
    let out_dir = config::resolve_output_dir(&data.site_dir, cfg, out_override);

    let pages = renderer
        .write_site(data, &days, &out_dir)
        .with_context(|| format!("failed to write site to {}", out_dir.display()))?;

    println!("wrote {pages} pages to {}", out_dir.display());
    Ok(())
}

#[instrument(skip(data, cfg, renderer, now))]
fn cmd_timeline(
    data: &SiteData,
    cfg: &Config,
    renderer: &mut Renderer,
    window_override: Option<u32>,
    json: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let window_days = window_override.unwrap_or(cfg.window_days);
    let days = timeline_days(data, cfg, window_days, now);

    if json {
        let payload =
            serde_json::to_string_pretty(&days).context("failed to serialize timeline")?;
        println!("{payload}");
        return Ok(());
    }

    renderer.print_timeline(&days)
}

#[instrument(skip(data, renderer))]
fn cmd_courses(data: &SiteData, renderer: &mut Renderer) -> anyhow::Result<()> {
    renderer.print_courses(&data.courses)
}

/// Validates the loaded site data beyond what normalization enforces: every
/// course must have a parseable detail file, and task course references
/// should point at listed courses. Unknown references only warn; they render
/// with the raw id as title.
#[instrument(skip(data))]
fn cmd_check(data: &SiteData) -> anyhow::Result<()> {
    let mut problems = 0usize;

    if data.dropped_tasks > 0 {
        println!("warning: {} invalid task record(s) dropped", data.dropped_tasks);
    }
    if data.dropped_courses > 0 {
        println!(
            "warning: {} invalid course entries dropped",
            data.dropped_courses
        );
    }

    for course in &data.courses {
        if let Err(err) = data.course_detail(&course.id) {
            println!("problem: course {}: {err:#}", course.id);
            problems += 1;
        }
    }

    let known: Vec<&str> = data.courses.iter().map(|c| c.id.as_str()).collect();
    for task in &data.tasks {
        if !known.contains(&task.course.as_str()) {
            warn!(course = %task.course, task = %task.name, "task references unlisted course");
            println!(
                "warning: task \"{}\" references unlisted course \"{}\"",
                task.name, task.course
            );
        }
    }

    println!(
        "checked {} task(s), {} course(s): {} problem(s)",
        data.tasks.len(),
        data.courses.len(),
        problems
    );

    if problems > 0 {
        return Err(anyhow!("check found {problems} problem(s)"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::timeline_days;
    use crate::config::Config;
    use crate::datastore::SiteData;

    fn write_site_fixture(dir: &Path) {
        fs::create_dir_all(dir.join("courses")).expect("create courses dir");
        fs::write(
            dir.join("tasks.yml"),
            "tasks:\n  - course: emfw\n    name: Serie\n    start: \"2024-02-15\"\n    frequency: weekly\n",
        )
        .expect("write tasks");
        fs::write(
            dir.join("courses").join("index.yml"),
            "courses:\n- id: emfw\n  title: Elektromagnetische Felder\n  short: EMF\n",
        )
        .expect("write index");
    }

    #[test]
    fn pipeline_is_a_pure_function_of_now() {
        let temp = tempdir().expect("tempdir");
        write_site_fixture(temp.path());

        let data = SiteData::load(temp.path()).expect("load site");
        let cfg = Config::load(temp.path(), None).expect("load config");

        // 2024-03-01 12:00 UTC is 2024-03-01 in Berlin.
        let now = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid now");

        let days = timeline_days(&data, &cfg, 14, now);
        let again = timeline_days(&data, &cfg, 14, now);

        let keys: Vec<&str> = days.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(keys, vec!["2024-03-07", "2024-03-14"]);
        assert_eq!(days.len(), again.len());
        assert_eq!(days[0].items[0].course_title, "EMF");
        assert_eq!(days[0].label, "Do 07.03.2024");
    }
}
