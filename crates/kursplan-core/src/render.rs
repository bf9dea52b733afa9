use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::course::{Course, CourseDetail};
use crate::datastore::SiteData;
use crate::datetime::{day_key, day_label};
use crate::schedule::DayBucket;

/// Shown on course pages with no notes of their own.
const DEFAULT_NOTES: [&str; 4] = [
    "Wöchentlich: 1× 45 Minuten Wiederholung + 1× Übungsblock.",
    "Offene Fragen sofort als Bullet sammeln und in der nächsten Übung klären.",
    "Vor Abgaben: Checkliste (Format, Units, Randbedingungen, Plausibilität).",
    "Prüfung: alte Serien priorisieren, Fehlerkatalog führen.",
];

const STYLE: &str = "\
body { margin: 0; font-family: system-ui, sans-serif; color: #111827; background: #fafafa; }
.page { max-width: 920px; margin: 0 auto; padding: 40px 16px; }
h1 { font-size: 22px; } h2 { font-size: 16px; margin-top: 28px; }
a { color: #1d4ed8; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 12px; }
.card { display: block; border: 1px solid #e5e7eb; border-radius: 16px; background: #fff; padding: 16px; text-decoration: none; }
.card:hover { background: #f5f5f5; }
.card-short { font-size: 14px; font-weight: 600; color: #111827; }
.card-title { margin-top: 4px; font-size: 12px; color: #6b7280; }
.day { border: 1px solid #e5e7eb; border-radius: 16px; background: #fff; padding: 16px; margin-bottom: 12px; }
.day-head { display: flex; justify-content: space-between; align-items: center; }
.day-label { font-size: 14px; font-weight: 600; }
.day-count { font-size: 12px; color: #6b7280; }
.item { border: 1px solid #e5e7eb; border-radius: 12px; padding: 12px; margin-top: 12px; }
.item-course { font-size: 12px; color: #6b7280; }
.item-name { margin-top: 4px; font-size: 14px; font-weight: 600; }
.item-desc { margin-top: 4px; font-size: 12px; color: #4b5563; }
.item-link { font-size: 12px; }
.empty { font-size: 14px; color: #6b7280; }
.subtitle { font-size: 14px; color: #6b7280; }
.pill { display: inline-block; border: 1px solid #e5e7eb; border-radius: 999px; padding: 2px 10px; font-size: 12px; margin-right: 6px; }
.kv { display: grid; grid-template-columns: max-content 1fr; gap: 4px 16px; font-size: 14px; }
.kv-label { color: #6b7280; }
.slot { border: 1px solid #e5e7eb; border-radius: 12px; background: #fff; padding: 12px; margin-bottom: 8px; }
.slot-kind { font-size: 13px; font-weight: 650; }
.slot-when { margin-top: 4px; font-size: 13px; }
.slot-room { margin-top: 2px; font-size: 12px; color: #6b7280; }
";

/// Presentation view of one day bucket, with course titles resolved and the
/// locale label attached. Also the JSON export shape.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineDay {
    pub day: String,
    pub label: String,
    pub items: Vec<TimelineItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineItem {
    pub course: String,
    pub course_title: String,
    pub course_page: String,
    pub name: String,
    pub description: String,
    pub date: String,
}

/// Resolves day buckets into the displayable timeline. Course titles follow
/// the short/title/raw-id fallback chain.
#[must_use]
pub fn timeline_view(buckets: &[DayBucket<'_>], data: &SiteData) -> Vec<TimelineDay> {
    buckets
        .iter()
        .map(|bucket| TimelineDay {
            day: bucket.day.clone(),
            label: day_label(&bucket.day),
            items: bucket
                .items
                .iter()
                .map(|occ| TimelineItem {
                    course: occ.task.course.clone(),
                    course_title: data.course_title(&occ.task.course),
                    course_page: data
                        .course(&occ.task.course)
                        .map(|course| course.page.clone())
                        .unwrap_or_else(|| format!("courses/{}.html", occ.task.course)),
                    name: occ.task.name.clone(),
                    description: occ.task.description.clone(),
                    date: day_key(occ.date),
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    #[must_use]
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    /// Prints the day-grouped timeline to stdout.
    #[tracing::instrument(skip(self, days))]
    pub fn print_timeline(&mut self, days: &[TimelineDay]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if days.is_empty() {
            writeln!(out, "Keine Tasks im Zeitraum.")?;
            return Ok(());
        }

        let mut title_width = 0usize;
        let mut name_width = 0usize;
        for day in days {
            for item in &day.items {
                title_width = title_width.max(UnicodeWidthStr::width(item.course_title.as_str()));
                name_width = name_width.max(UnicodeWidthStr::width(item.name.as_str()));
            }
        }

        for day in days {
            writeln!(
                out,
                "{}  ({})",
                self.paint(&day.label, "1"),
                day.items.len()
            )?;
            for item in &day.items {
                writeln!(
                    out,
                    "  {}  {}  {}",
                    pad_to(&item.course_title, title_width),
                    pad_to(&item.name, name_width),
                    item.description
                )?;
            }
            writeln!(out)?;
        }

        Ok(())
    }

    /// Prints the normalized course index as a table.
    #[tracing::instrument(skip(self, courses))]
    pub fn print_courses(&mut self, courses: &[Course]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Kurz".to_string(),
            "Titel".to_string(),
            "Seite".to_string(),
        ];
        let rows = courses
            .iter()
            .map(|course| {
                vec![
                    self.paint(&course.id, "33"),
                    course.short.clone(),
                    course.title.clone(),
                    course.page.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Writes the whole static site: `index.html` plus one page per course.
    /// Returns the number of pages written.
    #[tracing::instrument(skip(self, data, days, out_dir))]
    pub fn write_site(
        &mut self,
        data: &SiteData,
        days: &[TimelineDay],
        out_dir: &Path,
    ) -> anyhow::Result<usize> {
        let courses_dir = out_dir.join("courses");
        fs::create_dir_all(&courses_dir)
            .with_context(|| format!("failed to create {}", courses_dir.display()))?;

        write_atomic(&out_dir.join("index.html"), &index_html(&data.courses, days))?;
        let mut pages = 1usize;

        for course in &data.courses {
            let detail = match data.course_detail(&course.id) {
                Ok(detail) => detail,
                Err(err) => {
                    warn!(
                        course = %course.id,
                        error = %format!("{err:#}"),
                        "course detail unavailable; rendering index data only"
                    );
                    CourseDetail::default()
                }
            };

            let path = courses_dir.join(format!("{}.html", course.id));
            write_atomic(&path, &course_html(course, &detail))?;
            pages += 1;
        }

        info!(pages, out_dir = %out_dir.display(), "wrote site");
        Ok(pages)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn pad_to(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(text);
    format!("{}{}", text, " ".repeat(width.saturating_sub(visible)))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "writing page");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn page_shell(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"de\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n<main class=\"page\">\n{}\
         </main>\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

fn index_html(courses: &[Course], days: &[TimelineDay]) -> String {
    let mut body = String::new();
    body.push_str("<h1>Kursplan</h1>\n");

    body.push_str("<h2>Kurse</h2>\n<section class=\"grid\">\n");
    for course in courses {
        body.push_str(&format!(
            "<a class=\"card\" href=\"{}\">\n<div class=\"card-short\">{}</div>\n\
             <div class=\"card-title\">{}</div>\n</a>\n",
            escape_html(&course.page),
            escape_html(&course.short),
            escape_html(&course.title),
        ));
    }
    body.push_str("</section>\n");

    body.push_str("<h2>Nächste Tasks</h2>\n<section class=\"timeline\">\n");
    if days.is_empty() {
        body.push_str("<div class=\"empty\">Keine Tasks im Zeitraum.</div>\n");
    }
    for day in days {
        body.push_str(&format!(
            "<div class=\"day\">\n<div class=\"day-head\"><span class=\"day-label\">{}</span>\
             <span class=\"day-count\">{}</span></div>\n",
            escape_html(&day.label),
            day.items.len(),
        ));
        for item in &day.items {
            body.push_str("<div class=\"item\">\n");
            body.push_str(&format!(
                "<div class=\"item-course\">{}</div>\n<div class=\"item-name\">{}</div>\n",
                escape_html(&item.course_title),
                escape_html(&item.name),
            ));
            if !item.description.is_empty() {
                body.push_str(&format!(
                    "<div class=\"item-desc\">{}</div>\n",
                    escape_html(&item.description)
                ));
            }
            body.push_str(&format!(
                "<a class=\"item-link\" href=\"{}\">Kurs</a>\n</div>\n",
                escape_html(&item.course_page)
            ));
        }
        body.push_str("</div>\n");
    }
    body.push_str("</section>\n");

    page_shell("Kursplan", &body)
}

fn course_html(course: &Course, detail: &CourseDetail) -> String {
    let title = detail
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&course.title);

    let mut body = String::new();
    body.push_str("<p><a href=\"../index.html\">← Kursplan</a></p>\n");
    body.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));

    let subtitle: Vec<&str> = [detail.lecturers.as_deref(), detail.scope.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect();
    if !subtitle.is_empty() {
        body.push_str(&format!(
            "<p class=\"subtitle\">{}</p>\n",
            escape_html(&subtitle.join(" · "))
        ));
    }

    let pills: Vec<&str> = [detail.code.as_deref(), detail.ects.as_deref()]
        .into_iter()
        .flatten()
        .filter(|pill| !pill.trim().is_empty())
        .collect();
    if !pills.is_empty() {
        body.push_str("<p>\n");
        for pill in pills {
            body.push_str(&format!("<span class=\"pill\">{}</span>\n", escape_html(pill)));
        }
        body.push_str("</p>\n");
    }

    body.push_str("<h2>Beschreibung</h2>\n");
    let description = detail
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("—");
    body.push_str(&format!("<p>{}</p>\n", escape_html(description)));

    body.push_str("<h2>Info</h2>\n<div class=\"kv\">\n");
    let mut kv: Vec<(&str, String)> = Vec::new();
    if let Some(lecturers) = detail.lecturers.as_deref().filter(|v| !v.trim().is_empty()) {
        kv.push(("Dozierende", lecturers.to_string()));
    }
    if let Some(scope) = detail.scope.as_deref().filter(|v| !v.trim().is_empty()) {
        kv.push(("Umfang", scope.to_string()));
    }
    if !detail.assessment.is_empty() {
        kv.push(("Prüfung", detail.assessment.join(" · ")));
    }
    if let Some(language) = detail.language.as_deref().filter(|v| !v.trim().is_empty()) {
        kv.push(("Sprache", language.to_string()));
    }
    if kv.is_empty() {
        body.push_str("<div class=\"kv-label\">Info</div><div>—</div>\n");
    }
    for (label, value) in kv {
        body.push_str(&format!(
            "<div class=\"kv-label\">{label}</div><div>{}</div>\n",
            escape_html(&value)
        ));
    }
    body.push_str("</div>\n");

    body.push_str("<h2>Notizen</h2>\n<ul>\n");
    if detail.notes.is_empty() {
        for note in DEFAULT_NOTES {
            body.push_str(&format!("<li>{}</li>\n", escape_html(note)));
        }
    } else {
        for note in &detail.notes {
            body.push_str(&format!("<li>{}</li>\n", escape_html(note)));
        }
    }
    body.push_str("</ul>\n");

    body.push_str("<h2>Termine</h2>\n");
    if detail.schedule.is_empty() {
        body.push_str("<div class=\"empty\">Keine Termine hinterlegt.</div>\n");
    }
    for slot in &detail.schedule {
        body.push_str(&format!(
            "<div class=\"slot\">\n<div class=\"slot-kind\">{}</div>\n\
             <div class=\"slot-when\">{} {}</div>\n<div class=\"slot-room\">{}</div>\n</div>\n",
            escape_html(slot.kind.as_deref().unwrap_or_default()),
            escape_html(slot.day.as_deref().unwrap_or_default()),
            escape_html(slot.time.as_deref().unwrap_or_default()),
            escape_html(slot.room.as_deref().unwrap_or_default()),
        ));
    }

    body.push_str("<h2>Links</h2>\n");
    if detail.links.is_empty() {
        body.push_str("<div class=\"empty\">Keine Links hinterlegt.</div>\n");
    }
    for link in &detail.links {
        let url = link.url.as_deref().unwrap_or("#");
        let label = link
            .label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(url);
        body.push_str(&format!(
            "<a class=\"slot\" href=\"{}\" target=\"_blank\" rel=\"noreferrer\">{}</a>\n",
            escape_html(url),
            escape_html(label),
        ));
    }

    page_shell(title, &body)
}
