//! Course transcript parser.
//!
//! Files follow a small line-oriented grammar:
//!
//! ```text
//! Course Title: <title>
//! Course Link: <url>            (optional)
//! Course Instructor: <name>     (optional)
//!
//! Lesson <n>: <lesson title>
//! Lesson Link: <url>            (optional, right after the marker)
//! <lesson body>
//! ```
//!
//! The parser walks the lines through `Header -> Metadata -> Preamble |
//! Lesson` states. Content that cannot be attributed to a lesson is reported
//! instead of being dropped.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::domain::{Course, Lesson};

static COURSE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+title:\s*(.*)$").expect("valid regex"));
static COURSE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+link:\s*(.*)$").expect("valid regex"));
static COURSE_INSTRUCTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+instructor:\s*(.*)$").expect("valid regex"));
static LESSON_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lesson\s+(\d+)\s*:\s*(.*)$").expect("valid regex"));
static LESSON_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lesson\s+link:\s*(.*)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing 'Course Title:' header")]
    MissingTitle,

    #[error("course title is empty")]
    EmptyTitle,

    #[error("line {line}: content before the first lesson marker")]
    UnattributedContent { line: usize },

    #[error("line {line}: duplicate lesson number {lesson_number}")]
    DuplicateLesson { line: usize, lesson_number: u32 },

    #[error("line {line}: lesson number '{value}' is out of range")]
    InvalidLessonNumber { line: usize, value: String },
}

/// Body text of one lesson, or of the whole course when the file has no
/// lesson markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub lesson_number: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCourse {
    pub course: Course,
    pub sections: Vec<Section>,
}

enum State {
    Header,
    Metadata,
    Preamble { first_line: usize },
    Lesson { expect_link: bool },
}

pub fn parse_course(text: &str) -> Result<ParsedCourse, ParseError> {
    let mut state = State::Header;
    let mut course: Option<Course> = None;
    let mut preamble: Vec<&str> = Vec::new();
    let mut lessons: Vec<Lesson> = Vec::new();
    let mut bodies: Vec<Vec<&str>> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if let Some(caps) = LESSON_MARKER.captures(line) {
            if matches!(state, State::Header) {
                return Err(ParseError::MissingTitle);
            }
            if let State::Preamble { first_line } = state {
                return Err(ParseError::UnattributedContent { line: first_line });
            }

            let value = &caps[1];
            let lesson_number: u32 =
                value
                    .parse()
                    .map_err(|_| ParseError::InvalidLessonNumber {
                        line: line_no,
                        value: value.to_string(),
                    })?;
            if lessons.iter().any(|l| l.lesson_number == lesson_number) {
                return Err(ParseError::DuplicateLesson {
                    line: line_no,
                    lesson_number,
                });
            }

            lessons.push(Lesson::new(lesson_number, caps[2].trim()));
            bodies.push(Vec::new());
            state = State::Lesson { expect_link: true };
            continue;
        }

        state = match state {
            State::Header => {
                if line.is_empty() {
                    State::Header
                } else {
                    let caps = COURSE_TITLE
                        .captures(line)
                        .ok_or(ParseError::MissingTitle)?;
                    let title = caps[1].trim();
                    if title.is_empty() {
                        return Err(ParseError::EmptyTitle);
                    }
                    course = Some(Course::new(title));
                    State::Metadata
                }
            }
            State::Metadata => {
                if let Some(caps) = COURSE_LINK.captures(line) {
                    if let Some(c) = course.as_mut() {
                        c.course_link = non_empty(&caps[1]);
                    }
                    State::Metadata
                } else if let Some(caps) = COURSE_INSTRUCTOR.captures(line) {
                    if let Some(c) = course.as_mut() {
                        c.instructor = non_empty(&caps[1]);
                    }
                    State::Metadata
                } else if line.is_empty() {
                    State::Metadata
                } else {
                    preamble.push(line);
                    State::Preamble {
                        first_line: line_no,
                    }
                }
            }
            State::Preamble { first_line } => {
                preamble.push(line);
                State::Preamble { first_line }
            }
            State::Lesson { expect_link } => {
                let link = LESSON_LINK
                    .captures(line)
                    .filter(|_| expect_link)
                    .map(|caps| non_empty(&caps[1]));
                match (link, lessons.last_mut()) {
                    (Some(link), Some(lesson)) => {
                        lesson.lesson_link = link;
                        State::Lesson { expect_link: false }
                    }
                    _ => {
                        if let Some(body) = bodies.last_mut() {
                            body.push(line);
                        }
                        // Blank lines between the marker and its link are allowed.
                        State::Lesson {
                            expect_link: expect_link && line.is_empty(),
                        }
                    }
                }
            }
        };
    }

    let mut course = course.ok_or(ParseError::MissingTitle)?;

    let sections = if lessons.is_empty() {
        let text = join_body(&preamble);
        if text.is_empty() {
            Vec::new()
        } else {
            vec![Section {
                lesson_number: None,
                text,
            }]
        }
    } else {
        lessons
            .iter()
            .zip(&bodies)
            .map(|(lesson, body)| Section {
                lesson_number: Some(lesson.lesson_number),
                text: join_body(body),
            })
            .filter(|s| !s.text.is_empty())
            .collect()
    };

    course.lessons = lessons;
    Ok(ParsedCourse { course, sections })
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn join_body(lines: &[&str]) -> String {
    lines
        .iter()
        .copied()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
