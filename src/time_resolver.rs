//! Time resolution: turn a `getDate` step input into an absolute UTC instant.
//!
//! Two strategies behind one capability, picked by the input's shape:
//! - `{"nlp": "..."}` goes through the language model
//! - `{"day": "...", "time": "..."}` is resolved deterministically
//!
//! Results are tagged: an unparseable model answer is `Unusable`, never a default.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde_json::Value;

use crate::error::{ModelError, SchedulingError};
use crate::llm::prompts::build_date_prompt;
use crate::llm::LanguageModel;
use crate::util::parse_timestamp;

/// Source of "now". Injected so runs can be pinned in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Hour used when the time token cannot be parsed.
const FALLBACK_HOUR: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateQuery {
    /// Free-form phrase for the language model.
    Natural(String),
    /// Structured day token plus optional `H[:MM](am|pm)` time token.
    DayTime { day: String, time: Option<String> },
}

impl DateQuery {
    /// Pick the strategy from the step input. `nlp` wins over `day`.
    pub fn from_input(input: &Value) -> Result<Self, SchedulingError> {
        if let Some(nlp) = input.get("nlp").and_then(Value::as_str) {
            if !nlp.trim().is_empty() {
                return Ok(DateQuery::Natural(nlp.trim().to_string()));
            }
        }
        if let Some(day) = input.get("day").and_then(Value::as_str) {
            let time = input
                .get("time")
                .and_then(Value::as_str)
                .map(|t| t.to_string());
            return Ok(DateQuery::DayTime {
                day: day.to_string(),
                time,
            });
        }
        Err(SchedulingError::MalformedInput(
            "getDate needs either an \"nlp\" phrase or a \"day\"".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTime {
    Resolved(DateTime<Utc>),
    Unusable { raw: String, reason: String },
}

impl ResolvedTime {
    pub fn into_result(self) -> Result<DateTime<Utc>, SchedulingError> {
        match self {
            ResolvedTime::Resolved(at) => Ok(at),
            ResolvedTime::Unusable { raw, reason } => {
                Err(SchedulingError::UnusableDate { raw, reason })
            }
        }
    }
}

fn time_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)\s*$").expect("valid time regex")
    })
}

/// Parse `H[:MM](am|pm)` into 24-hour `(hour, minute)`.
///
/// 12am → 0, 12pm → 12, 1–11pm → 13–23. Anything else is `None`.
pub fn parse_time_token(token: &str) -> Option<(u32, u32)> {
    let caps = time_token_re().captures(token)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }
    let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    Some((hour, minute))
}

/// Deterministic path: midnight of today (or tomorrow) in `tz`, plus the time token.
///
/// Day tokens other than "tomorrow" resolve to today. An unparseable time
/// token falls back to 09:00.
pub fn resolve_day_time(day: &str, time: Option<&str>, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let day_token = day.trim().to_lowercase();
    let date = match day_token.as_str() {
        "tomorrow" => today.checked_add_days(Days::new(1)).unwrap_or(today),
        "today" => today,
        other => {
            log::debug!("Unrecognized day token {:?}, treating as today", other);
            today
        }
    };

    let (hour, minute) = time.and_then(parse_time_token).unwrap_or_else(|| {
        log::debug!("Unparseable time token {:?}, defaulting to 09:00", time);
        (FALLBACK_HOUR, 0)
    });
    let clock = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let local = date.and_time(clock);

    // A wall-clock time skipped by a DST jump has no local mapping; read it as UTC.
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Interpret a model answer as an instant. Fences, quotes, and whitespace are
/// stripped; a timestamp without an offset is read as UTC.
pub fn parse_model_timestamp(raw: &str) -> ResolvedTime {
    let cleaned = raw
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string();

    if let Ok(at) = parse_timestamp(&cleaned) {
        return ResolvedTime::Resolved(at);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%dT%H:%M:%S%.f") {
        return ResolvedTime::Resolved(Utc.from_utc_datetime(&naive));
    }
    ResolvedTime::Unusable {
        raw: raw.trim().to_string(),
        reason: "not an ISO 8601 timestamp".to_string(),
    }
}

pub struct TimeResolver {
    model: Arc<dyn LanguageModel>,
    tz: Tz,
    clock: Clock,
}

impl TimeResolver {
    pub fn new(model: Arc<dyn LanguageModel>, tz: Tz) -> Self {
        Self {
            model,
            tz,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// "now" rendered in the reference timezone, for prompts.
    pub fn now_local_display(&self) -> String {
        self.now()
            .with_timezone(&self.tz)
            .format("%A %Y-%m-%d %H:%M")
            .to_string()
    }

    /// Resolve a query. Model transport failures are errors; an answer that
    /// is not a timestamp is `Unusable`.
    pub async fn resolve(&self, query: &DateQuery) -> Result<ResolvedTime, ModelError> {
        match query {
            DateQuery::DayTime { day, time } => Ok(ResolvedTime::Resolved(resolve_day_time(
                day,
                time.as_deref(),
                self.now(),
                self.tz,
            ))),
            DateQuery::Natural(phrase) => {
                let prompt = build_date_prompt(phrase, &self.now_local_display(), self.tz.name());
                let answer = self.model.generate(&prompt).await?;
                let resolved = parse_model_timestamp(&answer);
                if let ResolvedTime::Unusable { raw, .. } = &resolved {
                    log::warn!("Model returned an unusable date for {:?}: {:?}", phrase, raw);
                }
                Ok(resolved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use serde_json::json;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_parse_time_token_meridiem_rules() {
        assert_eq!(parse_time_token("12am"), Some((0, 0)));
        assert_eq!(parse_time_token("12pm"), Some((12, 0)));
        assert_eq!(parse_time_token("1pm"), Some((13, 0)));
        assert_eq!(parse_time_token("11:45 PM"), Some((23, 45)));
        assert_eq!(parse_time_token("9:05am"), Some((9, 5)));
    }

    #[test]
    fn test_parse_time_token_rejects_garbage() {
        assert_eq!(parse_time_token("14:00"), None);
        assert_eq!(parse_time_token("13pm"), None);
        assert_eq!(parse_time_token("0am"), None);
        assert_eq!(parse_time_token("9:75am"), None);
        assert_eq!(parse_time_token("noon"), None);
    }

    #[test]
    fn test_resolve_tomorrow_in_utc() {
        let now = at(2026, 10, 19, 22, 10);
        let resolved = resolve_day_time("tomorrow", Some("10am"), now, chrono_tz::UTC);
        assert_eq!(resolved, at(2026, 10, 20, 10, 0));
    }

    #[test]
    fn test_unknown_day_stays_today_and_bad_time_defaults_to_nine() {
        let now = at(2026, 10, 19, 6, 0);
        let resolved = resolve_day_time("friday", Some("whenever"), now, chrono_tz::UTC);
        assert_eq!(resolved, at(2026, 10, 19, 9, 0));
        let resolved = resolve_day_time("today", None, now, chrono_tz::UTC);
        assert_eq!(resolved, at(2026, 10, 19, 9, 0));
    }

    #[test]
    fn test_resolve_in_reference_timezone() {
        // 20:00 UTC on the 19th is already the 20th in Kolkata (UTC+5:30).
        let now = at(2026, 10, 19, 20, 0);
        let resolved = resolve_day_time("today", Some("10am"), now, chrono_tz::Asia::Kolkata);
        assert_eq!(resolved, at(2026, 10, 20, 4, 30));
    }

    #[test]
    fn test_query_shape_selection() {
        assert_eq!(
            DateQuery::from_input(&json!({"nlp": "next friday at noon", "day": "today"})).unwrap(),
            DateQuery::Natural("next friday at noon".into())
        );
        assert_eq!(
            DateQuery::from_input(&json!({"day": "tomorrow", "time": "2pm"})).unwrap(),
            DateQuery::DayTime {
                day: "tomorrow".into(),
                time: Some("2pm".into())
            }
        );
        assert!(DateQuery::from_input(&json!({"when": "soon"})).is_err());
        assert!(DateQuery::from_input(&json!({"nlp": "  "})).is_err());
    }

    #[test]
    fn test_parse_model_timestamp_variants() {
        assert_eq!(
            parse_model_timestamp("2026-10-20T10:00:00.000Z\n"),
            ResolvedTime::Resolved(at(2026, 10, 20, 10, 0))
        );
        assert_eq!(
            parse_model_timestamp("```\n\"2026-10-20T10:00:00Z\"\n```"),
            ResolvedTime::Resolved(at(2026, 10, 20, 10, 0))
        );
        assert_eq!(
            parse_model_timestamp("2026-10-20T10:00:00"),
            ResolvedTime::Resolved(at(2026, 10, 20, 10, 0))
        );
        assert!(matches!(
            parse_model_timestamp("I think you mean tomorrow morning"),
            ResolvedTime::Unusable { .. }
        ));
    }

    #[tokio::test]
    async fn test_natural_path_uses_model() {
        let model = Arc::new(ScriptedModel::new(vec!["2026-10-23T12:00:00Z"]));
        let resolver = TimeResolver::new(model.clone(), chrono_tz::UTC)
            .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()));
        let resolved = resolver
            .resolve(&DateQuery::Natural("friday at noon".into()))
            .await
            .unwrap();
        assert_eq!(resolved, ResolvedTime::Resolved(at(2026, 10, 23, 12, 0)));
        let prompts = model.prompts.lock();
        assert!(prompts[0].contains("Monday 2026-10-19 08:00"));
    }

    #[tokio::test]
    async fn test_natural_path_unusable_is_tagged() {
        let model = Arc::new(ScriptedModel::new(vec!["sometime next week"]));
        let resolver = TimeResolver::new(model, chrono_tz::UTC);
        let resolved = resolver
            .resolve(&DateQuery::Natural("next week".into()))
            .await
            .unwrap();
        let err = resolved.into_result().unwrap_err();
        assert!(matches!(err, SchedulingError::UnusableDate { .. }));
    }

    #[tokio::test]
    async fn test_deterministic_path_never_calls_model() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let resolver = TimeResolver::new(model.clone(), chrono_tz::UTC)
            .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()));
        let resolved = resolver
            .resolve(&DateQuery::DayTime {
                day: "today".into(),
                time: Some("3:30pm".into()),
            })
            .await
            .unwrap();
        assert_eq!(resolved, ResolvedTime::Resolved(at(2026, 10, 19, 15, 30)));
        assert_eq!(model.prompt_count(), 0);
    }
}
