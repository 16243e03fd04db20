//! Natal-data collection: birth date, birth time, birth place, age.
//!
//! One handler serves the whole registration family; the resolved sub-stage
//! arrives from the router. Collected values accumulate in the per-user
//! registration draft and are flushed into the profile once the age is
//! accepted, so a restart mid-registration loses nothing and concurrent
//! users never share state.

use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use regex::Regex;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler, transition};
use crate::store::ProfileStore;
use crate::transport::Transport;

/// Marker stored when the user does not know their birth time.
pub const BIRTH_TIME_UNKNOWN: &str = "unknown";

const UNKNOWN_TIME_CALLBACK: &str = "birth_time_unknown";
const AGE_OTHER_CALLBACK: &str = "age_other";

pub struct RegistrationHandler {
    store: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
}

impl RegistrationHandler {
    pub fn new(store: Arc<dyn ProfileStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    async fn handle_start(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        self.transport
            .send_text(
                &event.user_id,
                "Отлично! Давай начнем с первого этапа профайлинга. \
                 Для составления твоего персонального профиля мне нужна \
                 некоторая информация. Укажи, пожалуйста, свою дату рождения \
                 в формате ДД.ММ.ГГГГ (например, 15.03.1990).",
            )
            .await?;

        transition(
            self.store.as_ref(),
            &event.user_id,
            stage,
            Stage::RegistrationBirthDate,
        )
        .await?;
        Ok(())
    }

    async fn handle_birth_date(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        let Some(text) = event.message_text() else {
            return self.reprompt_date(&event.user_id).await;
        };

        let today = Utc::now().date_naive();
        match validate_birth_date(text.trim(), today) {
            Ok(_) => {
                let mut draft = self.store.get_registration_draft(&event.user_id).await?;
                draft.insert("birth_date".into(), text.trim().into());
                self.store
                    .set_registration_draft(&event.user_id, &draft)
                    .await?;

                self.transport
                    .send_menu(
                        &event.user_id,
                        "Спасибо! Теперь, пожалуйста, введи время рождения в \
                         формате ЧЧ:ММ (например, 14:30).\n\
                         Если ты не знаешь точное время, нажми на кнопку ниже.",
                        &ButtonMenu::single(Button::callback(
                            "Я не знаю время рождения",
                            UNKNOWN_TIME_CALLBACK,
                        )),
                    )
                    .await?;

                transition(
                    self.store.as_ref(),
                    &event.user_id,
                    stage,
                    Stage::RegistrationBirthTime,
                )
                .await?;
            }
            Err(DateInputError::InFuture) => {
                self.transport
                    .send_text(
                        &event.user_id,
                        "Дата рождения не может быть в будущем. Пожалуйста, \
                         введи корректную дату в формате ДД.ММ.ГГГГ.",
                    )
                    .await?;
            }
            Err(_) => self.reprompt_date(&event.user_id).await?,
        }
        Ok(())
    }

    async fn handle_birth_time(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        let unknown = event.button_data() == Some(UNKNOWN_TIME_CALLBACK)
            || event.message_text().map(str::trim) == Some("Я не знаю время рождения");

        let stored_time = if unknown {
            Some(BIRTH_TIME_UNKNOWN.to_string())
        } else {
            event
                .message_text()
                .map(str::trim)
                .filter(|t| parse_birth_time(t).is_some())
                .map(str::to_string)
        };

        let Some(stored_time) = stored_time else {
            self.transport
                .send_text(
                    &event.user_id,
                    "Неверный формат времени. Пожалуйста, введи время в \
                     формате ЧЧ:ММ (например, 14:30).",
                )
                .await?;
            return Ok(());
        };

        let mut draft = self.store.get_registration_draft(&event.user_id).await?;
        draft.insert("birth_time".into(), stored_time.into());
        self.store
            .set_registration_draft(&event.user_id, &draft)
            .await?;

        let prompt = if unknown {
            "Хорошо, это не проблема. Теперь, пожалуйста, введи место твоего \
             рождения (город или населенный пункт)."
        } else {
            "Спасибо! Теперь, пожалуйста, введи место твоего рождения (город \
             или населенный пункт)."
        };
        self.transport.send_text(&event.user_id, prompt).await?;

        transition(
            self.store.as_ref(),
            &event.user_id,
            stage,
            Stage::RegistrationBirthPlace,
        )
        .await?;
        Ok(())
    }

    async fn handle_birth_place(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        let place = event.message_text().map(str::trim).unwrap_or("");
        if place.chars().count() < 2 {
            self.transport
                .send_text(
                    &event.user_id,
                    "Пожалуйста, введи корректное место рождения (город или \
                     населенный пункт).",
                )
                .await?;
            return Ok(());
        }

        let mut draft = self.store.get_registration_draft(&event.user_id).await?;
        draft.insert("birth_place".into(), place.into());
        self.store
            .set_registration_draft(&event.user_id, &draft)
            .await?;

        let mut rows: Vec<Vec<Button>> = vec![
            (18..=48)
                .step_by(10)
                .map(|age| Button::callback(age.to_string(), format!("age_{age}")))
                .collect(),
            (58..=78)
                .step_by(10)
                .map(|age| Button::callback(age.to_string(), format!("age_{age}")))
                .collect(),
        ];
        rows.push(vec![Button::callback("Другой возраст", AGE_OTHER_CALLBACK)]);

        self.transport
            .send_menu(
                &event.user_id,
                "Спасибо! И последний вопрос — сколько тебе лет? Ты можешь \
                 выбрать из предложенных вариантов или ввести свой возраст.",
                &ButtonMenu::rows(rows),
            )
            .await?;

        transition(
            self.store.as_ref(),
            &event.user_id,
            stage,
            Stage::RegistrationAge,
        )
        .await?;
        Ok(())
    }

    async fn handle_age(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        if event.button_data() == Some(AGE_OTHER_CALLBACK) {
            self.transport
                .send_text(&event.user_id, "Пожалуйста, введи свой возраст числом.")
                .await?;
            return Ok(());
        }

        let age_text = event
            .button_data()
            .and_then(|d| d.strip_prefix("age_"))
            .or_else(|| event.message_text().map(str::trim));

        let Some(age) = age_text.and_then(parse_age) else {
            self.transport
                .send_text(
                    &event.user_id,
                    "Пожалуйста, введи корректный возраст (от 1 до 120 лет).",
                )
                .await?;
            return Ok(());
        };

        let mut draft = self.store.get_registration_draft(&event.user_id).await?;
        draft.insert("age".into(), age.into());

        // Draft complete: flush into the profile and clear it.
        self.store
            .set_profile_fields(&event.user_id, draft.clone())
            .await?;
        self.store.clear_registration_draft(&event.user_id).await?;
        tracing::info!(user_id = %event.user_id, "natal data saved");

        let field = |key: &str| {
            draft
                .get(key)
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };
        let summary = format!(
            "Отлично! Первый этап профайлинга завершен. Вот данные, которые я \
             записала:\n\n\
             📅 Дата рождения: {}\n\
             🕒 Время рождения: {}\n\
             📍 Место рождения: {}\n\
             👤 Возраст: {}\n\n\
             Теперь мы можем перейти к следующему этапу профайлинга.",
            field("birth_date"),
            field("birth_time"),
            field("birth_place"),
            field("age"),
        );

        self.transport
            .send_menu(
                &event.user_id,
                &summary,
                &ButtonMenu::single(Button::callback(
                    "Продолжить профайлинг",
                    "continue_profiling",
                )),
            )
            .await?;

        transition(
            self.store.as_ref(),
            &event.user_id,
            stage,
            Stage::RegistrationComplete,
        )
        .await?;
        Ok(())
    }

    /// Anything sent after completion re-offers the continue button.
    async fn handle_complete(&self, event: &InboundEvent) -> Result<()> {
        self.transport
            .send_menu(
                &event.user_id,
                "Первый этап профайлинга уже завершен. Продолжим?",
                &ButtonMenu::single(Button::callback(
                    "Продолжить профайлинг",
                    "continue_profiling",
                )),
            )
            .await?;
        Ok(())
    }

    async fn reprompt_date(&self, user_id: &str) -> Result<()> {
        self.transport
            .send_text(
                user_id,
                "Неверный формат даты. Пожалуйста, введи дату в формате \
                 ДД.ММ.ГГГГ (например, 15.03.1990).",
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StageHandler for RegistrationHandler {
    async fn handle(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        match stage {
            Stage::RegistrationBirthDate => self.handle_birth_date(event, stage).await,
            Stage::RegistrationBirthTime => self.handle_birth_time(event, stage).await,
            Stage::RegistrationBirthPlace => self.handle_birth_place(event, stage).await,
            Stage::RegistrationAge => self.handle_age(event, stage).await,
            Stage::RegistrationComplete => self.handle_complete(event).await,
            // Start, plus anything unexpected, restarts the flow.
            _ => self.handle_start(event, stage).await,
        }
    }
}

// ── Input validation ────────────────────────────────────────────────

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("date regex"));

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("time regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInputError {
    /// Not `DD.MM.YYYY`.
    Format,
    /// Matches the pattern but is not a real calendar date.
    NotACalendarDate,
    InFuture,
}

/// Validate a birth date entered as `DD.MM.YYYY` (1-2 digit day and month
/// accepted). The date must exist and not lie in the future.
pub fn validate_birth_date(
    text: &str,
    today: NaiveDate,
) -> std::result::Result<NaiveDate, DateInputError> {
    let captures = DATE_RE.captures(text).ok_or(DateInputError::Format)?;
    let day: u32 = captures[1].parse().map_err(|_| DateInputError::Format)?;
    let month: u32 = captures[2].parse().map_err(|_| DateInputError::Format)?;
    let year: i32 = captures[3].parse().map_err(|_| DateInputError::Format)?;

    let date =
        NaiveDate::from_ymd_opt(year, month, day).ok_or(DateInputError::NotACalendarDate)?;
    if date > today {
        return Err(DateInputError::InFuture);
    }
    Ok(date)
}

/// Parse a birth time entered as `HH:MM`. The minute must be exactly two
/// digits, so `9:05` is accepted and `9:5` is not.
pub fn parse_birth_time(text: &str) -> Option<NaiveTime> {
    let captures = TIME_RE.captures(text)?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parse an age between 1 and 120.
pub fn parse_age(text: &str) -> Option<u8> {
    let age: u8 = text.parse().ok()?;
    (1..=120).contains(&age).then_some(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn birth_date_accepts_short_day_and_month() {
        assert!(validate_birth_date("15.03.1990", today()).is_ok());
        assert!(validate_birth_date("1.3.1990", today()).is_ok());
        assert!(validate_birth_date("01.03.1990", today()).is_ok());
    }

    #[test]
    fn birth_date_rejects_bad_format() {
        for input in ["1990-03-15", "15/03/1990", "15.03.90", "birthday", ""] {
            assert_eq!(
                validate_birth_date(input, today()),
                Err(DateInputError::Format),
                "{input}"
            );
        }
    }

    #[test]
    fn birth_date_rejects_impossible_dates() {
        assert_eq!(
            validate_birth_date("31.02.1990", today()),
            Err(DateInputError::NotACalendarDate)
        );
        assert_eq!(
            validate_birth_date("29.02.2023", today()),
            Err(DateInputError::NotACalendarDate)
        );
        // Leap year
        assert!(validate_birth_date("29.02.2020", today()).is_ok());
    }

    #[test]
    fn birth_date_rejects_future() {
        assert_eq!(
            validate_birth_date("02.06.2025", today()),
            Err(DateInputError::InFuture)
        );
        // Today itself is fine
        assert!(validate_birth_date("01.06.2025", today()).is_ok());
    }

    #[test]
    fn birth_time_requires_two_digit_minutes() {
        assert!(parse_birth_time("14:30").is_some());
        assert!(parse_birth_time("9:05").is_some());
        assert!(parse_birth_time("0:00").is_some());
        assert!(parse_birth_time("9:5").is_none());
        assert!(parse_birth_time("24:00").is_none());
        assert!(parse_birth_time("14:60").is_none());
        assert!(parse_birth_time("noon").is_none());
    }

    #[test]
    fn age_bounds() {
        assert_eq!(parse_age("1"), Some(1));
        assert_eq!(parse_age("120"), Some(120));
        assert_eq!(parse_age("29"), Some(29));
        assert_eq!(parse_age("0"), None);
        assert_eq!(parse_age("121"), None);
        assert_eq!(parse_age("-5"), None);
        assert_eq!(parse_age("тридцать"), None);
    }
}
