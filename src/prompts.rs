//! Prompt texts and builders for the generative provider.

use crate::store::ProfileFields;

/// Persona prompt for the free-form chat stage.
pub const MENTOR_SYSTEM_PROMPT: &str = "\
Ты — Mentora, AI-наставник для женщин. Твоя задача — помогать женщинам в их \
личностном росте, саморазвитии и достижении гармонии. Ты используешь \
комбинацию психологии, астрологии и духовных практик.

Основные принципы:
1. Всегда поддерживай и проявляй эмпатию
2. Используй мягкий, дружелюбный тон
3. Давай конкретные, практические советы
4. Уважай личные границы и конфиденциальность
5. Не давай медицинских рекомендаций
6. Не давай финансовых советов

Формат ответов:
- Используй эмодзи для создания теплой атмосферы
- Разбивай длинные ответы на абзацы
- Задавай уточняющие вопросы, когда нужно
- Предлагай практические упражнения, когда уместно";

/// System prompt for psychological-profile generation.
pub const PROFILE_SYSTEM_PROMPT: &str = "\
Ты — опытный психолог. На основе ответов на опросник и данных о рождении \
составь целостный психологический портрет человека: сильные стороны, зоны \
роста, источники энергии и стресса. Пиши тепло и поддерживающе, обращайся \
на «ты».";

/// System prompt for the daily recommendation.
pub const RECOMMENDATION_SYSTEM_PROMPT: &str = "\
Ты — эксперт по психологии и персональному развитию. Твоя задача — создать \
короткую, но эффективную рекомендацию на день, основываясь на \
психологическом профиле человека. Рекомендация должна быть конкретной, \
практичной и легко выполнимой.";

/// System prompt for guided-practice generation.
pub const PRACTICE_SYSTEM_PROMPT: &str = "\
Ты — эксперт по медитации и практикам осознанности. Твоя задача — создать \
персонализированную практику, которая будет полезна конкретному человеку на \
основе его психологического профиля.";

/// User prompt asking for a psychological profile from questionnaire answers
/// plus natal data.
pub fn profile_prompt(fields: &ProfileFields) -> String {
    let natal = |key: &str| {
        fields
            .get(key)
            .map(render_value)
            .unwrap_or_else(|| "не указано".to_string())
    };

    let mut answers = String::new();
    if let Some(map) = fields
        .get("psychology_answers")
        .and_then(|v| v.as_object())
    {
        let mut indices: Vec<&String> = map.keys().collect();
        indices.sort_by_key(|k| k.parse::<usize>().unwrap_or(usize::MAX));
        for index in indices {
            let Some(answer) = map.get(index).and_then(|v| v.as_object()) else {
                continue;
            };
            let question = answer
                .get("question_text")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let option = answer
                .get("option_text")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            answers.push_str(&format!("- {question} — {option}\n"));
        }
    }

    format!(
        "Составь психологический профиль на основе этих данных.\n\n\
         Дата рождения: {}\nВремя рождения: {}\nМесто рождения: {}\nВозраст: {}\n\n\
         Ответы на опросник:\n{answers}\n\
         Профиль должен быть структурированным, но живым, объемом 3-5 абзацев.",
        natal("birth_date"),
        natal("birth_time"),
        natal("birth_place"),
        natal("age"),
    )
}

/// User prompt asking for one concrete recommendation for today.
pub fn recommendation_prompt(profile_text: &str) -> String {
    format!(
        "На основе следующего психологического профиля создай одну конкретную \
         рекомендацию на сегодня:\n\n{profile_text}\n\n\
         Рекомендация должна быть:\n\
         1. Краткой (не более 3-4 предложений)\n\
         2. Конкретной (что именно нужно сделать)\n\
         3. Реалистичной (возможной выполнить за день)\n\
         4. Направленной на улучшение эмоционального благополучия\n\n\
         Не используй общие фразы вроде «постарайся быть счастливее». \
         Дай точный совет, который можно применить сегодня."
    )
}

/// User prompt asking for a guided practice of a given kind.
/// `practice_desc` names the kind and its duration, e.g. "короткую практику
/// осознанности (3-5 минут)".
pub fn practice_prompt(profile_text: &str, practice_desc: &str) -> String {
    format!(
        "На основе следующего психологического профиля создай \
         {practice_desc}:\n\n{profile_text}\n\n\
         Практика должна быть:\n\
         1. Простой и понятной\n\
         2. Легкой для выполнения\n\
         3. Соответствующей указанной длительности\n\
         4. Учитывающей особенности личности\n\n\
         Опиши практику пошагово, используя простой язык."
    )
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_prompt_includes_natal_data_and_answers() {
        let mut fields = ProfileFields::new();
        fields.insert("birth_date".into(), "15.03.1990".into());
        fields.insert("age".into(), 34.into());
        fields.insert(
            "psychology_answers".into(),
            serde_json::json!({
                "0": { "question_text": "Вопрос один", "option_text": "Ответ один" },
                "1": { "question_text": "Вопрос два", "option_text": "Ответ два" },
            }),
        );

        let prompt = profile_prompt(&fields);
        assert!(prompt.contains("15.03.1990"));
        assert!(prompt.contains("34"));
        assert!(prompt.contains("Вопрос один — Ответ один"));
        assert!(prompt.contains("Вопрос два — Ответ два"));
        // Missing fields render as a placeholder, not as JSON null
        assert!(prompt.contains("не указано"));
    }

    #[test]
    fn recommendation_prompt_embeds_profile() {
        let prompt = recommendation_prompt("профиль текста");
        assert!(prompt.contains("профиль текста"));
        assert!(prompt.contains("на сегодня"));
    }
}
