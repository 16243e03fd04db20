//! Psychology questionnaire — fixed ordered question list and the
//! callback-payload codec for answer buttons.

/// One answer option.
#[derive(Debug, Clone, Copy)]
pub struct AnswerOption {
    /// Short stable id used in callback payloads.
    pub id: &'static str,
    pub text: &'static str,
}

/// One questionnaire question with its options.
#[derive(Debug, Clone, Copy)]
pub struct Question {
    pub id: &'static str,
    pub text: &'static str,
    pub options: &'static [AnswerOption],
}

/// The fixed questionnaire, asked in order.
pub const QUESTIONS: &[Question] = &[
    Question {
        id: "energy_source",
        text: "Что наполняет тебя энергией больше всего?",
        options: &[
            AnswerOption {
                id: "a",
                text: "Общение с близкими людьми",
            },
            AnswerOption {
                id: "b",
                text: "Время наедине с собой",
            },
            AnswerOption {
                id: "c",
                text: "Новые впечатления и путешествия",
            },
            AnswerOption {
                id: "d",
                text: "Достижение поставленных целей",
            },
        ],
    },
    Question {
        id: "stress_response",
        text: "Как ты обычно реагируешь на стресс?",
        options: &[
            AnswerOption {
                id: "a",
                text: "Ищу поддержку у окружающих",
            },
            AnswerOption {
                id: "b",
                text: "Замыкаюсь и переживаю внутри",
            },
            AnswerOption {
                id: "c",
                text: "Отвлекаюсь на дела или хобби",
            },
            AnswerOption {
                id: "d",
                text: "Анализирую ситуацию и ищу решение",
            },
        ],
    },
    Question {
        id: "decision_style",
        text: "Как ты принимаешь важные решения?",
        options: &[
            AnswerOption {
                id: "a",
                text: "Доверяю интуиции",
            },
            AnswerOption {
                id: "b",
                text: "Взвешиваю все за и против",
            },
            AnswerOption {
                id: "c",
                text: "Советуюсь с близкими",
            },
            AnswerOption {
                id: "d",
                text: "Откладываю, пока решение не созреет",
            },
        ],
    },
    Question {
        id: "life_priority",
        text: "Что для тебя сейчас важнее всего?",
        options: &[
            AnswerOption {
                id: "a",
                text: "Гармония в отношениях",
            },
            AnswerOption {
                id: "b",
                text: "Карьера и самореализация",
            },
            AnswerOption {
                id: "c",
                text: "Внутреннее спокойствие",
            },
            AnswerOption {
                id: "d",
                text: "Здоровье и энергия",
            },
        ],
    },
    Question {
        id: "self_reflection",
        text: "Как часто ты анализируешь свои чувства и поступки?",
        options: &[
            AnswerOption {
                id: "a",
                text: "Постоянно, это часть меня",
            },
            AnswerOption {
                id: "b",
                text: "Иногда, в сложные периоды",
            },
            AnswerOption {
                id: "c",
                text: "Редко, предпочитаю действовать",
            },
            AnswerOption {
                id: "d",
                text: "Хотела бы чаще, но не получается",
            },
        ],
    },
];

/// Total number of questions.
pub fn total() -> usize {
    QUESTIONS.len()
}

/// Look up a question by index.
pub fn question(index: usize) -> Option<&'static Question> {
    QUESTIONS.get(index)
}

/// Look up an option within a question by its id.
pub fn option(index: usize, option_id: &str) -> Option<&'static AnswerOption> {
    question(index)?.options.iter().find(|o| o.id == option_id)
}

/// Encode an answer button payload: `answer_{index}_{option_id}`.
pub fn encode_answer(index: usize, option_id: &str) -> String {
    format!("answer_{index}_{option_id}")
}

/// Decode an answer payload. Returns `None` for anything that is not a
/// well-formed `answer_{index}_{option_id}`.
pub fn decode_answer(payload: &str) -> Option<(usize, &str)> {
    let rest = payload.strip_prefix("answer_")?;
    let (index, option_id) = rest.split_once('_')?;
    if option_id.is_empty() {
        return None;
    }
    Some((index.parse().ok()?, option_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn questions_have_ids_and_options() {
        assert!(total() >= 3);
        for (i, q) in QUESTIONS.iter().enumerate() {
            assert!(!q.id.is_empty());
            assert!(q.options.len() >= 2, "question {i} needs options");
        }
    }

    #[test]
    fn option_lookup() {
        assert_eq!(option(0, "a").unwrap().id, "a");
        assert!(option(0, "z").is_none());
        assert!(option(99, "a").is_none());
    }

    #[test]
    fn answer_codec_round_trip() {
        assert_eq!(encode_answer(3, "b"), "answer_3_b");
        assert_eq!(decode_answer("answer_3_b"), Some((3, "b")));
        assert_eq!(decode_answer("answer_0_a"), Some((0, "a")));
    }

    #[test]
    fn malformed_payloads_are_dropped() {
        assert_eq!(decode_answer("answer_"), None);
        assert_eq!(decode_answer("answer_x_a"), None);
        assert_eq!(decode_answer("answer_3"), None);
        assert_eq!(decode_answer("answer_3_"), None);
        assert_eq!(decode_answer("select_plan_basic"), None);
        assert_eq!(decode_answer(""), None);
    }
}
