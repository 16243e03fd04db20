//! Inbound events and outbound button menus.
//!
//! An inbound event is a tagged union — text, button press, or voice note —
//! rather than a bag of optionally-present fields, so handlers match on the
//! variant they care about.

/// One event delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Opaque transport-supplied user identity.
    pub user_id: String,
    /// Display name, when the transport provides one.
    pub user_name: Option<String>,
    pub kind: EventKind,
}

/// What the user actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Free-form text message (commands like `/start` included).
    Text(String),
    /// Inline-button press carrying its callback payload.
    Button(String),
    /// Voice note; the payload is the transport-native file id.
    Voice(String),
}

impl InboundEvent {
    pub fn text(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: None,
            kind: EventKind::Text(text.into()),
        }
    }

    pub fn button(user_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: None,
            kind: EventKind::Button(data.into()),
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Message text, if this is a text event.
    pub fn message_text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Callback payload, if this is a button event.
    pub fn button_data(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Button(d) => Some(d),
            _ => None,
        }
    }
}

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Sends a callback payload back to the bot.
    Callback(String),
    /// Opens an external URL (payment links).
    Url(String),
}

/// A single inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// An inline keyboard: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonMenu {
    pub rows: Vec<Vec<Button>>,
}

impl ButtonMenu {
    /// A menu with a single button.
    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }

    /// A menu with one button per row.
    pub fn column(buttons: Vec<Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn rows(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        let text = InboundEvent::text("7", "hello");
        assert_eq!(text.message_text(), Some("hello"));
        assert_eq!(text.button_data(), None);

        let button = InboundEvent::button("7", "subscribe");
        assert_eq!(button.button_data(), Some("subscribe"));
        assert_eq!(button.message_text(), None);
    }

    #[test]
    fn menu_layouts() {
        let single = ButtonMenu::single(Button::callback("Go", "go"));
        assert_eq!(single.rows.len(), 1);
        assert_eq!(single.rows[0].len(), 1);

        let column = ButtonMenu::column(vec![
            Button::callback("A", "a"),
            Button::callback("B", "b"),
        ]);
        assert_eq!(column.rows.len(), 2);
    }
}
