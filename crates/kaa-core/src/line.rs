//! Parsed inbound protocol lines.
//!
//! The protocol client owns the wire grammar; by the time a line reaches the
//! core it has already been split into a verb, parameters, the trailing
//! message text, and the sender/target identities.

/// One received protocol line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundLine {
    /// The line exactly as received.
    pub raw: String,
    /// The protocol verb (`PRIVMSG`, `JOIN`, `001`, ...).
    pub command: Option<String>,
    /// All parameters, trailing text included.
    pub params: Vec<String>,
    /// The trailing text of the line (the chat message for `PRIVMSG`).
    pub message: String,
    /// Nickname of the originator.
    pub sender: Option<String>,
    /// Where the line was addressed: a channel, or the bot's own nick.
    pub target: Option<String>,
}

impl InboundLine {
    /// Builds a `PRIVMSG` from `sender` to `target`.
    pub fn privmsg(
        sender: impl Into<String>,
        target: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let (sender, target, text) = (sender.into(), target.into(), text.into());
        Self {
            raw: format!(":{sender} PRIVMSG {target} :{text}"),
            command: Some("PRIVMSG".to_string()),
            params: vec![target.clone(), text.clone()],
            message: text,
            sender: Some(sender),
            target: Some(target),
        }
    }

    /// Builds a bare event line such as `:nick JOIN #chan`.
    pub fn event(
        verb: impl Into<String>,
        sender: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let (verb, sender, target) = (verb.into(), sender.into(), target.into());
        Self {
            raw: format!(":{sender} {verb} {target}"),
            command: Some(verb),
            params: vec![target.clone()],
            message: String::new(),
            sender: Some(sender),
            target: Some(target),
        }
    }

    /// Sets the trailing message text.
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.raw = format!("{} :{}", self.raw, text);
        self.params.push(text.clone());
        self.message = text;
        self
    }

    /// Returns `true` if the line was addressed to a channel.
    pub fn is_channel(&self) -> bool {
        self.target
            .as_deref()
            .is_some_and(|t| t.starts_with('#') || t.starts_with('&'))
    }

    /// Where a reply to this line should go.
    ///
    /// Channel lines are answered in the channel, everything else goes back
    /// to the sender directly.
    pub fn reply_target(&self) -> Option<&str> {
        if self.is_channel() {
            self.target.as_deref()
        } else {
            self.sender.as_deref()
        }
    }

    /// Returns `true` if the verb follows the all-caps protocol-verb
    /// convention: at least one upper-case letter and no lower-case ones.
    ///
    /// Numeric replies such as `001` are therefore not events.
    pub fn has_event_verb(&self) -> bool {
        self.command.as_deref().is_some_and(is_event_verb)
    }
}

/// Whether `verb` can name an event: at least one upper-case letter and no
/// lower-case ones.
pub fn is_event_verb(verb: &str) -> bool {
    verb.chars().any(char::is_uppercase) && !verb.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_reply_goes_to_channel() {
        let line = InboundLine::privmsg("alice", "#rust", ".ping");
        assert!(line.is_channel());
        assert_eq!(line.reply_target(), Some("#rust"));
    }

    #[test]
    fn test_private_reply_goes_to_sender() {
        let line = InboundLine::privmsg("alice", "Kaa", ".ping");
        assert!(!line.is_channel());
        assert_eq!(line.reply_target(), Some("alice"));
    }

    #[test]
    fn test_event_verb_convention() {
        assert!(InboundLine::event("JOIN", "bob", "#rust").has_event_verb());

        let mut numeric = InboundLine::event("001", "server", "Kaa");
        assert!(!numeric.has_event_verb());

        numeric.command = Some("Join".to_string());
        assert!(!numeric.has_event_verb());

        assert!(is_event_verb("PRIVMSG"));
        assert!(!is_event_verb("join"));
    }

    #[test]
    fn test_with_message_appends_trailing() {
        let line = InboundLine::event("PART", "bob", "#rust").with_message("bye");
        assert_eq!(line.message, "bye");
        assert_eq!(line.params, vec!["#rust", "bye"]);
        assert_eq!(line.raw, ":bob PART #rust :bye");
    }
}
